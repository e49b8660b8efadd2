// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker invocation.
//!
//! An [`Invoker`] performs the downstream effect of one message. The
//! production implementation POSTs the payload to a worker HTTP endpoint;
//! tests plug in scripted invokers through the same trait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::message::Message;

/// Header carrying the message id, kept for compatibility with the legacy
/// sqsd daemon.
pub const MSGID_HEADER: &str = "X-AWS-SQSD-MSGID";

/// Why an invocation did not succeed.
///
/// Any of these leaves the message unacknowledged; the queue's visibility
/// timeout redelivers it later.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The worker answered with a retryable (5xx) status.
    #[error("worker returned failure status {status}")]
    FailureStatus {
        /// The HTTP status code received.
        status: u16,
    },

    /// Transport failure, including the per-call deadline firing.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The worker endpoint URL did not parse.
    #[error("invalid invoker url: {0}")]
    InvalidUrl(String),
}

/// Performs a single remote dispatch of one message.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Dispatch one message. `Ok(())` means the message may be acknowledged
    /// and deleted upstream.
    async fn invoke(&self, message: &Message) -> Result<(), InvokeError>;
}

/// Invoker that POSTs the message payload to a worker HTTP endpoint.
#[derive(Debug)]
pub struct HttpInvoker {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl HttpInvoker {
    /// Create an invoker for `url`. `timeout` bounds the whole round-trip
    /// of each invocation.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, InvokeError> {
        let url = url
            .parse()
            .map_err(|_| InvokeError::InvalidUrl(url.to_owned()))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, message: &Message) -> Result<(), InvokeError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .header(MSGID_HEADER, message.id())
            .body(message.payload().to_owned())
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            info!(
                status_code = status.as_u16(),
                body = %body,
                "response is failure status"
            );
            return Err(InvokeError::FailureStatus {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            // 3xx/4xx: the worker deemed the message non-retryable, so it is
            // still acknowledged and will not be redelivered.
            let body = response.text().await.unwrap_or_default();
            info!(
                status_code = status.as_u16(),
                body = %body,
                "response is not ok status"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_url() {
        let err = HttpInvoker::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidUrl(_)));
    }

    #[test]
    fn test_new_accepts_http_url() {
        HttpInvoker::new("http://localhost:3000/work", Duration::from_secs(1)).unwrap();
    }
}

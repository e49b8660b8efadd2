// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Upstream queue access.
//!
//! [`QueueClient`] is the seam between the pipeline and the queue service:
//! the fetcher and the remover only ever talk to this trait. [`SqsQueue`]
//! is the production implementation backed by the AWS SQS SDK.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

/// Fewest messages one receive call may ask for.
pub const MIN_RECEIVE_MESSAGES: i32 = 1;
/// Most messages one receive call may ask for (SQS hard limit).
pub const MAX_RECEIVE_MESSAGES: i32 = 10;

/// Bounds for a single receive call.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveOptions {
    /// Batch size, clamped to `[1, 10]`.
    pub max_messages: i32,
    /// Long-poll wait in seconds.
    pub wait_seconds: i32,
    /// Visibility timeout applied to returned messages, in seconds.
    pub visibility_timeout: i32,
}

impl ReceiveOptions {
    /// Build receive options, clamping the batch size into `[1, 10]`.
    pub fn new(max_messages: i32, wait_seconds: i32, visibility_timeout: i32) -> Self {
        Self {
            max_messages: max_messages.clamp(MIN_RECEIVE_MESSAGES, MAX_RECEIVE_MESSAGES),
            wait_seconds,
            visibility_timeout,
        }
    }
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_RECEIVE_MESSAGES,
            wait_seconds: 20,
            visibility_timeout: 30,
        }
    }
}

/// A raw delivery as returned by the queue, before it becomes a
/// [`Message`](crate::message::Message).
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Queue-assigned message id.
    pub id: String,
    /// Message body.
    pub body: String,
    /// Deletion token for this delivery.
    pub receipt: String,
}

/// Queue operation failures. Both kinds are retryable by their callers.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Receive call failed.
    #[error("receive failed: {0}")]
    Receive(String),
    /// Delete call failed.
    #[error("delete failed: {0}")]
    Delete(String),
}

/// Client for an SQS-compatible queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Pull up to `opts.max_messages` messages, long-polling for at most
    /// `opts.wait_seconds`. An empty result is normal.
    async fn receive(&self, opts: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError>;

    /// Delete one delivery by its receipt.
    async fn delete(&self, receipt: &str) -> Result<(), QueueError>;
}

/// SQS-backed queue client.
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Wrap an existing SQS client.
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build an SQS client from the daemon configuration, honoring the
    /// `SQS_ENDPOINT_URL` and `AWS_REGION` overrides.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.aws_region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&shared);
        if let Some(endpoint) = &config.sqs_endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(
            aws_sdk_sqs::Client::from_conf(builder.build()),
            config.queue_url.clone(),
        )
    }
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn receive(&self, opts: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(opts.max_messages)
            .wait_time_seconds(opts.wait_seconds)
            .visibility_timeout(opts.visibility_timeout)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        let mut messages = Vec::new();
        for entry in output.messages.unwrap_or_default() {
            match (entry.message_id, entry.body, entry.receipt_handle) {
                (Some(id), Some(body), Some(receipt)) => {
                    messages.push(RawMessage { id, body, receipt });
                }
                _ => warn!("queue returned an incomplete message entry, skipping"),
            }
        }
        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.to_string()))?;
        Ok(())
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The unit of work passed between pipeline stages.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Progress of a message through the invoke step.
///
/// Transitions are forward-only:
/// `NotRequested -> InProgress -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The message has not reached a consumer worker yet.
    NotRequested,
    /// A consumer worker is invoking the downstream endpoint.
    InProgress,
    /// The invocation succeeded; the message is being acknowledged.
    Succeeded,
    /// The invocation failed; the queue will redeliver after the
    /// visibility timeout.
    Failed,
}

impl ResultStatus {
    /// Stable lowercase name, used in logs and on the monitoring surface.
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::NotRequested => "not_requested",
            ResultStatus::InProgress => "in_progress",
            ResultStatus::Succeeded => "succeeded",
            ResultStatus::Failed => "failed",
        }
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_transition_to(self, next: ResultStatus) -> bool {
        matches!(
            (self, next),
            (ResultStatus::NotRequested, ResultStatus::InProgress)
                | (ResultStatus::InProgress, ResultStatus::Succeeded)
                | (ResultStatus::InProgress, ResultStatus::Failed)
        )
    }
}

/// A single delivery received from the queue.
///
/// `id`, `payload`, `receipt` and `received_at` are fixed at construction
/// by the fetcher; only the result status changes afterwards, and only
/// through [`Message::advance`]. Two messages are equal when their ids are.
#[derive(Debug, Clone)]
pub struct Message {
    id: String,
    payload: String,
    receipt: String,
    received_at: DateTime<Utc>,
    result_status: ResultStatus,
}

impl Message {
    /// Construct a freshly received message in the `NotRequested` state.
    pub fn new(
        id: impl Into<String>,
        payload: impl Into<String>,
        receipt: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            receipt: receipt.into(),
            received_at,
            result_status: ResultStatus::NotRequested,
        }
    }

    /// Queue-assigned message id, unique per delivery attempt.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Opaque payload, typically JSON.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Deletion token tied to this delivery.
    pub fn receipt(&self) -> &str {
        &self.receipt
    }

    /// When the receive batch containing this message returned.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Current result status.
    pub fn result_status(&self) -> ResultStatus {
        self.result_status
    }

    /// Advance the result status. Backwards or skipping transitions are
    /// ignored, which keeps the status monotonic no matter the call order.
    pub fn advance(&mut self, next: ResultStatus) {
        if self.result_status.can_transition_to(next) {
            self.result_status = next;
        }
    }

    /// Monitoring projection of this message.
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            id: self.id.clone(),
            received_at: self.received_at,
            status: self.result_status,
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

/// What the monitoring surface reports per in-flight message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    /// Queue-assigned message id.
    pub id: String,
    /// When the receive batch returned.
    pub received_at: DateTime<Utc>,
    /// Result status at snapshot time.
    pub status: ResultStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::new("m-1", r#"{"k":1}"#, "receipt-1", Utc::now())
    }

    #[test]
    fn test_new_message_is_not_requested() {
        let message = sample();
        assert_eq!(message.result_status(), ResultStatus::NotRequested);
        assert_eq!(message.id(), "m-1");
        assert_eq!(message.payload(), r#"{"k":1}"#);
        assert_eq!(message.receipt(), "receipt-1");
    }

    #[test]
    fn test_advance_follows_forward_transitions() {
        let mut message = sample();
        message.advance(ResultStatus::InProgress);
        assert_eq!(message.result_status(), ResultStatus::InProgress);
        message.advance(ResultStatus::Succeeded);
        assert_eq!(message.result_status(), ResultStatus::Succeeded);
    }

    #[test]
    fn test_advance_ignores_backwards_transitions() {
        let mut message = sample();
        message.advance(ResultStatus::InProgress);
        message.advance(ResultStatus::Failed);
        assert_eq!(message.result_status(), ResultStatus::Failed);

        // Terminal states stick.
        message.advance(ResultStatus::InProgress);
        assert_eq!(message.result_status(), ResultStatus::Failed);
        message.advance(ResultStatus::Succeeded);
        assert_eq!(message.result_status(), ResultStatus::Failed);
    }

    #[test]
    fn test_advance_ignores_skipped_transitions() {
        let mut message = sample();
        message.advance(ResultStatus::Succeeded);
        assert_eq!(message.result_status(), ResultStatus::NotRequested);
    }

    #[test]
    fn test_equality_is_by_id() {
        let a = Message::new("same", "a", "ra", Utc::now());
        let b = Message::new("same", "b", "rb", Utc::now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_serializes_snake_case_status() {
        let mut message = sample();
        message.advance(ResultStatus::InProgress);
        let json = serde_json::to_value(message.summary()).unwrap();
        assert_eq!(json["id"], "m-1");
        assert_eq!(json["status"], "in_progress");
    }
}

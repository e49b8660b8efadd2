// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded handoff between the fetcher and the consumer pool, doubling as
//! the registry of in-flight messages.
//!
//! A message is "in flight" from the moment [`Broker::append`] accepts it
//! until the consumer calls [`Broker::complete`], regardless of whether the
//! invocation succeeded. The monitoring surface reads the registry through
//! [`InFlightTracker::snapshot`] without ever touching the handoff itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::message::{Message, MessageSummary, ResultStatus};

struct TrackedEntry {
    received_at: DateTime<Utc>,
    status: ResultStatus,
}

/// Registry of messages between broker ingress and consumer completion.
///
/// Holds summaries only; ownership of the messages stays with the pipeline.
/// All operations are safe under concurrent callers.
#[derive(Default)]
pub struct InFlightTracker {
    entries: Mutex<HashMap<String, TrackedEntry>>,
}

impl InFlightTracker {
    fn insert(&self, message: &Message) {
        let mut entries = self.entries.lock().expect("tracker lock poisoned");
        entries.insert(
            message.id().to_owned(),
            TrackedEntry {
                received_at: message.received_at(),
                status: message.result_status(),
            },
        );
    }

    fn mark(&self, id: &str, status: ResultStatus) {
        let mut entries = self.entries.lock().expect("tracker lock poisoned");
        if let Some(entry) = entries.get_mut(id) {
            if entry.status.can_transition_to(status) {
                entry.status = status;
            }
        }
    }

    fn remove(&self, id: &str) {
        self.entries
            .lock()
            .expect("tracker lock poisoned")
            .remove(id);
    }

    /// Number of messages currently in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("tracker lock poisoned").len()
    }

    /// Whether no message is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the in-flight set, ordered by `received_at` ascending.
    pub fn snapshot(&self) -> Vec<MessageSummary> {
        let entries = self.entries.lock().expect("tracker lock poisoned");
        let mut summaries: Vec<MessageSummary> = entries
            .iter()
            .map(|(id, entry)| MessageSummary {
                id: id.clone(),
                received_at: entry.received_at,
                status: entry.status,
            })
            .collect();
        drop(entries);
        summaries.sort_by_key(|summary| summary.received_at);
        summaries
    }
}

/// Error returned by [`Broker::append`] once the receiving side is gone.
#[derive(Debug, Error)]
#[error("broker is closed")]
pub struct BrokerClosed;

/// Sending half of the handoff. Cloned into every fetch loop; the handoff
/// closes when the last clone drops.
#[derive(Clone)]
pub struct Broker {
    tx: mpsc::Sender<Message>,
    tracker: Arc<InFlightTracker>,
}

impl Broker {
    /// Create a handoff of the given capacity.
    pub fn new(capacity: usize) -> (Broker, BrokerReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let tracker = Arc::new(InFlightTracker::default());
        (
            Broker { tx, tracker },
            BrokerReceiver {
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
            },
        )
    }

    /// Hand one message to the consumer pool.
    ///
    /// Waits for a free slot before registering the message, so the number
    /// of tracked messages can never exceed the handoff capacity plus the
    /// number of consumer workers. The wait is the backpressure that
    /// throttles the fetcher.
    pub async fn append(&self, message: Message) -> Result<(), BrokerClosed> {
        let permit = self.tx.reserve().await.map_err(|_| BrokerClosed)?;
        self.tracker.insert(&message);
        permit.send(message);
        Ok(())
    }

    /// Record a status change for an in-flight message.
    pub fn mark(&self, id: &str, status: ResultStatus) {
        self.tracker.mark(id, status);
    }

    /// Remove a message from the in-flight set. Called by the consumer once
    /// the message terminates, success or failure.
    pub fn complete(&self, id: &str) {
        self.tracker.remove(id);
    }

    /// Copy out the in-flight set, ordered by `received_at` ascending.
    pub fn snapshot(&self) -> Vec<MessageSummary> {
        self.tracker.snapshot()
    }

    /// Shared handle to the in-flight registry, for monitoring.
    pub fn tracker(&self) -> Arc<InFlightTracker> {
        self.tracker.clone()
    }
}

/// Receiving half of the handoff, shared by all consumer workers.
#[derive(Clone)]
pub struct BrokerReceiver {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Message>>>,
}

impl BrokerReceiver {
    /// Next message in FIFO order. Returns `None` once every [`Broker`]
    /// clone has dropped and the buffered messages are drained.
    pub async fn recv(&self) -> Option<Message> {
        self.rx.lock().await.recv().await
    }
}

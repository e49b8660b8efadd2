// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deletion of acknowledged messages, with bounded retry.
//!
//! Consumers submit successfully processed messages to a bounded queue;
//! remover workers drain it and delete the receipts upstream. Deletion
//! failures are retried on a fixed cadence. Once the attempt budget is
//! exhausted the message is dropped with an error log; the queue's
//! visibility timeout surfaces it again, which is where the daemon's
//! at-least-once semantics come from.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::message::Message;
use crate::queue::QueueClient;

/// How many deletion attempts one message gets.
pub const MAX_REMOVE_ATTEMPTS: u32 = 16;

/// Deadline for a single deletion call.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between consecutive attempts for the same message.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The acknowledge stage of the pipeline.
pub struct Remover {
    queue: Arc<dyn QueueClient>,
    parallel: usize,
}

impl Remover {
    /// Create a remover pool of `parallel` workers.
    pub fn new(queue: Arc<dyn QueueClient>, parallel: usize) -> Self {
        Self { queue, parallel }
    }

    /// Spawn the worker pool behind a submission queue of `capacity`
    /// messages. The handles complete once every sender has dropped and the
    /// queued messages are flushed.
    pub fn spawn(self, capacity: usize) -> (mpsc::Sender<Message>, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..self.parallel)
            .map(|worker| {
                let queue = self.queue.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    debug!(worker, "remover worker started");
                    loop {
                        let next = { rx.lock().await.recv().await };
                        let Some(message) = next else { break };
                        remove(queue.as_ref(), &message).await;
                    }
                    debug!(worker, "remover worker stopped");
                })
            })
            .collect();

        (tx, handles)
    }
}

/// Delete one message, retrying on a fixed cadence. After the attempt
/// budget is exhausted the message is abandoned; the queue will redeliver
/// it after the visibility timeout.
async fn remove(queue: &dyn QueueClient, message: &Message) {
    let mut last_error = String::new();
    for attempt in 1..=MAX_REMOVE_ATTEMPTS {
        match tokio::time::timeout(ATTEMPT_TIMEOUT, queue.delete(message.receipt())).await {
            Ok(Ok(())) => {
                debug!(message_id = %message.id(), attempt, "succeeded to remove message");
                return;
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
                debug!(
                    message_id = %message.id(),
                    attempt,
                    error = %last_error,
                    "failed to remove message"
                );
            }
            Err(_) => {
                last_error = "deletion attempt timed out".to_owned();
                debug!(message_id = %message.id(), attempt, "deletion attempt timed out");
            }
        }
        if attempt < MAX_REMOVE_ATTEMPTS {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
    error!(
        message_id = %message.id(),
        attempts = MAX_REMOVE_ATTEMPTS,
        error = %last_error,
        "giving up on message removal; the queue will redeliver it"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::queue::{QueueError, RawMessage, ReceiveOptions};

    struct CountingQueue {
        deletes: AtomicUsize,
        fail: bool,
    }

    impl CountingQueue {
        fn new(fail: bool) -> Self {
            Self {
                deletes: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl QueueClient for CountingQueue {
        async fn receive(&self, _opts: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _receipt: &str) -> Result<(), QueueError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(QueueError::Delete("synthetic failure".into()))
            } else {
                Ok(())
            }
        }
    }

    fn message() -> Message {
        Message::new("m-1", "{}", "receipt-1", Utc::now())
    }

    #[tokio::test]
    async fn test_remove_succeeds_first_try() {
        let queue = CountingQueue::new(false);
        remove(&queue, &message()).await;
        assert_eq!(queue.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_exhausts_attempt_budget() {
        let queue = CountingQueue::new(true);
        remove(&queue, &message()).await;
        assert_eq!(
            queue.deletes.load(Ordering::SeqCst),
            MAX_REMOVE_ATTEMPTS as usize
        );
    }

    #[tokio::test]
    async fn test_workers_flush_queue_after_senders_drop() {
        let queue = Arc::new(CountingQueue::new(false));
        let remover = Remover::new(queue.clone(), 2);
        let (tx, handles) = remover.spawn(10);

        for i in 0..5 {
            tx.send(Message::new(
                format!("m-{i}"),
                "{}",
                format!("receipt-{i}"),
                Utc::now(),
            ))
            .await
            .unwrap();
        }
        drop(tx);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(queue.deletes.load(Ordering::SeqCst), 5);
    }
}

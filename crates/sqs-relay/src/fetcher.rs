// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parallel loops pulling message batches from the queue into the broker.
//!
//! Each loop long-polls the queue, filters the batch through the locker,
//! and hands retained messages to the broker. The broker append blocks
//! while the consumer pool is saturated; that block is the only throttling
//! mechanism between the queue and the workers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::broker::Broker;
use crate::locker::{Locker, LockerError};
use crate::message::Message;
use crate::queue::{QueueClient, ReceiveOptions};

/// Tuning for the fetch loops.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Number of parallel fetch loops.
    pub parallel: usize,
    /// Receive bounds: batch size, long-poll wait, visibility timeout.
    pub receive: ReceiveOptions,
    /// Pause between consecutive receive calls on one loop.
    pub poll_interval: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            parallel: 1,
            receive: ReceiveOptions::default(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// The fetch stage of the pipeline.
pub struct Fetcher {
    queue: Arc<dyn QueueClient>,
    locker: Arc<dyn Locker>,
    broker: Broker,
    config: FetcherConfig,
}

impl Fetcher {
    /// Create a fetcher feeding `broker`.
    pub fn new(
        queue: Arc<dyn QueueClient>,
        locker: Arc<dyn Locker>,
        broker: Broker,
        config: FetcherConfig,
    ) -> Self {
        Self {
            queue,
            locker,
            broker,
            config,
        }
    }

    /// Spawn the configured number of fetch loops. Every handle completes
    /// shortly after `cancel` fires; in-progress receives are abandoned.
    pub fn spawn(self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let shared = Arc::new(self);
        (0..shared.config.parallel)
            .map(|worker| {
                let fetcher = shared.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { fetcher.run(worker, cancel).await })
            })
            .collect()
    }

    async fn run(&self, worker: usize, cancel: CancellationToken) {
        debug!(worker, "fetch loop started");
        'outer: loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = self.fetch() => batch,
            };

            match batch {
                Ok(messages) => {
                    debug!(worker, count = messages.len(), "caught messages");
                    for message in messages {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break 'outer,
                            appended = self.broker.append(message) => {
                                if appended.is_err() {
                                    // Handoff closed under us; nothing left to feed.
                                    break 'outer;
                                }
                            }
                        }
                    }
                }
                Err(e) => error!(worker, error = %e, "failed to fetch from queue"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        debug!(worker, "fetch loop stopped");
    }

    /// One receive round: pull a batch, stamp it, filter it through the
    /// locker. A locker backend failure abandons the whole batch; messages
    /// locked earlier in the same batch stay locked until their TTL.
    async fn fetch(&self) -> crate::Result<Vec<Message>> {
        let raw = self.queue.receive(self.config.receive).await?;
        let received_at = Utc::now();

        let mut messages = Vec::with_capacity(raw.len());
        for entry in raw {
            match self.locker.lock(&entry.id).await {
                Ok(()) => {
                    messages.push(Message::new(entry.id, entry.body, entry.receipt, received_at));
                }
                Err(LockerError::AlreadyLocked(_)) => {
                    warn!(message_id = %entry.id, "received message is duplicated");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(messages)
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker pool that drains the broker and drives the invoker.
//!
//! Each worker takes one message at a time, runs the invocation, and routes
//! successful messages to the remover. Failed messages are simply dropped
//! from tracking; the queue redelivers them once the visibility timeout
//! expires. Workers exit when the broker closes and drains, which is how
//! the lifecycle controller winds the pool down.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, BrokerReceiver};
use crate::invoker::Invoker;
use crate::locker::Locker;
use crate::message::{Message, ResultStatus};
use crate::runtime::LifecycleState;

/// The consume stage of the pipeline.
pub struct Consumer {
    invoker: Arc<dyn Invoker>,
    locker: Arc<dyn Locker>,
    broker: Broker,
    receiver: BrokerReceiver,
    remover_tx: mpsc::Sender<Message>,
    state: watch::Receiver<LifecycleState>,
    parallel: usize,
}

impl Consumer {
    /// Create a consumer pool of `parallel` workers.
    pub fn new(
        invoker: Arc<dyn Invoker>,
        locker: Arc<dyn Locker>,
        broker: Broker,
        receiver: BrokerReceiver,
        remover_tx: mpsc::Sender<Message>,
        state: watch::Receiver<LifecycleState>,
        parallel: usize,
    ) -> Self {
        Self {
            invoker,
            locker,
            broker,
            receiver,
            remover_tx,
            state,
            parallel,
        }
    }

    /// Spawn the worker pool. The handles complete once the broker closes
    /// and its buffered messages are drained.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let parallel = self.parallel;
        let shared = Arc::new(self);
        (0..parallel)
            .map(|worker| {
                let consumer = shared.clone();
                tokio::spawn(async move { consumer.run(worker).await })
            })
            .collect()
    }

    async fn run(&self, worker: usize) {
        debug!(worker, "consumer worker started");
        while let Some(message) = self.next().await {
            self.handle(message).await;
        }
        debug!(worker, "consumer worker stopped");
    }

    /// Take the next message, refusing to dequeue while the daemon is
    /// paused. `None` once the broker has closed and drained.
    async fn next(&self) -> Option<Message> {
        let mut state = self.state.clone();
        loop {
            while *state.borrow() == LifecycleState::Paused {
                if state.changed().await.is_err() {
                    // Controller is gone; keep draining whatever is buffered.
                    return self.receiver.recv().await;
                }
            }
            // Abandon the receive if a pause lands while we wait on it. The
            // receive is cancel-safe, so no message is lost.
            let message = tokio::select! {
                message = self.receiver.recv() => message,
                _ = paused(&mut state) => continue,
            };
            // A pause can land in the same instant the receive resolves;
            // hold the message until the daemon is consuming again.
            while *state.borrow() == LifecycleState::Paused {
                if state.changed().await.is_err() {
                    break;
                }
            }
            return message;
        }
    }

    async fn handle(&self, mut message: Message) {
        let id = message.id().to_owned();

        message.advance(ResultStatus::InProgress);
        self.broker.mark(&id, ResultStatus::InProgress);

        match self.invoker.invoke(&message).await {
            Ok(()) => {
                message.advance(ResultStatus::Succeeded);
                self.broker.mark(&id, ResultStatus::Succeeded);
                debug!(message_id = %id, "invocation succeeded");
                if let Err(e) = self.remover_tx.send(message).await {
                    error!(
                        message_id = %id,
                        error = %e,
                        "failed to queue message for removal"
                    );
                }
            }
            Err(e) => {
                message.advance(ResultStatus::Failed);
                self.broker.mark(&id, ResultStatus::Failed);
                info!(
                    message_id = %id,
                    error = %e,
                    "invocation failed, leaving message for redelivery"
                );
            }
        }

        self.broker.complete(&id);
        if let Err(e) = self.locker.unlock(&id).await {
            warn!(message_id = %id, error = %e, "failed to unlock message");
        }
    }
}

/// Resolves once the lifecycle state transitions to `Paused`. Never
/// resolves after the controller is gone, so a detached pool keeps
/// draining.
async fn paused(state: &mut watch::Receiver<LifecycleState>) {
    loop {
        if state.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if *state.borrow() == LifecycleState::Paused {
            return;
        }
    }
}

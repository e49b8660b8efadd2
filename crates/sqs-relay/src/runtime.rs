// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daemon lifecycle: wiring, startup, drain and shutdown.
//!
//! [`RelayRuntime`] owns every spawned task of the pipeline. It is built
//! through [`RelayRuntimeBuilder`], started with
//! [`RelayRuntimeConfig::start`], and wound down with
//! [`RelayRuntime::shutdown`], which drains in-flight work before letting
//! any stage die. The daemon binary drives it from signals; embedders and
//! tests drive it directly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broker::{Broker, InFlightTracker};
use crate::config::Config;
use crate::consumer::Consumer;
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::invoker::Invoker;
use crate::locker::{Locker, NoopLocker};
use crate::message::MessageSummary;
use crate::monitor::MonitoringService;
use crate::queue::QueueClient;
use crate::remover::Remover;

/// How often the drain loop re-checks the in-flight set.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace allowed for the remover after draining starts: 16 attempts of
/// 1 s each, 1 s apart, plus 2 s of slack.
const REMOVER_DRAIN_GRACE: Duration = Duration::from_secs(34);

/// Lifecycle of the daemon.
///
/// Transitions: `Starting -> Running`, `Running <-> Paused`,
/// `{Running, Paused} -> Draining`, `Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Components are being wired and spawned.
    Starting,
    /// Normal operation.
    Running,
    /// Consumers refuse to dequeue; in-flight work drains naturally.
    Paused,
    /// No new input; in-flight work runs to completion.
    Draining,
    /// All workers joined, monitoring endpoint closed.
    Stopped,
}

/// Builder for a [`RelayRuntime`].
pub struct RelayRuntimeBuilder {
    queue: Option<Arc<dyn QueueClient>>,
    invoker: Option<Arc<dyn Invoker>>,
    locker: Arc<dyn Locker>,
    fetcher_config: FetcherConfig,
    invoker_parallel: usize,
    broker_capacity: Option<usize>,
    monitoring_addr: Option<SocketAddr>,
    hard_stop: Duration,
}

impl Default for RelayRuntimeBuilder {
    fn default() -> Self {
        Self {
            queue: None,
            invoker: None,
            locker: Arc::new(NoopLocker),
            fetcher_config: FetcherConfig::default(),
            invoker_parallel: 1,
            broker_capacity: None,
            monitoring_addr: None,
            hard_stop: Duration::from_secs(60) + REMOVER_DRAIN_GRACE,
        }
    }
}

impl RelayRuntimeBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed parallelism, monitoring address and drain deadline from the
    /// daemon configuration. Queue, invoker and locker are still injected
    /// separately.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new();
        builder.fetcher_config.parallel = config.fetcher_parallel;
        builder.invoker_parallel = config.invoker_parallel;
        builder.monitoring_addr =
            Some(SocketAddr::from(([0, 0, 0, 0], config.monitoring_port)));
        builder.hard_stop = config.invoker_timeout + REMOVER_DRAIN_GRACE;
        builder
    }

    /// Set the upstream queue client (required).
    pub fn queue(mut self, queue: Arc<dyn QueueClient>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set the invoker (required).
    pub fn invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Set the duplicate-suppression locker.
    ///
    /// Default: [`NoopLocker`].
    pub fn locker(mut self, locker: Arc<dyn Locker>) -> Self {
        self.locker = locker;
        self
    }

    /// Override the fetch loop tuning.
    pub fn fetcher_config(mut self, config: FetcherConfig) -> Self {
        self.fetcher_config = config;
        self
    }

    /// Set the number of consumer workers.
    ///
    /// Default: 1.
    pub fn invoker_parallel(mut self, parallel: usize) -> Self {
        self.invoker_parallel = parallel;
        self
    }

    /// Set the broker handoff capacity.
    ///
    /// Default: the number of fetch loops.
    pub fn broker_capacity(mut self, capacity: usize) -> Self {
        self.broker_capacity = Some(capacity);
        self
    }

    /// Bind the monitoring gRPC endpoint on `addr`. Without this call the
    /// endpoint is not served, which is what tests usually want.
    pub fn monitoring_addr(mut self, addr: SocketAddr) -> Self {
        self.monitoring_addr = Some(addr);
        self
    }

    /// Bound on how long [`RelayRuntime::shutdown`] waits for in-flight
    /// messages before proceeding anyway.
    pub fn hard_stop(mut self, deadline: Duration) -> Self {
        self.hard_stop = deadline;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required components are missing or a
    /// parallelism knob is zero.
    pub fn build(self) -> Result<RelayRuntimeConfig> {
        let queue = self
            .queue
            .ok_or_else(|| anyhow::anyhow!("queue is required"))?;
        let invoker = self
            .invoker
            .ok_or_else(|| anyhow::anyhow!("invoker is required"))?;
        if self.fetcher_config.parallel == 0 {
            return Err(anyhow::anyhow!("fetcher parallelism must be positive"));
        }
        if self.invoker_parallel == 0 {
            return Err(anyhow::anyhow!("invoker parallelism must be positive"));
        }
        if self.broker_capacity == Some(0) {
            return Err(anyhow::anyhow!("broker capacity must be positive"));
        }

        let broker_capacity = self
            .broker_capacity
            .unwrap_or(self.fetcher_config.parallel);

        Ok(RelayRuntimeConfig {
            queue,
            invoker,
            locker: self.locker,
            fetcher_config: self.fetcher_config,
            invoker_parallel: self.invoker_parallel,
            broker_capacity,
            monitoring_addr: self.monitoring_addr,
            hard_stop: self.hard_stop,
        })
    }
}

/// A built but not yet started runtime.
pub struct RelayRuntimeConfig {
    queue: Arc<dyn QueueClient>,
    invoker: Arc<dyn Invoker>,
    locker: Arc<dyn Locker>,
    fetcher_config: FetcherConfig,
    invoker_parallel: usize,
    broker_capacity: usize,
    monitoring_addr: Option<SocketAddr>,
    hard_stop: Duration,
}

impl std::fmt::Debug for RelayRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRuntimeConfig")
            .field("invoker_parallel", &self.invoker_parallel)
            .field("broker_capacity", &self.broker_capacity)
            .field("monitoring_addr", &self.monitoring_addr)
            .field("hard_stop", &self.hard_stop)
            .finish_non_exhaustive()
    }
}

impl RelayRuntimeConfig {
    /// Start the pipeline: remover pool, consumer pool, fetch loops and the
    /// monitoring endpoint, in that order, then mark the daemon `Running`.
    pub async fn start(self) -> crate::Result<RelayRuntime> {
        let (state_tx, state_rx) = watch::channel(LifecycleState::Starting);

        let (broker, broker_rx) = Broker::new(self.broker_capacity);
        let tracker = broker.tracker();

        // Remover pool first, so consumers always have somewhere to ack.
        let remover = Remover::new(self.queue.clone(), self.fetcher_config.parallel);
        let (remover_tx, remover_handles) =
            remover.spawn(10 * self.fetcher_config.parallel);

        let consumer = Consumer::new(
            self.invoker,
            self.locker.clone(),
            broker.clone(),
            broker_rx,
            remover_tx,
            state_rx,
            self.invoker_parallel,
        );
        let consumer_handles = consumer.spawn();

        let fetcher_cancel = CancellationToken::new();
        let fetcher = Fetcher::new(
            self.queue,
            self.locker,
            broker.clone(),
            self.fetcher_config,
        );
        let fetcher_handles = fetcher.spawn(&fetcher_cancel);

        let monitor = match self.monitoring_addr {
            Some(addr) => {
                let listener = tokio::net::TcpListener::bind(addr).await?;
                let local_addr = listener.local_addr()?;
                let service = MonitoringService::new(tracker.clone());
                let (stop_tx, stop_rx) = oneshot::channel::<()>();
                let handle = tokio::spawn(async move {
                    tonic::transport::Server::builder()
                        .add_service(service.into_server())
                        .serve_with_incoming_shutdown(
                            TcpListenerStream::new(listener),
                            async {
                                let _ = stop_rx.await;
                            },
                        )
                        .await
                });
                info!(addr = %local_addr, "monitoring endpoint started");
                Some(Monitor {
                    addr: local_addr,
                    stop_tx,
                    handle,
                })
            }
            None => None,
        };

        state_tx.send_replace(LifecycleState::Running);
        info!("relay started");

        Ok(RelayRuntime {
            state_tx,
            fetcher_cancel,
            broker,
            tracker,
            fetcher_handles,
            consumer_handles,
            remover_handles,
            monitor,
            hard_stop: self.hard_stop,
        })
    }
}

struct Monitor {
    addr: SocketAddr,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::result::Result<(), tonic::transport::Error>>,
}

/// A running relay daemon.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination; it returns
/// only after every spawned worker has joined.
pub struct RelayRuntime {
    state_tx: watch::Sender<LifecycleState>,
    fetcher_cancel: CancellationToken,
    broker: Broker,
    tracker: Arc<InFlightTracker>,
    fetcher_handles: Vec<JoinHandle<()>>,
    consumer_handles: Vec<JoinHandle<()>>,
    remover_handles: Vec<JoinHandle<()>>,
    monitor: Option<Monitor>,
    hard_stop: Duration,
}

impl RelayRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> RelayRuntimeBuilder {
        RelayRuntimeBuilder::new()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    /// Number of messages currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Copy of the in-flight set, ordered by receipt time.
    pub fn snapshot(&self) -> Vec<MessageSummary> {
        self.tracker.snapshot()
    }

    /// Address the monitoring endpoint is bound on, if it was started.
    pub fn monitoring_addr(&self) -> Option<SocketAddr> {
        self.monitor.as_ref().map(|m| m.addr)
    }

    /// Stop handing messages to consumer workers. Fetching may briefly
    /// continue; the broker fills up and backpressure idles the fetcher.
    pub fn pause(&self) {
        self.state_tx.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::Paused;
                info!("relay paused");
                true
            } else {
                false
            }
        });
    }

    /// Resume consuming after a [`pause`](Self::pause).
    pub fn resume(&self) {
        self.state_tx.send_if_modified(|state| {
            if *state == LifecycleState::Paused {
                *state = LifecycleState::Running;
                info!("relay resumed");
                true
            } else {
                false
            }
        });
    }

    /// Gracefully shut the daemon down.
    ///
    /// Stops the fetch loops, waits (bounded by the hard-stop deadline) for
    /// the in-flight set to empty, then winds down consumers, removers and
    /// the monitoring endpoint. Invocations already in progress run to
    /// completion against their own per-call deadlines.
    pub async fn shutdown(mut self) -> crate::Result<()> {
        self.state_tx.send_replace(LifecycleState::Draining);
        info!(in_flight = self.tracker.len(), "draining");

        self.fetcher_cancel.cancel();
        for handle in self.fetcher_handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "fetch loop panicked");
            }
        }

        let drained = tokio::time::timeout(self.hard_stop, async {
            while !self.tracker.is_empty() {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                in_flight = self.tracker.len(),
                "hard-stop deadline reached with messages still in flight"
            );
        }

        // Close the handoff; consumers exit once it is drained.
        drop(self.broker);
        for handle in self.consumer_handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "consumer worker panicked");
            }
        }

        // The consumers held the only remover senders, so the removers exit
        // after flushing whatever deletions are still queued.
        for handle in self.remover_handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "remover worker panicked");
            }
        }

        let mut monitor_result = Ok(());
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.stop_tx.send(());
            match monitor.handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "monitoring endpoint error during shutdown");
                    monitor_result = Err(crate::Error::from(e));
                }
                Err(e) => error!(error = %e, "monitoring endpoint task panicked"),
            }
        }

        self.state_tx.send_replace(LifecycleState::Stopped);
        info!("relay stopped");
        monitor_result
    }
}

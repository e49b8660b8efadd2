// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! sqs-relay - SQS to HTTP worker bridge
//!
//! A long-lived daemon that receives messages from an SQS-compatible queue,
//! dispatches each one as an HTTP POST to a configured worker endpoint, and
//! deletes successfully processed messages from the queue. Failed messages
//! are left alone; the queue's visibility timeout redelivers them, which
//! gives the daemon at-least-once semantics with best-effort duplicate
//! suppression when a locker backend is configured.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────┐
//!                 │                 RelayRuntime                      │
//!                 │   (lifecycle: start / pause / drain / shutdown)   │
//!                 └───────────────────────────────────────────────────┘
//!
//!  ┌───────┐ receive ┌─────────┐ append ┌────────┐ recv ┌──────────┐
//!  │ Queue │────────►│ Fetcher │───────►│ Broker │─────►│ Consumer │
//!  └───────┘         │ (x P)   │        │ bounded│      │  (x W)   │
//!      ▲             └─────────┘        └────┬───┘      └────┬─────┘
//!      │                  │ lock             │ tracks        │ invoke
//!      │             ┌────▼────┐        ┌────▼─────────┐ ┌───▼─────┐
//!      │             │ Locker  │        │   InFlight   │ │ Invoker │
//!      │             └─────────┘        │   Tracker    │ │ (HTTP)  │
//!      │                                └────┬─────────┘ └───┬─────┘
//!      │ delete      ┌─────────┐             │ snapshot      │ ok
//!      └─────────────│ Remover │◄────────────┼───────────────┘
//!                    │ (x P)   │        ┌────▼─────────┐
//!                    └─────────┘        │  Monitoring  │
//!                                       │  gRPC server │
//!                                       └──────────────┘
//! ```
//!
//! The broker append blocks when the consumer pool is saturated; that block
//! propagates backpressure all the way to the queue long-poll. On shutdown
//! only the fetcher is cancelled: consumers and removers keep running until
//! the in-flight set is empty.
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `INVOKER_URL` | Yes | - | Worker HTTP endpoint |
//! | `QUEUE_URL` | Yes | - | Upstream queue URL |
//! | `DEFAULT_INVOKER_TIMEOUT_SECONDS` | No | `60` | Invoker per-call deadline |
//! | `FETCHER_PARALLEL_COUNT` | No | `1` | Fetch loops |
//! | `INVOKER_PARALLEL_COUNT` | No | `1` | Consumer workers |
//! | `MONITORING_PORT` | No | `6969` | Monitoring gRPC port |
//! | `LOG_LEVEL` | No | `info` | `debug`, `info` or `error` |
//! | `SQS_ENDPOINT_URL` | No | - | Queue endpoint override |
//! | `AWS_REGION` | No | - | Queue region |

#![deny(missing_docs)]

/// Bounded fetcher-to-consumer handoff and the in-flight registry.
pub mod broker;

/// Daemon configuration from environment variables.
pub mod config;

/// Worker pool draining the broker and driving the invoker.
pub mod consumer;

/// Error types for the relay daemon.
pub mod error;

/// Parallel receive loops feeding the broker.
pub mod fetcher;

/// Worker invocation over HTTP.
pub mod invoker;

/// Pluggable duplicate suppression.
pub mod locker;

/// The unit of work passed between stages.
pub mod message;

/// Read-only monitoring gRPC service.
pub mod monitor;

/// Upstream queue access.
pub mod queue;

/// Deletion of acknowledged messages with bounded retry.
pub mod remover;

/// Lifecycle controller wiring all of the above.
pub mod runtime;

pub use config::Config;
pub use error::{Error, Result};
pub use runtime::{LifecycleState, RelayRuntime};

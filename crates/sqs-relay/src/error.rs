// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the relay daemon.

use thiserror::Error;

/// Relay errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Upstream queue operation failed.
    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    /// Invoker setup or dispatch failed.
    #[error("invoker error: {0}")]
    Invoker(#[from] crate::invoker::InvokeError),

    /// Locker backend failed.
    #[error("locker error: {0}")]
    Locker(#[from] crate::locker::LockerError),

    /// Monitoring endpoint transport failed.
    #[error("monitoring transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the relay [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

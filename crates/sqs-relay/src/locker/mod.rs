// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Duplicate suppression for received messages.
//!
//! A locker takes a short-lived lease on a message id when the fetcher first
//! sees it. While the lease is held, redeliveries of the same id are skipped
//! instead of entering the pipeline. Leases expire on their own after a TTL,
//! so a crashed daemon cannot block an id forever.
//!
//! The default backend is [`NoopLocker`], which never refuses a lock.
//! [`MemoryLocker`] provides real suppression within a single process;
//! a distributed backend (conditional-put KV with TTL) can be plugged in
//! by implementing [`Locker`].

mod memory;
mod noop;

pub use memory::MemoryLocker;
pub use noop::NoopLocker;

use async_trait::async_trait;
use thiserror::Error;

/// Locker failures.
#[derive(Debug, Error)]
pub enum LockerError {
    /// The id already holds an unexpired lease. The duplicate delivery is
    /// skipped; its receipt is left to expire upstream.
    #[error("message is already locked: {0}")]
    AlreadyLocked(String),

    /// Backend failure. The fetch batch that triggered it is abandoned.
    #[error("locker backend error: {0}")]
    Backend(String),
}

/// Lease-based duplicate suppression keyed by message id.
#[async_trait]
pub trait Locker: Send + Sync {
    /// Take a lease on `id`. Fails with [`LockerError::AlreadyLocked`] when
    /// an unexpired lease exists.
    async fn lock(&self, id: &str) -> Result<(), LockerError>;

    /// Release the lease on `id`. Unlocking an id that holds no lease is
    /// not an error.
    async fn unlock(&self, id: &str) -> Result<(), LockerError>;
}

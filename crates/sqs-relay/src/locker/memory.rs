// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process locker backend.
//!
//! Suppresses duplicate deliveries within a single daemon. Leases live in a
//! plain map and carry an expiry instant; expired leases are pruned lazily
//! on the next lock attempt for the same id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Locker, LockerError};

/// How long a lease survives if the holder never unlocks.
///
/// Matches the upstream redelivery horizon rather than the visibility
/// timeout: a crashed daemon should not re-process the same delivery burst,
/// but the id must come free eventually.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Locker keeping leases in process memory.
pub struct MemoryLocker {
    ttl: Duration,
    leases: Mutex<HashMap<String, Instant>>,
}

impl MemoryLocker {
    /// Create a locker whose leases expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `id` currently holds an unexpired lease.
    pub async fn is_locked(&self, id: &str) -> bool {
        let leases = self.leases.lock().await;
        leases.get(id).is_some_and(|expiry| *expiry > Instant::now())
    }
}

impl Default for MemoryLocker {
    fn default() -> Self {
        Self::new(DEFAULT_LEASE_TTL)
    }
}

#[async_trait]
impl Locker for MemoryLocker {
    async fn lock(&self, id: &str) -> Result<(), LockerError> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();
        if let Some(expiry) = leases.get(id) {
            if *expiry > now {
                return Err(LockerError::AlreadyLocked(id.to_owned()));
            }
        }
        leases.insert(id.to_owned(), now + self.ttl);
        Ok(())
    }

    async fn unlock(&self, id: &str) -> Result<(), LockerError> {
        self.leases.lock().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_refuses_duplicates() {
        let locker = MemoryLocker::default();
        locker.lock("a").await.unwrap();

        let err = locker.lock("a").await.unwrap_err();
        assert!(matches!(err, LockerError::AlreadyLocked(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_unlock_frees_the_id() {
        let locker = MemoryLocker::default();
        locker.lock("a").await.unwrap();
        locker.unlock("a").await.unwrap();
        locker.lock("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_unlock_unknown_id_is_not_an_error() {
        let locker = MemoryLocker::default();
        locker.unlock("never-seen").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_relocked() {
        let locker = MemoryLocker::new(Duration::from_millis(20));
        locker.lock("a").await.unwrap();
        assert!(locker.is_locked("a").await);

        std::thread::sleep(Duration::from_millis(40));
        assert!(!locker.is_locked("a").await);
        locker.lock("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_independent_ids_do_not_interfere() {
        let locker = MemoryLocker::default();
        locker.lock("a").await.unwrap();
        locker.lock("b").await.unwrap();
        locker.unlock("a").await.unwrap();
        assert!(!locker.is_locked("a").await);
        assert!(locker.is_locked("b").await);
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Default locker backend: every lock succeeds.

use async_trait::async_trait;

use super::{Locker, LockerError};

/// Locker used when duplicate suppression is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLocker;

#[async_trait]
impl Locker for NoopLocker {
    async fn lock(&self, _id: &str) -> Result<(), LockerError> {
        Ok(())
    }

    async fn unlock(&self, _id: &str) -> Result<(), LockerError> {
        Ok(())
    }
}

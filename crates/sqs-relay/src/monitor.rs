// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-only monitoring surface.
//!
//! Serves `monitoring.Monitoring/CurrentWorkings` over gRPC: the set of
//! in-flight messages ordered by receipt time. The service holds a
//! non-owning handle to the in-flight registry and copies it out per
//! request, so producers are never blocked by observers.

use std::sync::Arc;

use sqs_relay_proto::monitoring_proto::monitoring_server::{Monitoring, MonitoringServer};
use sqs_relay_proto::{CurrentWorkingsRequest, CurrentWorkingsResponse, Task};
use tonic::{Request, Response, Status};

use crate::broker::InFlightTracker;

/// gRPC service exposing the in-flight message set.
pub struct MonitoringService {
    tracker: Arc<InFlightTracker>,
}

impl MonitoringService {
    /// Create a service reading from `tracker`.
    pub fn new(tracker: Arc<InFlightTracker>) -> Self {
        Self { tracker }
    }

    /// Wrap the service for registration with a tonic server.
    pub fn into_server(self) -> MonitoringServer<Self> {
        MonitoringServer::new(self)
    }
}

#[tonic::async_trait]
impl Monitoring for MonitoringService {
    async fn current_workings(
        &self,
        _request: Request<CurrentWorkingsRequest>,
    ) -> Result<Response<CurrentWorkingsResponse>, Status> {
        let tasks = self
            .tracker
            .snapshot()
            .into_iter()
            .map(|summary| Task {
                id: summary.id,
                received_at: summary.received_at.to_rfc3339(),
                status: summary.status.as_str().to_owned(),
            })
            .collect();
        Ok(Response::new(CurrentWorkingsResponse { tasks }))
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protocol definitions for the sqs-relay monitoring endpoint.
//!
//! The daemon serves a single gRPC service, `monitoring.Monitoring`, on
//! `MONITORING_PORT`. The proto source lives in `proto/monitoring.proto`
//! and is compiled by `build.rs`.

/// Generated types and service stubs for the monitoring protocol.
pub mod monitoring_proto {
    tonic::include_proto!("monitoring");
}

pub use monitoring_proto::monitoring_client::MonitoringClient;
pub use monitoring_proto::monitoring_server::{Monitoring, MonitoringServer};
pub use monitoring_proto::{CurrentWorkingsRequest, CurrentWorkingsResponse, Task};

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
use std::io::Result;

fn main() -> Result<()> {
    // Compile the monitoring protocol (read-only view of in-flight messages)
    tonic_build::compile_protos("proto/monitoring.proto")?;

    Ok(())
}

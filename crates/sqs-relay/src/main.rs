// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! sqs-relay daemon entry point.
//!
//! Loads configuration from the environment, wires the pipeline against the
//! real SQS client and HTTP invoker, then runs until SIGINT or SIGTERM
//! triggers a graceful drain.

use std::sync::Arc;

use tracing::info;

use sqs_relay::config::Config;
use sqs_relay::invoker::HttpInvoker;
use sqs_relay::queue::SqsQueue;
use sqs_relay::runtime::RelayRuntimeBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("sqs_relay={}", config.log_level))
            }),
        )
        .init();

    info!("start process");
    info!(
        url = %config.queue_url,
        parallel = config.fetcher_parallel,
        "queue settings"
    );
    info!(
        url = %config.invoker_url,
        parallel = config.invoker_parallel,
        timeout_secs = config.invoker_timeout.as_secs(),
        "invoker settings"
    );

    let queue = Arc::new(SqsQueue::from_config(&config).await);
    let invoker = Arc::new(HttpInvoker::new(
        &config.invoker_url,
        config.invoker_timeout,
    )?);

    let runtime = RelayRuntimeBuilder::from_config(&config)
        .queue(queue)
        .invoker(invoker)
        .build()?
        .start()
        .await?;

    wait_for_signal().await?;
    info!("signal caught. stopping worker...");

    runtime.shutdown().await?;
    info!("end process");

    Ok(())
}

/// Block until SIGINT or SIGTERM arrives.
async fn wait_for_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => info!(signal = "SIGINT", "received signal"),
        _ = terminate.recv() => info!(signal = "SIGTERM", "received signal"),
    }
    Ok(())
}

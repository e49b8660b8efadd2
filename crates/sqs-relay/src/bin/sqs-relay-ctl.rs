// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Relay control CLI
//!
//! Queries the monitoring endpoint of a running relay daemon.
//!
//! Usage:
//!   sqs-relay-ctl [--addr <host:port>] [--json]
//!
//! Without options it connects to `127.0.0.1:<MONITORING_PORT>` (default
//! 6969) and prints one line per in-flight message.

use std::process::ExitCode;

use sqs_relay_proto::{CurrentWorkingsRequest, MonitoringClient};

fn print_usage() {
    eprintln!(
        r#"Usage: sqs-relay-ctl [options]

Query the monitoring endpoint of a running relay daemon.

OPTIONS:
    --addr <host:port>    Monitoring endpoint address (default: 127.0.0.1:6969)
    --json                Print the in-flight set as JSON

ENVIRONMENT:
    MONITORING_PORT       Port used when --addr is not given
"#
    );
}

struct Args {
    addr: String,
    json: bool,
}

/// `Ok(None)` means help was requested and usage should be printed.
fn parse_args() -> Result<Option<Args>, String> {
    let default_port = std::env::var("MONITORING_PORT").unwrap_or_else(|_| "6969".to_owned());
    let mut args = Args {
        addr: format!("127.0.0.1:{default_port}"),
        json: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--addr" => {
                args.addr = iter
                    .next()
                    .ok_or_else(|| "--addr requires a value".to_owned())?;
            }
            "--json" => args.json = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("unknown option: {other}")),
        }
    }
    Ok(Some(args))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("error: {message}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let mut client = MonitoringClient::connect(format!("http://{}", args.addr)).await?;
    let response = client
        .current_workings(CurrentWorkingsRequest {})
        .await?
        .into_inner();

    if args.json {
        let tasks: Vec<serde_json::Value> = response
            .tasks
            .iter()
            .map(|task| {
                serde_json::json!({
                    "id": task.id,
                    "received_at": task.received_at,
                    "status": task.status,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if response.tasks.is_empty() {
        println!("no messages in flight");
        return Ok(());
    }
    for task in response.tasks {
        println!("{}  {}  {}", task.received_at, task.status, task.id);
    }
    Ok(())
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daemon configuration loaded from environment variables.

use std::time::Duration;

use tracing::Level;

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker HTTP endpoint messages are dispatched to.
    pub invoker_url: String,
    /// Upstream queue URL.
    pub queue_url: String,
    /// Per-call deadline for a single invocation.
    pub invoker_timeout: Duration,
    /// Number of parallel fetch loops.
    pub fetcher_parallel: usize,
    /// Number of consumer workers.
    pub invoker_parallel: usize,
    /// Port the monitoring gRPC endpoint binds on.
    pub monitoring_port: u16,
    /// Log level for the daemon's own output.
    pub log_level: Level,
    /// Queue endpoint override, for local queues and test stacks.
    pub sqs_endpoint_url: Option<String>,
    /// Queue region.
    pub aws_region: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let invoker_url = required("INVOKER_URL")?;
        let queue_url = required("QUEUE_URL")?;

        let invoker_timeout =
            Duration::from_secs(parse_or("DEFAULT_INVOKER_TIMEOUT_SECONDS", 60)?);
        let fetcher_parallel = positive("FETCHER_PARALLEL_COUNT", 1)?;
        let invoker_parallel = positive("INVOKER_PARALLEL_COUNT", 1)?;

        let monitoring_port: u16 = match std::env::var("MONITORING_PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidInt {
                key: "MONITORING_PORT",
                value,
            })?,
            Err(_) => 6969,
        };

        let log_level = match std::env::var("LOG_LEVEL") {
            Ok(value) => match value.as_str() {
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "error" => Level::ERROR,
                _ => return Err(ConfigError::UnknownLogLevel(value)),
            },
            Err(_) => Level::INFO,
        };

        let sqs_endpoint_url = std::env::var("SQS_ENDPOINT_URL").ok();
        let aws_region = std::env::var("AWS_REGION").ok();

        Ok(Self {
            invoker_url,
            queue_url,
            invoker_timeout,
            fetcher_parallel,
            invoker_parallel,
            monitoring_port,
            log_level,
            sqs_endpoint_url,
            aws_region,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(key)),
    }
}

fn parse_or(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|_| ConfigError::InvalidInt { key, value }),
        _ => Ok(default),
    }
}

fn positive(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => match value.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n as usize),
            Ok(_) => Err(ConfigError::NonPositive { key, value }),
            Err(_) => Err(ConfigError::InvalidInt { key, value }),
        },
        _ => Ok(default),
    }
}

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable holds a value that does not parse as an
    /// integer in range.
    #[error("invalid value for {key}: {value}")]
    InvalidInt {
        /// The offending variable.
        key: &'static str,
        /// The value found in the environment.
        value: String,
    },
    /// A parallelism knob was set to zero or a negative number.
    #[error("{key} must be a positive integer, got {value}")]
    NonPositive {
        /// The offending variable.
        key: &'static str,
        /// The value found in the environment.
        value: String,
    },
    /// `LOG_LEVEL` is set to something other than debug, info or error.
    #[error("unknown LOG_LEVEL: {0} (expected debug, info or error)")]
    UnknownLogLevel(String),
}

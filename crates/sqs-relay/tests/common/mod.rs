// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for pipeline tests.
//!
//! Provides a scripted queue double, a scripted invoker double, a minimal
//! HTTP fixture server for exercising the real invoker, and small helpers
//! for building runtimes and awaiting conditions.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sqs_relay::fetcher::FetcherConfig;
use sqs_relay::invoker::{InvokeError, Invoker};
use sqs_relay::message::Message;
use sqs_relay::queue::{QueueClient, QueueError, RawMessage, ReceiveOptions};
use sqs_relay::runtime::RelayRuntimeBuilder;

/// Build a raw delivery for scripting the queue double.
pub fn raw(id: &str, body: &str, receipt: &str) -> RawMessage {
    RawMessage {
        id: id.to_owned(),
        body: body.to_owned(),
        receipt: receipt.to_owned(),
    }
}

/// Queue double returning pre-scripted batches.
///
/// Each receive call pops one scripted batch; once the script is exhausted
/// receives return empty, like a quiet queue. Redelivery is simulated by
/// pushing another batch with the same message id.
pub struct MockQueue {
    batches: Mutex<VecDeque<Vec<RawMessage>>>,
    deleted: Mutex<Vec<String>>,
    receive_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl MockQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(VecDeque::new()),
            deleted: Mutex::new(Vec::new()),
            receive_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
        })
    }

    pub fn push_batch(&self, batch: Vec<RawMessage>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    /// Receipts deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    /// Total delete attempts, including failed ones.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueClient for MockQueue {
    async fn receive(&self, _opts: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(QueueError::Delete("scripted failure".into()));
        }
        self.deleted.lock().unwrap().push(receipt.to_owned());
        Ok(())
    }
}

/// Invoker double recording calls and returning scripted outcomes.
pub struct MockInvoker {
    calls: Mutex<Vec<String>>,
    fail_ids: Mutex<HashSet<String>>,
    delay: Duration,
}

impl MockInvoker {
    /// `delay` is slept before every outcome, to simulate worker latency.
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_ids: Mutex::new(HashSet::new()),
            delay,
        })
    }

    /// Make invocations of `id` fail with a 500-class status.
    pub fn fail_id(&self, id: &str) {
        self.fail_ids.lock().unwrap().insert(id.to_owned());
    }

    /// Let invocations of `id` succeed again.
    pub fn clear_fail(&self, id: &str) {
        self.fail_ids.lock().unwrap().remove(id);
    }

    /// Message ids in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    async fn invoke(&self, message: &Message) -> Result<(), InvokeError> {
        self.calls.lock().unwrap().push(message.id().to_owned());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_ids.lock().unwrap().contains(message.id()) {
            return Err(InvokeError::FailureStatus { status: 500 });
        }
        Ok(())
    }
}

/// Builder pre-configured for tests: fast polling, no monitoring endpoint.
pub fn runtime_builder(
    queue: Arc<MockQueue>,
    invoker: Arc<MockInvoker>,
) -> RelayRuntimeBuilder {
    RelayRuntimeBuilder::new()
        .queue(queue)
        .invoker(invoker)
        .fetcher_config(FetcherConfig {
            poll_interval: Duration::from_millis(10),
            ..FetcherConfig::default()
        })
}

/// Poll `condition` until it holds, panicking after a generous deadline.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(120), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if result.is_err() {
        panic!("timed out waiting for {what}");
    }
}

/// One request as seen by [`TestHttpServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Minimal HTTP fixture server for invoker tests.
///
/// Routes by path: `/ok` answers 200, `/error` 500, `/client-error` 400,
/// `/not-modified` 304, `/long` sleeps 500 ms then answers 200. Every
/// request is recorded before the response is written.
pub struct TestHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestHttpServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let accept_log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let requests = accept_log.clone();
                tokio::spawn(async move {
                    handle_connection(stream, requests).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_connection(mut stream: TcpStream, requests: Arc<Mutex<Vec<RecordedRequest>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or("/").to_owned();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_owned();
            let value = value.trim().to_owned();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let (code, reason) = match path.as_str() {
        "/ok" => (200, "OK"),
        "/error" => (500, "Internal Server Error"),
        "/client-error" => (400, "Bad Request"),
        "/not-modified" => (304, "Not Modified"),
        "/long" => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            (200, "OK")
        }
        _ => (404, "Not Found"),
    };

    let response =
        format!("HTTP/1.1 {code} {reason}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

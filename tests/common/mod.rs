//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use trace_correlator::config::{BackpressurePolicy, CorrelatorConfig};
use trace_correlator::context::TraceContext;
use trace_correlator::events::LogEvent;
use trace_correlator::propagation::{self, Headers};
use trace_correlator::shipper::{DeliveryError, IngestSink, StoreSink};
use trace_correlator::store::CorrelationStore;
use trace_correlator::Correlator;

/// Config tuned for fast tests: small batches, short intervals, tiny backoff.
pub fn test_config(service: &str) -> CorrelatorConfig {
    let mut config = CorrelatorConfig::default();
    config.service.name = service.to_string();
    config.shipper.batch_size = 8;
    config.shipper.batch_interval_ms = 10;
    config.shipper.max_queue_depth = 1000;
    config.shipper.backpressure_policy = BackpressurePolicy::Block;
    config.shipper.max_retry_attempts = 3;
    config.shipper.backoff_base_ms = 1;
    config.shipper.backoff_max_ms = 5;
    config
}

/// A service instance shipping into a shared in-process store.
pub fn start_service(service: &str, store: &CorrelationStore) -> Correlator {
    Correlator::start_with_sink(test_config(service), Arc::new(StoreSink::new(store.clone())))
        .unwrap()
}

/// Outbound call: encode the caller's context into a header map.
pub fn outbound_headers(context: &TraceContext) -> Headers {
    propagation::encode(context)
}

/// Records every batch it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LogEvent> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|line| LogEvent::from_json(line).unwrap())
            .collect()
    }
}

#[async_trait]
impl IngestSink for RecordingSink {
    async fn deliver(&self, batch: &[String]) -> Result<(), DeliveryError> {
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Sink that refuses every batch until `healthy` is set.
#[derive(Default)]
pub struct OutageSink {
    pub healthy: std::sync::atomic::AtomicBool,
    pub attempts: std::sync::atomic::AtomicU32,
    pub delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl IngestSink for OutageSink {
    async fn deliver(&self, batch: &[String]) -> Result<(), DeliveryError> {
        use std::sync::atomic::Ordering;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transient("collector unavailable".into()));
        }
        self.delivered.lock().extend_from_slice(batch);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "outage"
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Start a programmable HTTP endpoint on an ephemeral port.
///
/// `f` receives the request body and returns the status and body to send.
pub async fn start_programmable_endpoint<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(body) = read_request_body(&mut socket).await else {
                    return;
                };
                let (status, body) = f(body).await;
                let status_text = match status {
                    200 => "200 OK",
                    400 => "400 Bad Request",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let headers: HashMap<String, String> = head
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (header_end + length).min(buf.len());
    Some(String::from_utf8_lossy(&buf[header_end..end]).to_string())
}

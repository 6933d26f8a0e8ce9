//! Delivery targets for event batches.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::events::LogEvent;
use crate::store::{CorrelationStore, StoreError};

/// Why a batch was not delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Worth retrying (network error, 5xx, 429, store I/O).
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Retrying cannot help (rejected payload, misconfigured endpoint).
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Receives batches of serialized events, at least once.
#[async_trait]
pub trait IngestSink: Send + Sync + 'static {
    async fn deliver(&self, batch: &[String]) -> Result<(), DeliveryError>;

    /// Short label for diagnostics.
    fn name(&self) -> &'static str;
}

/// POSTs NDJSON batches to a collector's ingest endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(status: StatusCode) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(DeliveryError::Transient(format!("collector returned {status}")))
    } else {
        Err(DeliveryError::Permanent(format!("collector returned {status}")))
    }
}

#[async_trait]
impl IngestSink for HttpSink {
    async fn deliver(&self, batch: &[String]) -> Result<(), DeliveryError> {
        let mut body = batch.join("\n");
        body.push('\n');
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;
        classify(response.status())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Inserts batches straight into an in-process store.
#[derive(Debug, Clone)]
pub struct StoreSink {
    store: CorrelationStore,
}

impl StoreSink {
    pub fn new(store: CorrelationStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IngestSink for StoreSink {
    async fn deliver(&self, batch: &[String]) -> Result<(), DeliveryError> {
        for line in batch {
            let event = match LogEvent::from_json(line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding undecodable event");
                    continue;
                }
            };
            // A partially applied batch is safe to retry: inserts are idempotent.
            self.store.insert(event).map_err(|e| match e {
                StoreError::Io(_) => DeliveryError::Transient(e.to_string()),
                other => DeliveryError::Permanent(other.to_string()),
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "store"
    }
}

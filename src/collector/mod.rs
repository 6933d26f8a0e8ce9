//! Collector: HTTP ingestion and query surface over a correlation store.
//!
//! # Endpoints
//! - `POST /v1/ingest`: NDJSON LogEvents, one per line
//! - `GET /v1/traces/{trace_id}`: time-ordered events of one trace, paginated
//! - `GET /v1/traces/{trace_id}/summary`: services, spans and integrity of a trace
//! - `GET /v1/events`: level/service/time-range search, paginated
//! - `GET /health`: liveness and store counters

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, IngestResponse};
pub use server::{spawn, CollectorServer, CollectorState};

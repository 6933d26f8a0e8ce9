//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Correlator internals produce:
//!     → logging.rs (diagnostic log lines via tracing)
//!     → metrics.rs (queue depth, drops, retries, orphan spans)
//!
//! Consumers:
//!     → stdout (JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Batch delivery to the ingestion endpoint:
//!     → shipper worker attempts delivery
//!     → On transient failure: backoff.rs (exponential delay + jitter)
//!     → After max attempts: spill to overflow spool or drop and count
//! ```
//!
//! # Design Decisions
//! - Retry budget is per batch, never shared between workers
//! - Jittered backoff prevents synchronized retry storms across a fleet

pub mod backoff;

pub use backoff::Backoff;

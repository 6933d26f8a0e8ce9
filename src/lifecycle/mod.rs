//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     ctrl-c / Correlator::shutdown → trigger → background loops exit
//!
//! Sweeper (sweeper.rs):
//!     every sweep_interval → close spans older than span_ttl as timeout
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop background loops, then flush the shipper

pub mod shutdown;
pub mod sweeper;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use sweeper::SpanSweeper;

//! Correlation store and query.
//!
//! # Responsibilities
//! - Persist events append-only, idempotently by content identity
//! - Index by trace id, service, level and time
//! - Serve ordered, paginated trace reconstruction and filtered searches
//!
//! # Data Flow
//! ```text
//! insert(event)
//!     → identity.rs (SHA-256 of traceId/spanId/timestamp/service)
//!     → journal.rs (append, when configured)
//!     → index.rs (ordered position lists)
//!
//! query_trace / query_events
//!     → query.rs (cursor decode, range scan, page assembly)
//! ```

pub mod correlation;
pub mod identity;
pub mod index;
pub mod journal;
pub mod query;

pub use correlation::{BatchOutcome, CorrelationStore, InsertOutcome, StoreError};
pub use identity::EventId;
pub use query::{EventFilter, Page, PageRequest, StoreStats, TimeRange, TraceSummary};

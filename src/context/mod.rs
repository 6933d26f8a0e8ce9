//! Trace context management.
//!
//! # Data Flow
//! ```text
//! Request ingress
//!     → manager.rs (root span, or child of decoded headers)
//!     → scope.rs (push onto the unit-local stack for the request's duration)
//!     → business code reads current_context() / attaches fields
//!     → scope exit pops, on every exit path
//!
//! Span lifecycle:
//!     span.rs (registry of open spans) ← tracer facade opens/closes
//!     lifecycle::sweeper closes spans that outlive their TTL
//! ```
//!
//! # Design Decisions
//! - No shared mutable context state: each unit owns its stack
//! - Sampling is decided once at the root and copied to every descendant
//! - Cross-unit handoff is always explicit (capture, then enter)

pub mod ids;
pub mod manager;
pub mod sampler;
pub mod scope;
pub mod span;
pub mod trace_context;

pub use ids::{SpanId, TraceId};
pub use manager::ContextManager;
pub use sampler::{Sampler, SamplingPolicy};
pub use scope::{
    attach, capture_scope, current_context, current_fields, with_context, with_fields,
    ContextError, Fields, Scope, ScopeExt, ScopeGuard, Scoped,
};
pub use span::{OpenSpan, SpanRegistry, SpanStatus};
pub use trace_context::{Baggage, TraceContext};

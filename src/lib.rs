//! Trace Correlator Library
//!
//! Trace-context propagation, structured log emission and a correlation
//! store that reconstructs the cross-service history of one request.

// Core subsystems
pub mod context;
pub mod events;
pub mod propagation;
pub mod shipper;
pub mod store;
pub mod tracer;

// Surfaces
pub mod collector;
pub mod correlator;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::CorrelatorConfig;
pub use context::{current_context, with_context, ContextManager, ScopeExt, TraceContext};
pub use correlator::{Correlator, CorrelatorError};
pub use events::{Emitter, Level, LogEvent};
pub use lifecycle::Shutdown;
pub use store::CorrelationStore;
pub use tracer::{Span, Tracer};

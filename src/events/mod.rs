//! Structured log events.
//!
//! # Responsibilities
//! - Define the LogEvent record and its canonical JSON encoding
//! - Stamp every event with the active trace context and scoped fields
//! - Hand serialized events to the shipper without blocking beyond its bound

pub mod clock;
pub mod emitter;
pub mod event;
pub mod exception;

pub use emitter::{EmitError, Emitter, EmitterStats};
pub use event::{fields, Level, LogEvent, ParseLevelError};
pub use exception::ExceptionInfo;

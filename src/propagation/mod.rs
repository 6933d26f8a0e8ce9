//! Cross-process propagation of trace contexts.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     current_context() → codec::inject → request headers
//!
//! Inbound call:
//!     request headers → codec::decode → Some(remote) → child span
//!                                     → None         → root span
//! ```
//!
//! # Design Decisions
//! - The codec is a pure function pair; nothing is injected implicitly
//! - `HeaderCarrier` lets the same codec serve maps and HTTP headers

pub mod carrier;
pub mod codec;
pub mod middleware;

pub use carrier::HeaderCarrier;
pub use codec::{decode, encode, inject, Headers};
pub use middleware::propagate_trace_context;

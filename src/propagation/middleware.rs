//! HTTP ingress integration.
//!
//! # Responsibilities
//! - Decode propagation headers on every inbound request (codec, explicitly)
//! - Open a span for the request and run the handler inside its context
//! - Echo the trace id to the caller
//!
//! # Design Decisions
//! - Missing/malformed headers start a new root span, never a 4xx
//! - 5xx responses close the span as `error`; a dropped request future
//!   (client gone, timeout layer) closes it as `cancelled` via the guard

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use crate::context::{ScopeExt, SpanStatus};
use crate::propagation::codec::TRACE_ID_HEADER;
use crate::tracer::Tracer;

/// Axum middleware; install with `axum::middleware::from_fn_with_state(tracer, propagate_trace_context)`.
pub async fn propagate_trace_context(
    State(tracer): State<Tracer>,
    mut request: Request,
    next: Next,
) -> Response {
    let name = format!("{} {}", request.method(), request.uri().path());
    let span = tracer.continue_from(request.headers(), name);
    let context = span.context().clone();
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).in_context(context.clone()).await;

    let status = if response.status().is_server_error() {
        SpanStatus::Error
    } else {
        SpanStatus::Ok
    };
    span.finish(status);

    if let Ok(value) = HeaderValue::from_str(context.trace_id().as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

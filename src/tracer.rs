//! Span lifecycle facade.
//!
//! # Responsibilities
//! - Open spans (root, child, or continued from inbound headers)
//! - Emit exactly one `span closed` event per span, whoever closes it
//! - Close spans dropped unfinished as `cancelled`
//! - Close spans that outlived their TTL as `timeout` (driven by the sweeper)
//!
//! # Design Decisions
//! - The registry entry is the close token: whoever removes it emits the
//!   closing event, so guard drop and sweeper can race without doubles
//! - A span is not entered implicitly; callers enter it (or wrap their
//!   future) where their unit of work actually runs

use std::sync::Arc;
use std::time::Duration;

use crate::context::{
    ContextManager, Fields, OpenSpan, Scope, ScopeGuard, SpanRegistry, SpanStatus, TraceContext,
};
use crate::events::{Emitter, Level};
use crate::observability::metrics;
use crate::propagation::HeaderCarrier;

/// Message of the terminal event every span emits.
pub const SPAN_CLOSED_MESSAGE: &str = "span closed";

struct TracerInner {
    manager: ContextManager,
    emitter: Emitter,
    registry: SpanRegistry,
}

/// Cloneable handle opening and closing spans for one service.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("service", &self.inner.emitter.service())
            .field("open_spans", &self.inner.registry.len())
            .finish()
    }
}

impl Tracer {
    /// Spans are created with the emitter's context manager.
    pub fn new(emitter: Emitter) -> Self {
        Self {
            inner: Arc::new(TracerInner {
                manager: emitter.manager().clone(),
                emitter,
                registry: SpanRegistry::new(),
            }),
        }
    }

    pub fn manager(&self) -> &ContextManager {
        &self.inner.manager
    }

    pub fn emitter(&self) -> &Emitter {
        &self.inner.emitter
    }

    pub fn open_spans(&self) -> usize {
        self.inner.registry.len()
    }

    /// New trace.
    pub fn root_span(&self, name: impl Into<String>) -> Span {
        let context = self.inner.manager.begin_root_span();
        self.open(context, name.into())
    }

    pub fn child_span(&self, parent: &TraceContext, name: impl Into<String>) -> Span {
        let context = self.inner.manager.begin_child_span(parent);
        self.open(context, name.into())
    }

    /// Child of the active context, or a new root outside any scope.
    pub fn span(&self, name: impl Into<String>) -> Span {
        let context = self.inner.manager.begin_span();
        self.open(context, name.into())
    }

    /// Continue the caller's trace from propagation headers.
    pub fn continue_from<C: HeaderCarrier + ?Sized>(&self, carrier: &C, name: impl Into<String>) -> Span {
        let context = self.inner.manager.continue_or_begin(carrier);
        self.open(context, name.into())
    }

    /// Close every span open for longer than `ttl` as `timeout`.
    pub fn close_expired(&self, ttl: Duration) -> usize {
        let expired = self.inner.registry.take_expired(ttl);
        for span in &expired {
            tracing::warn!(
                trace_id = %span.context.trace_id(),
                span_id = %span.context.span_id(),
                span = %span.name,
                "Closing span that exceeded its TTL"
            );
            self.emit_closed(span, SpanStatus::Timeout);
        }
        if !expired.is_empty() {
            metrics::record_orphan_closed(expired.len() as u64);
        }
        expired.len()
    }

    fn open(&self, context: TraceContext, name: String) -> Span {
        self.inner.registry.open(context.clone(), name);
        Span {
            tracer: self.clone(),
            context,
            finished: false,
        }
    }

    fn close(&self, context: &TraceContext, status: SpanStatus) {
        if let Some(span) = self.inner.registry.close(context.span_id()) {
            self.emit_closed(&span, status);
        }
    }

    fn emit_closed(&self, span: &OpenSpan, status: SpanStatus) {
        let level = match status {
            SpanStatus::Ok => Level::Info,
            SpanStatus::Cancelled | SpanStatus::Timeout => Level::Warn,
            SpanStatus::Error => Level::Error,
        };
        let mut fields = Fields::new();
        fields.insert("spanName".to_string(), span.name.clone());
        fields.insert("spanStatus".to_string(), status.as_str().to_string());
        let _ = self
            .inner
            .emitter
            .emit_for(&span.context, level, SPAN_CLOSED_MESSAGE, fields);
    }
}

/// An open span; closes as `cancelled` if dropped before [`Span::finish`].
#[must_use = "dropping a span closes it as cancelled"]
#[derive(Debug)]
pub struct Span {
    tracer: Tracer,
    context: TraceContext,
    finished: bool,
}

impl Span {
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Make this span the active context until the guard drops.
    pub fn enter(&self) -> ScopeGuard {
        Scope::new(self.context.clone()).enter()
    }

    /// Run `body` inside this span.
    pub fn in_scope<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        body()
    }

    /// Close with an explicit status.
    pub fn finish(mut self, status: SpanStatus) {
        self.close(status);
    }

    fn close(&mut self, status: SpanStatus) {
        if !self.finished {
            self.finished = true;
            self.tracer.close(&self.context, status);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.close(SpanStatus::Cancelled);
    }
}

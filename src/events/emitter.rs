//! Structured log emission.
//!
//! # Data Flow
//! ```text
//! emit(level, message, extra)
//!     → current_context() (or a synthesized root, warned once)
//!     → scoped fields merged with extra (extra wins)
//!     → LogEvent → canonical JSON
//!     → EventQueue::enqueue (bounded; may wait up to enqueue_timeout)
//! ```
//!
//! # Design Decisions
//! - `emit` is fail-open: logging-internal failures are counted, never raised
//! - Events of unsampled traces stop here and are counted as `sampled_out`

use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::context::{scope, ContextError, ContextManager, Fields, TraceContext};
use crate::events::clock;
use crate::events::event::{Level, LogEvent};
use crate::events::exception::ExceptionInfo;
use crate::observability::metrics;
use crate::shipper::{EnqueueError, EventQueue};

/// Non-fatal reasons an event was not handed to the shipper.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("shipper queue full")]
    QueueFull,

    #[error("event dropped by backpressure policy")]
    Dropped,

    #[error("shipper is closed")]
    Closed,

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<EnqueueError> for EmitError {
    fn from(err: EnqueueError) -> Self {
        match err {
            EnqueueError::QueueFull(_) => EmitError::QueueFull,
            EnqueueError::Dropped => EmitError::Dropped,
            EnqueueError::Closed => EmitError::Closed,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    emitted: AtomicU64,
    sampled_out: AtomicU64,
    synthesized_roots: AtomicU64,
    queue_full: AtomicU64,
    dropped: AtomicU64,
    closed: AtomicU64,
    serialize_failures: AtomicU64,
}

/// Emitter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitterStats {
    pub emitted: u64,
    pub sampled_out: u64,
    pub synthesized_roots: u64,
    pub queue_full: u64,
    pub dropped: u64,
    pub closed: u64,
    pub serialize_failures: u64,
}

impl EmitterStats {
    /// Events that were meant to ship but did not.
    pub fn internal_failures(&self) -> u64 {
        self.queue_full + self.dropped + self.closed + self.serialize_failures
    }
}

struct Shared {
    service: String,
    manager: ContextManager,
    queue: EventQueue,
    counters: Counters,
    warned_no_context: AtomicBool,
}

/// Builds and enqueues LogEvents for one service.
///
/// Cheap to clone; `with_logger` derives a handle with another logger name
/// that shares queue and counters.
#[derive(Clone)]
pub struct Emitter {
    shared: Arc<Shared>,
    logger: Arc<str>,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("service", &self.shared.service)
            .field("logger", &self.logger)
            .finish()
    }
}

impl Emitter {
    pub fn new(service: impl Into<String>, manager: ContextManager, queue: EventQueue) -> Self {
        let service = service.into();
        let logger: Arc<str> = Arc::from(service.as_str());
        Self {
            shared: Arc::new(Shared {
                service,
                manager,
                queue,
                counters: Counters::default(),
                warned_no_context: AtomicBool::new(false),
            }),
            logger,
        }
    }

    pub fn with_logger(&self, logger: impl AsRef<str>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            logger: Arc::from(logger.as_ref()),
        }
    }

    pub fn service(&self) -> &str {
        &self.shared.service
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn manager(&self) -> &ContextManager {
        &self.shared.manager
    }

    /// Emit in the active context; failures are counted, never returned.
    pub fn emit(&self, level: Level, message: impl Into<String>, extra: Fields) {
        let _ = self.try_emit(level, message, extra);
    }

    /// Emit in the active context and report why the event was not queued.
    pub fn try_emit(
        &self,
        level: Level,
        message: impl Into<String>,
        extra: Fields,
    ) -> Result<(), EmitError> {
        let context = self.resolve_context();
        self.ship(&context, level, message.into(), extra, None)
    }

    /// ERROR event describing `err`.
    pub fn emit_error<E: Error + 'static>(&self, message: impl Into<String>, err: &E, extra: Fields) {
        let context = self.resolve_context();
        let exception = ExceptionInfo::from_error(err);
        let _ = self.ship(&context, Level::Error, message.into(), extra, Some(exception));
    }

    /// Emit against an explicit context instead of the active one.
    pub fn emit_for(
        &self,
        context: &TraceContext,
        level: Level,
        message: impl Into<String>,
        extra: Fields,
    ) -> Result<(), EmitError> {
        self.ship(context, level, message.into(), extra, None)
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Level::Debug, message, Fields::new());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message, Fields::new());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warn, message, Fields::new());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message, Fields::new());
    }

    pub fn stats(&self) -> EmitterStats {
        let c = &self.shared.counters;
        EmitterStats {
            emitted: c.emitted.load(Ordering::Relaxed),
            sampled_out: c.sampled_out.load(Ordering::Relaxed),
            synthesized_roots: c.synthesized_roots.load(Ordering::Relaxed),
            queue_full: c.queue_full.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            closed: c.closed.load(Ordering::Relaxed),
            serialize_failures: c.serialize_failures.load(Ordering::Relaxed),
        }
    }

    fn resolve_context(&self) -> TraceContext {
        match scope::current_context() {
            Ok(context) => context,
            Err(ContextError::NoActiveContext) => {
                if !self.shared.warned_no_context.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        service = %self.shared.service,
                        "Event emitted outside any trace scope, synthesizing root contexts"
                    );
                }
                self.shared
                    .counters
                    .synthesized_roots
                    .fetch_add(1, Ordering::Relaxed);
                self.shared.manager.begin_root_span()
            }
        }
    }

    fn ship(
        &self,
        context: &TraceContext,
        level: Level,
        message: String,
        extra: Fields,
        exception: Option<ExceptionInfo>,
    ) -> Result<(), EmitError> {
        let counters = &self.shared.counters;
        if !context.is_sampled() {
            counters.sampled_out.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let mut fields = scope::current_fields();
        fields.extend(extra);

        let mut event = LogEvent::new(
            clock::now(),
            level,
            self.shared.service.as_str(),
            &*self.logger,
            message,
            context,
        )
        .with_fields(fields);
        event.exception = exception;

        let result = event
            .to_json()
            .map_err(EmitError::from)
            .and_then(|line| self.shared.queue.enqueue(line).map_err(EmitError::from));

        match &result {
            Ok(()) => {
                counters.emitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                let (counter, reason) = match err {
                    EmitError::QueueFull => (&counters.queue_full, "queue_full"),
                    EmitError::Dropped => (&counters.dropped, "dropped"),
                    EmitError::Closed => (&counters.closed, "closed"),
                    EmitError::Serialize(_) => (&counters.serialize_failures, "serialize"),
                };
                counter.fetch_add(1, Ordering::Relaxed);
                metrics::record_emit_failure(reason);
                tracing::debug!(reason, error = %err, "Event not shipped");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackpressurePolicy;
    use crate::context::{attach, with_context, with_fields, Sampler, SamplingPolicy};
    use crate::events::event::fields;
    use crate::shipper::ShipperStats;
    use std::time::Duration;

    fn emitter_with(capacity: usize, policy: BackpressurePolicy, manager: ContextManager) -> (Emitter, EventQueue) {
        let queue = EventQueue::new(
            capacity,
            100,
            policy,
            Duration::from_millis(5),
            Arc::new(ShipperStats::default()),
        );
        (Emitter::new("booking", manager, queue.clone()), queue)
    }

    fn emitter() -> (Emitter, EventQueue) {
        emitter_with(100, BackpressurePolicy::Block, ContextManager::default())
    }

    fn shipped(queue: &EventQueue) -> Vec<LogEvent> {
        queue
            .drain(usize::MAX)
            .iter()
            .map(|line| LogEvent::from_json(line).unwrap())
            .collect()
    }

    #[test]
    fn test_event_carries_active_context() {
        let (emitter, queue) = emitter();
        let ctx = TraceContext::new_root(true).child();
        with_context(ctx.clone(), || emitter.info("booking created"));

        let events = shipped(&queue);
        assert_eq!(events.len(), 1);
        assert_eq!(&events[0].trace_id, ctx.trace_id());
        assert_eq!(&events[0].span_id, ctx.span_id());
        assert_eq!(events[0].parent_span_id.as_ref(), ctx.parent_span_id());
        assert_eq!(events[0].service, "booking");
        assert_eq!(events[0].level, Level::Info);
    }

    #[test]
    fn test_explicit_fields_win() {
        let (emitter, queue) = emitter();
        with_context(TraceContext::new_root(true), || {
            with_fields(fields(&[("userId", "u1"), ("step", "scoped")]), || {
                let _g = attach("bookingId", "b1");
                emitter.emit(Level::Info, "step", fields(&[("step", "explicit")]));
            })
        });
        let event = &shipped(&queue)[0];
        assert_eq!(event.fields["userId"], "u1");
        assert_eq!(event.fields["bookingId"], "b1");
        assert_eq!(event.fields["step"], "explicit");
    }

    #[test]
    fn test_synthesizes_root_outside_scope() {
        let (emitter, queue) = emitter();
        emitter.info("orphan one");
        emitter.info("orphan two");

        let events = shipped(&queue);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.parent_span_id.is_none()));
        assert_ne!(events[0].trace_id, events[1].trace_id);
        assert_eq!(emitter.stats().synthesized_roots, 2);
    }

    #[test]
    fn test_unsampled_not_shipped() {
        let manager = ContextManager::new(Sampler::new(SamplingPolicy::Never));
        let (emitter, queue) = emitter_with(100, BackpressurePolicy::Block, manager.clone());
        with_context(manager.begin_root_span(), || emitter.info("quiet"));
        assert!(queue.is_empty());
        assert_eq!(emitter.stats().sampled_out, 1);
    }

    #[test]
    fn test_emit_error_attaches_exception() {
        let (emitter, queue) = emitter();
        let err = std::io::Error::other("card declined");
        with_context(TraceContext::new_root(true), || {
            emitter.emit_error("payment failed", &err, Fields::new())
        });
        let event = &shipped(&queue)[0];
        assert_eq!(event.level, Level::Error);
        let exception = event.exception.as_ref().unwrap();
        assert!(exception.type_name.contains("io::error::Error"));
        assert_eq!(exception.message, "card declined");
    }

    #[test]
    fn test_fail_open_counts() {
        let (emitter, _queue) = emitter_with(1, BackpressurePolicy::Drop, ContextManager::default());
        with_context(TraceContext::new_root(true), || {
            emitter.info("kept");
            emitter.info("dropped");
            assert!(matches!(emitter.try_emit(Level::Info, "again", Fields::new()), Err(EmitError::Dropped)));
        });
        let stats = emitter.stats();
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.internal_failures(), 2);
    }

    #[test]
    fn test_logger_handles_share_queue() {
        let (emitter, queue) = emitter();
        let payments = emitter.with_logger("booking.payments");
        with_context(TraceContext::new_root(true), || {
            emitter.info("a");
            payments.info("b");
        });
        let events = shipped(&queue);
        assert_eq!(events[0].logger, "booking");
        assert_eq!(events[1].logger, "booking.payments");
        assert_eq!(payments.stats().emitted, 2);
    }
}

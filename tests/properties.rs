//! Cross-cutting guarantees: isolation, trace integrity, idempotency and backpressure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use trace_correlator::config::BackpressurePolicy;
use trace_correlator::context::{ContextManager, ScopeExt, SpanStatus, TraceContext};
use trace_correlator::events::{clock, fields, EmitError, Emitter, Level, LogEvent};
use trace_correlator::shipper::{EventQueue, ShipperStats};
use trace_correlator::store::{CorrelationStore, InsertOutcome, PageRequest};

mod common;
use common::{outbound_headers, start_service};

const CONCURRENT_REQUESTS: usize = 48;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_share_context() {
    let store = CorrelationStore::in_memory();
    let booking = start_service("booking", &store);
    let payment = start_service("payment", &store);

    let mut requests = Vec::new();
    for n in 0..CONCURRENT_REQUESTS {
        let booking = booking.tracer().clone();
        let payment = payment.tracer().clone();
        requests.push(tokio::spawn(async move {
            let root = booking.root_span("POST /bookings");
            let ctx = root.context().clone();
            let request_no = n.to_string();

            let headers = async {
                booking.emitter().emit(
                    Level::Info,
                    "booking received",
                    fields(&[("requestNo", request_no.as_str())]),
                );
                tokio::task::yield_now().await;
                outbound_headers(&trace_correlator::current_context().unwrap())
            }
            .in_context(ctx.clone())
            .await;

            let hop = payment.continue_from(&headers, "charge");
            let hop_ctx = hop.context().clone();
            async {
                tokio::time::sleep(Duration::from_millis((n % 5) as u64)).await;
                payment.emitter().emit(
                    Level::Info,
                    "card charged",
                    fields(&[("requestNo", request_no.as_str())]),
                );
            }
            .in_context(hop_ctx)
            .await;
            hop.finish(SpanStatus::Ok);
            root.finish(SpanStatus::Ok);
            (ctx.trace_id().clone(), request_no)
        }));
    }

    let mut traces = HashMap::new();
    for request in requests {
        let (trace_id, request_no) = request.await.unwrap();
        traces.insert(trace_id, request_no);
    }
    assert_eq!(traces.len(), CONCURRENT_REQUESTS);

    booking.shutdown().await;
    payment.shutdown().await;

    for (trace_id, request_no) in &traces {
        let events = store
            .query_trace(trace_id, &PageRequest::first(100))
            .unwrap()
            .events;
        // Two business events and two span-closed events per request.
        assert_eq!(events.len(), 4, "trace {trace_id}");
        for event in events.iter().filter(|e| e.fields.contains_key("requestNo")) {
            assert_eq!(&event.fields["requestNo"], request_no);
        }

        let summary = store.trace_summary(trace_id).unwrap();
        assert_eq!(summary.root_spans.len(), 1);
        assert!(summary.orphan_spans.is_empty());
        assert_eq!(summary.span_count, 2);
    }
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let store = CorrelationStore::in_memory();
    let ctx = TraceContext::new_root(true);
    let event = LogEvent::new(clock::now(), Level::Info, "booking", "booking", "seat held", &ctx);

    assert_eq!(store.insert(event.clone()).unwrap(), InsertOutcome::Inserted);
    assert_eq!(store.insert(event.clone()).unwrap(), InsertOutcome::Duplicate);
    let outcome = store.insert_batch(vec![event.clone(), event]).unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.duplicates, 2);

    let page = store.query_trace(ctx.trace_id(), &PageRequest::default()).unwrap();
    assert_eq!(page.events.len(), 1);
    assert_eq!(store.stats().duplicates, 3);
}

fn unconsumed_emitter(capacity: usize, policy: BackpressurePolicy, timeout: Duration) -> (Emitter, EventQueue) {
    let queue = EventQueue::new(
        capacity,
        capacity,
        policy,
        timeout,
        Arc::new(ShipperStats::default()),
    );
    let emitter = Emitter::new("booking", ContextManager::default(), queue.clone());
    (emitter, queue)
}

#[test]
fn test_drop_policy_counts_every_lost_event() {
    let (emitter, queue) = unconsumed_emitter(10, BackpressurePolicy::Drop, Duration::ZERO);
    let ctx = TraceContext::new_root(true);

    for i in 0..100u64 {
        let result = emitter.emit_for(&ctx, Level::Info, "tick", Default::default());
        if i < 10 {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(EmitError::Dropped)));
        }
        let dropped = queue.stats().snapshot(queue.len()).dropped_events;
        assert_eq!(dropped, i.saturating_sub(9));
        assert!(queue.len() <= queue.capacity());
    }

    let stats = emitter.stats();
    assert_eq!(stats.emitted, 10);
    assert_eq!(stats.dropped, 90);
    assert_eq!(stats.internal_failures(), 90);
}

#[test]
fn test_block_policy_bounds_the_wait() {
    let timeout = Duration::from_millis(30);
    let (emitter, queue) = unconsumed_emitter(2, BackpressurePolicy::Block, timeout);
    let ctx = TraceContext::new_root(true);
    emitter.emit_for(&ctx, Level::Info, "a", Default::default()).unwrap();
    emitter.emit_for(&ctx, Level::Info, "b", Default::default()).unwrap();

    let started = Instant::now();
    let result = emitter.emit_for(&ctx, Level::Info, "c", Default::default());
    assert!(matches!(result, Err(EmitError::QueueFull)));
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < Duration::from_secs(2));

    let snapshot = queue.stats().snapshot(queue.len());
    assert_eq!(snapshot.queue_full, 1);
    assert_eq!(snapshot.dropped_events, 1);
    assert_eq!(queue.len(), 2);

    // Freeing space lets the next emit through.
    assert_eq!(queue.drain(1).len(), 1);
    emitter.emit_for(&ctx, Level::Info, "d", Default::default()).unwrap();
}

#[test]
fn test_block_policy_wakes_when_space_frees() {
    let (emitter, queue) = unconsumed_emitter(1, BackpressurePolicy::Block, Duration::from_secs(5));
    let ctx = TraceContext::new_root(true);
    emitter.emit_for(&ctx, Level::Info, "first", Default::default()).unwrap();

    let consumer = {
        let queue = queue.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            queue.drain(1)
        })
    };
    let started = Instant::now();
    emitter.emit_for(&ctx, Level::Info, "second", Default::default()).unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(consumer.join().unwrap().len(), 1);
    assert_eq!(queue.len(), 1);
}

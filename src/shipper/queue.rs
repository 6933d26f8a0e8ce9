//! Bounded hand-off queue between emitters and the shipper worker.
//!
//! # Design Decisions
//! - Producers hold the lock only to push; the worker drains a whole batch
//!   per lock acquisition
//! - `block` waits on a condvar with a deadline, so an emitter never waits
//!   longer than `enqueue_timeout`
//! - That wait parks the calling thread. On a multi-thread tokio runtime it
//!   holds one worker for at most the timeout; on a current-thread runtime
//!   the shipper could not run meanwhile, so `block` fails fast there
//! - The worker is woken through a tokio `Notify` once a batch worth of
//!   events is queued, or by its own interval timer otherwise

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Notify;

use crate::config::{BackpressurePolicy, ShipperConfig};
use crate::observability::metrics;
use crate::shipper::stats::ShipperStats;

/// Why an event was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("queue still full after waiting {0:?}")]
    QueueFull(Duration),

    #[error("queue full, event dropped")]
    Dropped,

    #[error("shipper is closed")]
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<String>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    space_available: Condvar,
    batch_ready: Notify,
    capacity: usize,
    batch_size: usize,
    policy: BackpressurePolicy,
    enqueue_timeout: Duration,
    stats: Arc<ShipperStats>,
}

/// Cloneable handle to the bounded queue of serialized events.
#[derive(Debug, Clone)]
pub struct EventQueue {
    shared: Arc<Shared>,
}

impl EventQueue {
    pub fn new(
        capacity: usize,
        batch_size: usize,
        policy: BackpressurePolicy,
        enqueue_timeout: Duration,
        stats: Arc<ShipperStats>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                space_available: Condvar::new(),
                batch_ready: Notify::new(),
                capacity: capacity.max(1),
                batch_size: batch_size.max(1),
                policy,
                enqueue_timeout,
                stats,
            }),
        }
    }

    pub fn from_config(config: &ShipperConfig, stats: Arc<ShipperStats>) -> Self {
        Self::new(
            config.max_queue_depth,
            config.batch_size,
            config.backpressure_policy,
            config.enqueue_timeout(),
            stats,
        )
    }

    /// Queue one serialized event, applying the backpressure policy.
    pub fn enqueue(&self, line: String) -> Result<(), EnqueueError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.closed {
            return Err(EnqueueError::Closed);
        }

        if state.items.len() >= shared.capacity {
            match shared.policy {
                BackpressurePolicy::Drop => {
                    drop(state);
                    ShipperStats::add(&shared.stats.dropped, 1);
                    metrics::record_dropped(1, "queue_full");
                    return Err(EnqueueError::Dropped);
                }
                BackpressurePolicy::Block => {
                    let budget = block_budget(shared.enqueue_timeout);
                    let deadline = Instant::now() + budget;
                    while !budget.is_zero() && state.items.len() >= shared.capacity && !state.closed {
                        if shared
                            .space_available
                            .wait_until(&mut state, deadline)
                            .timed_out()
                        {
                            break;
                        }
                    }
                    if state.closed {
                        return Err(EnqueueError::Closed);
                    }
                    if state.items.len() >= shared.capacity {
                        drop(state);
                        ShipperStats::add(&shared.stats.queue_full, 1);
                        ShipperStats::add(&shared.stats.dropped, 1);
                        metrics::record_dropped(1, "queue_full");
                        return Err(EnqueueError::QueueFull(budget));
                    }
                }
            }
        }

        state.items.push_back(line);
        let depth = state.items.len();
        drop(state);

        ShipperStats::add(&shared.stats.enqueued, 1);
        metrics::record_queue_depth(depth);
        if depth >= shared.batch_size {
            shared.batch_ready.notify_one();
        }
        Ok(())
    }

    /// Remove up to `max` events, oldest first.
    pub fn drain(&self, max: usize) -> Vec<String> {
        let mut state = self.shared.state.lock();
        let n = max.min(state.items.len());
        let batch: Vec<String> = state.items.drain(..n).collect();
        let depth = state.items.len();
        drop(state);

        if !batch.is_empty() {
            self.shared.space_available.notify_all();
            metrics::record_queue_depth(depth);
        }
        batch
    }

    /// Wait until a full batch is queued, the queue closes, or `timeout` passes.
    pub async fn wait_ready(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.shared.batch_ready.notified()).await;
    }

    /// Stop intake; waiting producers fail with `Closed`.
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.space_available.notify_all();
        self.shared.batch_ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn batch_size(&self) -> usize {
        self.shared.batch_size
    }

    pub fn stats(&self) -> &Arc<ShipperStats> {
        &self.shared.stats
    }
}

/// How long a blocked producer may park its thread.
fn block_budget(timeout: Duration) -> Duration {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => Duration::ZERO,
        _ => timeout,
    }
}

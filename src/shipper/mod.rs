//! Log shipper.
//!
//! # Data Flow
//! ```text
//! Emitter
//!     → queue.rs (bounded, block-with-timeout or drop)
//!     → worker.rs (batch by size/interval)
//!     → sink.rs (HTTP to a collector, or an in-process store)
//!     → on exhaustion: spool.rs (replayed later) or drop + count
//! ```
//!
//! # Design Decisions
//! - One consumer per queue, so per-producer order is preserved end to end
//! - Delivery is at-least-once; the store's identity check absorbs repeats
//! - Closing stops intake first, then waits for the worker to flush

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::ShipperConfig;

pub mod queue;
pub mod sink;
pub mod spool;
pub mod stats;
mod worker;

pub use queue::{EnqueueError, EventQueue};
pub use sink::{DeliveryError, HttpSink, IngestSink, StoreSink};
pub use spool::OverflowSpool;
pub use stats::{ShipperStats, ShipperStatsSnapshot};

use worker::Worker;

/// Owns the queue and its delivery worker.
#[derive(Debug)]
pub struct Shipper {
    queue: EventQueue,
    stats: Arc<ShipperStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shipper {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(config: &ShipperConfig, sink: Arc<dyn IngestSink>) -> Self {
        let stats = Arc::new(ShipperStats::default());
        let queue = EventQueue::from_config(config, Arc::clone(&stats));
        let worker = Worker::new(config, queue.clone(), sink, Arc::clone(&stats));
        let handle = tokio::spawn(worker.run());
        Self {
            queue,
            stats,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Producer handle for emitters.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn stats(&self) -> ShipperStatsSnapshot {
        self.stats.snapshot(self.queue.len())
    }

    /// Stop intake and wait until every queued event has been handled.
    pub async fn close(&self) {
        self.queue.close();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Shipper worker terminated abnormally");
            }
        }
    }
}

//! Background delivery loop.
//!
//! # Responsibilities
//! - Drain the queue in batches on size or interval
//! - Retry transient failures with backoff, bounded by the attempt budget
//! - Spill batches that exhausted their retries; drop and count rejected ones
//! - Replay the spool at start-up and after each successful delivery
//! - Flush everything queued once the queue is closed, then exit

use std::sync::Arc;
use std::time::Duration;

use crate::config::ShipperConfig;
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::shipper::queue::EventQueue;
use crate::shipper::sink::IngestSink;
use crate::shipper::spool::OverflowSpool;
use crate::shipper::stats::ShipperStats;

pub(crate) struct Worker {
    queue: EventQueue,
    sink: Arc<dyn IngestSink>,
    spool: Option<OverflowSpool>,
    backoff: Backoff,
    max_attempts: u32,
    batch_size: usize,
    interval: Duration,
    stats: Arc<ShipperStats>,
}

impl Worker {
    pub(crate) fn new(
        config: &ShipperConfig,
        queue: EventQueue,
        sink: Arc<dyn IngestSink>,
        stats: Arc<ShipperStats>,
    ) -> Self {
        Self {
            queue,
            sink,
            spool: config.overflow_path.as_ref().map(OverflowSpool::new),
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_max_ms),
            max_attempts: config.max_retry_attempts.max(1),
            batch_size: config.batch_size.max(1),
            interval: config.batch_interval(),
            stats,
        }
    }

    pub(crate) async fn run(self) {
        tracing::info!(
            sink = self.sink.name(),
            batch_size = self.batch_size,
            interval_ms = self.interval.as_millis() as u64,
            spool = self.spool.is_some(),
            "Shipper worker starting"
        );
        self.replay_spool().await;

        loop {
            self.queue.wait_ready(self.interval).await;
            // Closed is read before draining so nothing queued ahead of close is left behind.
            let closing = self.queue.is_closed();
            loop {
                let batch = self.queue.drain(self.batch_size);
                if batch.is_empty() {
                    break;
                }
                if self.ship(batch).await {
                    self.replay_spool().await;
                }
            }
            if closing {
                break;
            }
        }

        tracing::info!(sink = self.sink.name(), "Shipper worker stopped");
    }

    /// Deliver one batch; `true` when the sink accepted it.
    async fn ship(&self, batch: Vec<String>) -> bool {
        match self.deliver(&batch).await {
            Delivery::Delivered => true,
            Delivery::Rejected => {
                self.drop_batch(&batch, "rejected");
                false
            }
            Delivery::Unavailable => {
                self.give_up(&batch);
                false
            }
        }
    }

    /// Send with retries. Only transient failures are retried.
    async fn deliver(&self, batch: &[String]) -> Delivery {
        let mut attempt = 1;
        loop {
            match self.sink.deliver(batch).await {
                Ok(()) => {
                    ShipperStats::add(&self.stats.delivered, batch.len() as u64);
                    metrics::record_delivered(batch.len() as u64);
                    return Delivery::Delivered;
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        sink = self.sink.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch delivery failed, retrying"
                    );
                    ShipperStats::add(&self.stats.retries, 1);
                    metrics::record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        sink = self.sink.name(),
                        attempts = attempt,
                        events = batch.len(),
                        error = %e,
                        "Batch delivery abandoned"
                    );
                    return if e.is_transient() {
                        Delivery::Unavailable
                    } else {
                        Delivery::Rejected
                    };
                }
            }
        }
    }

    /// Spill a batch the sink could not take right now, or drop it without a spool.
    fn give_up(&self, batch: &[String]) {
        let count = batch.len() as u64;
        if let Some(spool) = &self.spool {
            match spool.spill(batch) {
                Ok(()) => {
                    ShipperStats::add(&self.stats.spilled, count);
                    metrics::record_spilled(count);
                    return;
                }
                Err(e) => tracing::error!(
                    path = %spool.path().display(),
                    error = %e,
                    "Failed to spill batch, dropping it"
                ),
            }
        }
        self.drop_batch(batch, "delivery_failed");
    }

    fn drop_batch(&self, batch: &[String], reason: &'static str) {
        let count = batch.len() as u64;
        ShipperStats::add(&self.stats.dropped, count);
        metrics::record_dropped(count, reason);
    }

    async fn replay_spool(&self) {
        let Some(spool) = &self.spool else {
            return;
        };
        if !spool.has_pending() {
            return;
        }
        let pending = match spool.take_all() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(path = %spool.path().display(), error = %e, "Failed to read spool");
                return;
            }
        };
        tracing::info!(events = pending.len(), "Replaying spooled events");

        let mut chunks = pending.chunks(self.batch_size);
        while let Some(chunk) = chunks.next() {
            match self.deliver(chunk).await {
                Delivery::Delivered => {
                    ShipperStats::add(&self.stats.replayed, chunk.len() as u64);
                }
                // A rejected chunk will never be accepted; move past it.
                Delivery::Rejected => self.drop_batch(chunk, "rejected"),
                Delivery::Unavailable => {
                    // Sink is still unhealthy; keep this chunk and the rest for the next replay.
                    let rest: Vec<String> = chunk.iter().chain(chunks.flatten()).cloned().collect();
                    self.respill(spool, &rest);
                    break;
                }
            }
        }
    }

    /// Put already-spilled events back without counting them as new spills.
    fn respill(&self, spool: &OverflowSpool, events: &[String]) {
        if let Err(e) = spool.spill(events) {
            tracing::error!(
                path = %spool.path().display(),
                error = %e,
                "Failed to re-spill replayed events, dropping them"
            );
            self.drop_batch(events, "delivery_failed");
        }
    }
}

/// Outcome of delivering one batch with retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    /// The sink refused the batch permanently.
    Rejected,
    /// Transient failures used up the attempt budget.
    Unavailable,
}

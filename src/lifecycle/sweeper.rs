//! Periodic closing of orphaned spans.

use std::time::Duration;

use tokio::time;

use crate::config::TracingConfig;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::tracer::Tracer;

/// Closes spans that outlive `span_ttl` as `timeout`.
pub struct SpanSweeper {
    tracer: Tracer,
    ttl: Duration,
    interval: Duration,
}

impl SpanSweeper {
    pub fn new(tracer: Tracer, config: &TracingConfig) -> Self {
        Self {
            tracer,
            ttl: config.span_ttl(),
            interval: config.sweep_interval().max(Duration::from_millis(1)),
        }
    }

    /// One pass; returns how many spans were closed.
    pub fn sweep(&self) -> usize {
        self.tracer.close_expired(self.ttl)
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            ttl_ms = self.ttl.as_millis() as u64,
            interval_ms = self.interval.as_millis() as u64,
            "Span sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let closed = self.sweep();
                    if closed > 0 {
                        tracing::info!(closed, "Orphaned spans closed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Span sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

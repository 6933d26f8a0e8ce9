//! Wiring of the instrumentation stack for one service.
//!
//! # Data Flow
//! ```text
//! CorrelatorConfig
//!     → Sampler / ContextManager
//!     → Shipper (queue + worker + sink)
//!     → Emitter → Tracer
//!     → SpanSweeper (background)
//! ```

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{validate_config, ConfigError, CorrelatorConfig};
use crate::context::{ContextManager, Sampler};
use crate::events::{Emitter, EmitterStats};
use crate::lifecycle::{Shutdown, SpanSweeper};
use crate::shipper::{HttpSink, IngestSink, Shipper, ShipperStatsSnapshot};
use crate::tracer::Tracer;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while assembling a correlator.
#[derive(Debug, Error)]
pub enum CorrelatorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("shipper.endpoint is required when no sink is supplied")]
    MissingEndpoint,

    #[error("failed to build HTTP sink: {0}")]
    Http(#[from] reqwest::Error),
}

/// A running instrumentation stack: tracer, emitter, shipper and sweeper.
pub struct Correlator {
    config: ArcSwap<CorrelatorConfig>,
    tracer: Tracer,
    shipper: Shipper,
    shutdown: Shutdown,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Correlator {
    /// Start shipping to `shipper.endpoint` over HTTP.
    pub fn start(config: CorrelatorConfig) -> Result<Self, CorrelatorError> {
        let endpoint = config
            .shipper
            .endpoint
            .clone()
            .ok_or(CorrelatorError::MissingEndpoint)?;
        let sink = HttpSink::new(endpoint, DELIVERY_TIMEOUT)?;
        Self::start_with_sink(config, Arc::new(sink))
    }

    /// Start shipping to an explicit sink. Must run inside a tokio runtime.
    pub fn start_with_sink(
        config: CorrelatorConfig,
        sink: Arc<dyn IngestSink>,
    ) -> Result<Self, CorrelatorError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let manager = ContextManager::new(Sampler::from_rate(config.tracing.sampling_rate));
        let shipper = Shipper::start(&config.shipper, sink);
        let emitter = Emitter::new(config.service.name.clone(), manager, shipper.queue().clone());
        let tracer = Tracer::new(emitter);

        let shutdown = Shutdown::new();
        let sweeper = SpanSweeper::new(tracer.clone(), &config.tracing);
        let sweeper = tokio::spawn(sweeper.run(shutdown.subscribe()));

        tracing::info!(
            service = %config.service.name,
            sampling_rate = config.tracing.sampling_rate,
            policy = ?config.shipper.backpressure_policy,
            "Correlator started"
        );

        Ok(Self {
            config: ArcSwap::from_pointee(config),
            tracer,
            shipper,
            shutdown,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn emitter(&self) -> &Emitter {
        self.tracer.emitter()
    }

    pub fn manager(&self) -> &ContextManager {
        self.tracer.manager()
    }

    pub fn config(&self) -> Arc<CorrelatorConfig> {
        self.config.load_full()
    }

    pub fn shipper_stats(&self) -> ShipperStatsSnapshot {
        self.shipper.stats()
    }

    pub fn emitter_stats(&self) -> EmitterStats {
        self.emitter().stats()
    }

    /// Apply a reloaded configuration. The sampling rate changes live;
    /// other changes are logged and take effect on restart.
    pub fn apply_config(&self, new: CorrelatorConfig) {
        let current = self.config.load();
        if (current.tracing.sampling_rate - new.tracing.sampling_rate).abs() > f64::EPSILON {
            tracing::info!(
                from = current.tracing.sampling_rate,
                to = new.tracing.sampling_rate,
                "Sampling rate updated"
            );
            self.manager().set_sampling_rate(new.tracing.sampling_rate);
        }
        if current.service.name != new.service.name
            || current.shipper.endpoint != new.shipper.endpoint
            || current.shipper.max_queue_depth != new.shipper.max_queue_depth
            || current.shipper.batch_size != new.shipper.batch_size
            || current.tracing.span_ttl_ms != new.tracing.span_ttl_ms
        {
            tracing::warn!("Reloaded configuration changes settings that apply only after restart");
        }
        self.config.store(Arc::new(new));
    }

    /// Stop the sweeper, then flush and stop the shipper.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Span sweeper terminated abnormally");
            }
        }
        self.shipper.close().await;
        let stats = self.shipper.stats();
        tracing::info!(
            delivered = stats.delivered,
            dropped = stats.dropped_events,
            spilled = stats.spilled,
            "Correlator stopped"
        );
    }
}

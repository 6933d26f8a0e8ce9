//! Trace Correlator collector daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   service A ──┐                      ┌──────────────────────────────────┐
//!   (library)   │  POST /v1/ingest     │            COLLECTOR             │
//!               ├────────────────────▶ │  propagation middleware          │
//!   service B ──┘  (NDJSON batches)    │          │                       │
//!   (library)                          │          ▼                       │
//!                                      │  handlers ───▶ CorrelationStore  │
//!   operator ── trace-cli ───────────▶ │  (query)       journal + index   │
//!               GET /v1/traces/...     │                       ▲          │
//!                                      │  own events ─▶ StoreSink         │
//!                                      └──────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use trace_correlator::collector;
use trace_correlator::config::{load_config, ConfigWatcher, CorrelatorConfig};
use trace_correlator::lifecycle::Shutdown;
use trace_correlator::observability::{logging, metrics};
use trace_correlator::shipper::StoreSink;
use trace_correlator::store::CorrelationStore;
use trace_correlator::Correlator;

const DEFAULT_SERVICE_NAME: &str = "trace-collector";

#[derive(Parser)]
#[command(name = "trace-correlator")]
#[command(about = "Collector for correlated structured logs", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override collector.bind_address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => CorrelatorConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.collector.bind_address = bind;
    }
    if config.service.name == CorrelatorConfig::default().service.name {
        config.service.name = DEFAULT_SERVICE_NAME.to_string();
    }

    logging::init_logging(&config.observability, "tower_http=info")?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "trace-correlator starting");

    tracing::info!(
        bind_address = %config.collector.bind_address,
        journal = ?config.store.journal_path,
        sampling_rate = config.tracing.sampling_rate,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = CorrelationStore::open(&config.store)?;

    // The collector's own events land in its own store.
    let correlator = Arc::new(Correlator::start_with_sink(
        config.clone(),
        Arc::new(StoreSink::new(store.clone())),
    )?);

    let shutdown = Shutdown::new();
    let (addr, server) = collector::spawn(
        &config.collector,
        store,
        correlator.tracer().clone(),
        shutdown.subscribe(),
    )
    .await?;
    tracing::info!(address = %addr, "Listening for connections");

    // Hot reload; the watcher handle must outlive the loop.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let reloader = Arc::clone(&correlator);
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    reloader.apply_config(new_config);
                }
            });
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    None
                }
            }
        }
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    shutdown.trigger();
    if let Err(e) = server.await {
        tracing::error!(error = %e, "Collector task failed");
    }
    correlator.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Collector HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router for ingestion and queries
//! - Wire up middleware (trace propagation, tracing, timeout, body limit)
//! - Serve until the shutdown signal fires

use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::collector::handlers::{get_events, get_trace, get_trace_summary, health, ingest};
use crate::config::CollectorConfig;
use crate::lifecycle::ShutdownSignal;
use crate::propagation::propagate_trace_context;
use crate::store::CorrelationStore;
use crate::tracer::Tracer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct CollectorState {
    pub store: CorrelationStore,
    /// The collector's own instrumentation.
    pub tracer: Tracer,
    pub started_at: Instant,
}

/// HTTP front of a correlation store.
pub struct CollectorServer {
    router: Router,
}

impl CollectorServer {
    pub fn new(config: &CollectorConfig, store: CorrelationStore, tracer: Tracer) -> Self {
        let state = CollectorState {
            store,
            tracer,
            started_at: Instant::now(),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &CollectorConfig, state: CollectorState) -> Router {
        Router::new()
            .route("/v1/ingest", post(ingest))
            .route("/v1/traces/{trace_id}", get(get_trace))
            .route("/v1/traces/{trace_id}/summary", get(get_trace_summary))
            .route("/v1/events", get(get_events))
            .layer(middleware::from_fn_with_state(
                state.tracer.clone(),
                propagate_trace_context,
            ))
            // Health checks stay out of the collector's own traces.
            .route("/health", get(health))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Collector listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("Collector stopped");
        Ok(())
    }
}

/// Bind and serve in the background; returns the bound address.
pub async fn spawn(
    config: &CollectorConfig,
    store: CorrelationStore,
    tracer: Tracer,
    shutdown: ShutdownSignal,
) -> Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    let addr = listener.local_addr()?;
    let server = CollectorServer::new(config, store, tracer);
    let handle = tokio::spawn(async move {
        if let Err(e) = server.run(listener, shutdown).await {
            tracing::error!(error = %e, "Collector server failed");
        }
    });
    Ok((addr, handle))
}

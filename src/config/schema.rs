//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the correlator.
//! All types derive Serde traits for deserialization from config files. Field
//! names are snake_case; the camelCase option names used across the fleet
//! (`samplingRate`, `batchSize`, ...) are accepted as aliases.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Identity of the emitting service.
    pub service: ServiceConfig,

    /// Trace sampling and span lifecycle.
    pub tracing: TracingConfig,

    /// Log shipper batching, backpressure and retry.
    pub shipper: ShipperConfig,

    /// Correlation store settings.
    pub store: StoreConfig,

    /// Collector HTTP surface.
    pub collector: CollectorConfig,

    /// Internal diagnostics and metrics.
    pub observability: ObservabilityConfig,
}

/// Service identity stamped on every event.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (e.g., "booking").
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "unknown-service".to_string(),
        }
    }
}

/// Sampling and span lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Probability in `[0, 1]` that a new root trace is recorded.
    #[serde(alias = "samplingRate")]
    pub sampling_rate: f64,

    /// Spans open longer than this are closed as `timeout` by the sweeper.
    #[serde(alias = "spanTtlMs")]
    pub span_ttl_ms: u64,

    /// How often the sweeper scans for expired spans.
    #[serde(alias = "sweepIntervalMs")]
    pub sweep_interval_ms: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 1.0,
            span_ttl_ms: 300_000,
            sweep_interval_ms: 30_000,
        }
    }
}

impl TracingConfig {
    pub fn span_ttl(&self) -> Duration {
        Duration::from_millis(self.span_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// What an emitter does when the shipper queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Wait up to `enqueue_timeout_ms`, then fail the emit with `QueueFull`.
    /// Emits made on a current-thread tokio runtime do not wait.
    #[default]
    #[serde(alias = "block-with-timeout")]
    Block,
    /// Never wait; drop the new event and count it.
    #[serde(alias = "drop-newest")]
    Drop,
}

/// Log shipper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShipperConfig {
    /// Maximum events per delivered batch.
    #[serde(alias = "batchSize")]
    pub batch_size: usize,

    /// Maximum time an event waits before its batch is flushed.
    #[serde(alias = "batchIntervalMs")]
    pub batch_interval_ms: u64,

    /// Capacity of the in-memory queue.
    #[serde(alias = "maxQueueDepth")]
    pub max_queue_depth: usize,

    /// Behaviour on a full queue.
    #[serde(alias = "backpressurePolicy")]
    pub backpressure_policy: BackpressurePolicy,

    /// Upper bound on enqueue wait under the `block` policy.
    #[serde(alias = "enqueueTimeoutMs")]
    pub enqueue_timeout_ms: u64,

    /// Delivery attempts per batch before spilling or dropping.
    #[serde(alias = "maxRetryAttempts")]
    pub max_retry_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    #[serde(alias = "backoffBaseMs")]
    pub backoff_base_ms: u64,

    /// Cap on a single backoff delay in milliseconds.
    #[serde(alias = "backoffMaxMs")]
    pub backoff_max_ms: u64,

    /// Collector ingestion URL for the HTTP sink.
    pub endpoint: Option<String>,

    /// File receiving batches that exhausted their retries.
    #[serde(alias = "overflowPath")]
    pub overflow_path: Option<String>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_interval_ms: 1000,
            max_queue_depth: 10_000,
            backpressure_policy: BackpressurePolicy::Block,
            enqueue_timeout_ms: 50,
            max_retry_attempts: 5,
            backoff_base_ms: 100,
            backoff_max_ms: 10_000,
            endpoint: None,
            overflow_path: None,
        }
    }
}

impl ShipperConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

/// Correlation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Append-only journal; events are kept in memory only when unset.
    pub journal_path: Option<String>,

    /// Page size used when a query does not specify one.
    pub default_page_size: usize,

    /// Upper bound on a requested page size.
    pub max_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            default_page_size: 100,
            max_page_size: 1000,
        }
    }
}

/// Collector HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Bind address (e.g., "0.0.0.0:7070").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum ingest body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7070".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// Output format of internal diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Diagnostics format.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_document() {
        let config: CorrelatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.tracing.sampling_rate, 1.0);
        assert_eq!(config.shipper.batch_size, 100);
        assert_eq!(config.shipper.backpressure_policy, BackpressurePolicy::Block);
        assert!(config.shipper.endpoint.is_none());
        assert_eq!(config.collector.bind_address, "0.0.0.0:7070");
    }

    #[test]
    fn test_camel_case_aliases() {
        let doc = r#"
            [tracing]
            samplingRate = 0.25
            spanTtlMs = 1000

            [shipper]
            batchSize = 10
            batchIntervalMs = 200
            maxQueueDepth = 50
            backpressurePolicy = "drop"
            maxRetryAttempts = 2
            backoffBaseMs = 5
        "#;
        let config: CorrelatorConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.tracing.sampling_rate, 0.25);
        assert_eq!(config.tracing.span_ttl_ms, 1000);
        assert_eq!(config.shipper.batch_size, 10);
        assert_eq!(config.shipper.max_queue_depth, 50);
        assert_eq!(config.shipper.backpressure_policy, BackpressurePolicy::Drop);
        assert_eq!(config.shipper.max_retry_attempts, 2);
        assert_eq!(config.shipper.backoff_base_ms, 5);
    }

    #[test]
    fn test_policy_long_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: BackpressurePolicy,
        }
        let w: Wrapper = toml::from_str(r#"policy = "block-with-timeout""#).unwrap();
        assert_eq!(w.policy, BackpressurePolicy::Block);
        let w: Wrapper = toml::from_str(r#"policy = "drop-newest""#).unwrap();
        assert_eq!(w.policy, BackpressurePolicy::Drop);
    }
}

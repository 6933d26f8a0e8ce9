//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates in [0, 1], sizes > 0, batch <= queue)
//! - Validate addresses and the ingestion endpoint URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CorrelatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on hot reload

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::CorrelatorConfig;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("service.name must not be empty")]
    EmptyServiceName,
    #[error("tracing.sampling_rate must be within [0, 1], got {0}")]
    SamplingRateOutOfRange(f64),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("shipper.batch_size ({batch}) exceeds shipper.max_queue_depth ({depth})")]
    BatchLargerThanQueue { batch: usize, depth: usize },
    #[error("shipper.backoff_max_ms ({max}) is below shipper.backoff_base_ms ({base})")]
    BackoffCapBelowBase { base: u64, max: u64 },
    #[error("shipper.endpoint is not a valid http(s) URL: {0}")]
    InvalidEndpoint(String),
    #[error("store.default_page_size ({default}) exceeds store.max_page_size ({max})")]
    PageSizeAboveMax { default: usize, max: usize },
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &CorrelatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    let rate = config.tracing.sampling_rate;
    if !(0.0..=1.0).contains(&rate) || rate.is_nan() {
        errors.push(ValidationError::SamplingRateOutOfRange(rate));
    }

    let positive: [(&'static str, u64); 7] = [
        ("tracing.span_ttl_ms", config.tracing.span_ttl_ms),
        ("tracing.sweep_interval_ms", config.tracing.sweep_interval_ms),
        ("shipper.batch_size", config.shipper.batch_size as u64),
        ("shipper.batch_interval_ms", config.shipper.batch_interval_ms),
        ("shipper.max_queue_depth", config.shipper.max_queue_depth as u64),
        ("shipper.max_retry_attempts", config.shipper.max_retry_attempts as u64),
        ("store.max_page_size", config.store.max_page_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let shipper = &config.shipper;
    if shipper.batch_size > shipper.max_queue_depth && shipper.max_queue_depth > 0 {
        errors.push(ValidationError::BatchLargerThanQueue {
            batch: shipper.batch_size,
            depth: shipper.max_queue_depth,
        });
    }
    if shipper.backoff_max_ms < shipper.backoff_base_ms {
        errors.push(ValidationError::BackoffCapBelowBase {
            base: shipper.backoff_base_ms,
            max: shipper.backoff_max_ms,
        });
    }
    if let Some(endpoint) = &shipper.endpoint {
        match Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidEndpoint(endpoint.clone())),
        }
    }

    if config.store.default_page_size > config.store.max_page_size {
        errors.push(ValidationError::PageSizeAboveMax {
            default: config.store.default_page_size,
            max: config.store.max_page_size,
        });
    }

    if config.collector.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "collector.bind_address",
            value: config.collector.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CorrelatorConfig (validated, immutable)
//!     → handed to Correlator / collector at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → receiver applies the hot-reloadable subset (sampling rate)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid reload is logged and ignored; the running config stays

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackpressurePolicy, CollectorConfig, CorrelatorConfig, LogFormat, ObservabilityConfig,
    ServiceConfig, ShipperConfig, StoreConfig, TracingConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

//! Cider analytics configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for analytics.json
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod analytics;
pub mod resolve;
pub mod validate;

pub use analytics::{
    AnalyticsConfig, CacheSettings, SamplingSettings, TrendSettings, WorkerSettings,
};
pub use resolve::{default_cache_dir, resolve_config, xdg_config_dir, ConfigPaths, ConfigSource};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

//! Analytics configuration types.

use cider_common::{Granularity, TimeRange};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validate::{ValidationError, ValidationResult};

/// Complete analytics engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub sampling: SamplingSettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub trends: TrendSettings,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            cache: CacheSettings::default(),
            sampling: SamplingSettings::default(),
            worker: WorkerSettings::default(),
            trends: TrendSettings::default(),
        }
    }
}

/// Two-tier result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Capacity of the in-memory tier before LRU eviction.
    pub max_memory_entries: usize,
    /// TTL applied when a caller does not pass one.
    pub default_ttl_secs: u64,
    /// Namespace for keys in the persistent tier.
    pub key_prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_memory_entries: 100,
            default_ttl_secs: 30 * 60,
            key_prefix: "analytics_cache:".to_string(),
        }
    }
}

/// Dataset downsampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Populations larger than this are sampled.
    pub threshold: usize,
    /// Sample size for populations below `large_population`.
    pub small_sample_size: usize,
    /// Sample size for populations at or above `large_population`.
    pub large_sample_size: usize,
    pub large_population: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            threshold: 5000,
            small_sample_size: 1000,
            large_sample_size: 1500,
            large_population: 20_000,
        }
    }
}

/// Background task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub task_timeout_secs: u64,
    pub result_cache_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            task_timeout_secs: 30,
            result_cache_size: 10,
        }
    }
}

/// Trend classification and prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    /// |slope| at or below this is classified stable.
    ///
    /// Absolute and unit-dependent; needs calibration against real value ranges.
    pub stable_slope_threshold: f64,
    pub prediction_periods: u32,
    /// Confidence lost per extrapolated period.
    pub prediction_confidence_step: f64,
    pub default_granularity: Granularity,
    pub default_range: TimeRange,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            stable_slope_threshold: 0.1,
            prediction_periods: 3,
            prediction_confidence_step: 0.1,
            default_granularity: Granularity::Month,
            default_range: TimeRange::All,
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Load from a resolved path, falling back to defaults when none was found.
    pub fn load(path: Option<&Path>) -> ValidationResult<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation.
    pub fn validate(&self) -> ValidationResult<()> {
        crate::validate::validate_config(self)
    }
}

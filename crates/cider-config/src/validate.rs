//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::analytics::AnalyticsConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 50,
            ValidationError::ParseError(_) => 51,
            ValidationError::InvalidValue { .. } => 52,
            ValidationError::VersionMismatch { .. } => 53,
        }
    }
}

impl From<ValidationError> for cider_common::Error {
    fn from(err: ValidationError) -> Self {
        cider_common::Error::Config(err.to_string())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate analytics configuration semantically.
pub fn validate_config(config: &AnalyticsConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    // Cache
    if config.cache.max_memory_entries == 0 {
        return Err(invalid("cache.max_memory_entries", "Must be at least 1"));
    }
    if config.cache.default_ttl_secs == 0 {
        return Err(invalid("cache.default_ttl_secs", "Must be at least 1 second"));
    }
    if config.cache.key_prefix.is_empty() {
        return Err(invalid("cache.key_prefix", "Must not be empty"));
    }

    // Sampling
    let s = &config.sampling;
    if s.small_sample_size == 0 || s.large_sample_size == 0 {
        return Err(invalid("sampling", "Sample sizes must be at least 1"));
    }
    if s.small_sample_size > s.threshold {
        return Err(invalid(
            "sampling.small_sample_size",
            format!(
                "Must not exceed threshold {}, got {}",
                s.threshold, s.small_sample_size
            ),
        ));
    }
    if s.large_population < s.threshold {
        return Err(invalid(
            "sampling.large_population",
            format!(
                "Must be at least threshold {}, got {}",
                s.threshold, s.large_population
            ),
        ));
    }

    // Worker
    if config.worker.task_timeout_secs == 0 {
        return Err(invalid("worker.task_timeout_secs", "Must be at least 1 second"));
    }
    if config.worker.result_cache_size == 0 {
        return Err(invalid("worker.result_cache_size", "Must be at least 1"));
    }

    // Trends
    let t = &config.trends;
    if !t.stable_slope_threshold.is_finite() || t.stable_slope_threshold < 0.0 {
        return Err(invalid(
            "trends.stable_slope_threshold",
            format!("Must be finite and >= 0, got {}", t.stable_slope_threshold),
        ));
    }
    if !(0.0..=1.0).contains(&t.prediction_confidence_step) {
        return Err(invalid(
            "trends.prediction_confidence_step",
            format!("Must be in [0, 1], got {}", t.prediction_confidence_step),
        ));
    }
    if t.prediction_periods == 0 {
        return Err(invalid("trends.prediction_periods", "Must be at least 1"));
    }

    Ok(())
}

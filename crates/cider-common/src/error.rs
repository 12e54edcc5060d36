//! Error types for cider analytics.
//!
//! Errors carry:
//! - Stable error codes for machine parsing
//! - Category classification for grouping
//! - Recoverability hints for callers that retry work
//!
//! Lower layers never raise for malformed numeric input; values are filtered
//! instead. The variants below cover the failures that do surface: storage
//! I/O, task timeouts, and caller programming errors in the task queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for cider analytics operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed caller input.
    Input,
    /// Required data missing or empty.
    Data,
    /// Persistent cache tier failures.
    Storage,
    /// Background task execution failures.
    Worker,
    /// Configuration loading and validation.
    Config,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Worker => write!(f, "worker"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for cider analytics.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Data errors (20-29)
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    // Storage errors (30-39)
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    // Worker errors (40-49)
    #[error("task timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("task failed: {0}")]
    TaskFailed(String),

    // Configuration errors (50-59)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Input errors
    /// - 20-29: Data errors
    /// - 30-39: Storage errors
    /// - 40-49: Worker errors
    /// - 50-59: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidInput(_) => 10,
            Error::DataUnavailable(_) => 20,
            Error::Storage(_) => 30,
            Error::QuotaExceeded(_) => 31,
            Error::Timeout { .. } => 40,
            Error::UnknownTaskType(_) => 41,
            Error::TaskFailed(_) => 42,
            Error::Config(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_) => ErrorCategory::Input,
            Error::DataUnavailable(_) => ErrorCategory::Data,
            Error::Storage(_) | Error::QuotaExceeded(_) => ErrorCategory::Storage,
            Error::Timeout { .. } | Error::UnknownTaskType(_) | Error::TaskFailed(_) => {
                ErrorCategory::Worker
            }
            Error::Config(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::InvalidInput(_) => false,
            Error::DataUnavailable(_) => true, // More records may arrive
            Error::Storage(_) => true,
            Error::QuotaExceeded(_) => true, // Space may be freed
            Error::Timeout { .. } => true,
            Error::UnknownTaskType(_) => false, // Programming error
            Error::TaskFailed(_) => true,
            Error::Config(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Serializable summary used in worker results and CLI output.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            category: self.category(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
        }
    }
}

/// Structured, serializable view of an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    pub recoverable: bool,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.category, self.code, self.message)
    }
}

//! Exit codes for the cider-analytics CLI.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use cider_common::{Error, ErrorCategory};

/// Exit codes for cider-analytics operations.
///
/// These codes are a stable contract for scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// Ran fine but the input produced no trend at all
    NoData = 1,

    /// Invalid arguments
    ArgsError = 10,

    /// Input records could not be read or parsed
    InputError = 11,

    /// Configuration missing, unreadable or invalid
    ConfigError = 12,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// Background task timed out
    TimeoutError = 22,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::NoData)
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NoData => "OK_NO_DATA",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Timeout { .. } => ExitCode::TimeoutError,
            _ => match err.category() {
                ErrorCategory::Input | ErrorCategory::Data => ExitCode::InputError,
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io | ErrorCategory::Storage => ExitCode::IoError,
                ErrorCategory::Worker => ExitCode::InternalError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

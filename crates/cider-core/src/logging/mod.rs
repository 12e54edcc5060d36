//! Structured logging for cider-core.
//!
//! Two output modes, both on stderr so stdout stays reserved for command
//! payloads:
//! - Human-readable console lines for interactive use
//! - JSON lines for agents and log shippers
//!
//! # Usage
//!
//! ```ignore
//! use cider_core::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//! tracing::info!(run_id = %cider_core::logging::generate_run_id(), "starting");
//! ```

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events pass the filter at the configured level.
const LOG_TARGETS: [&str; 4] = ["cider_core", "cider_analytics", "cider_config", "cider_common"];

fn build_filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives)
}

/// Install the global subscriber.
///
/// Call once at startup. A second call is a no-op (the first subscriber
/// stays installed).
pub fn init_logging(config: &LogConfig) {
    let filter = build_filter(config.level);

    let result = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .flatten_event(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "logging already initialized");
    }
}

/// Correlation id for one CLI invocation.
///
/// Format: `run-<12 hex chars>`.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..12])
}

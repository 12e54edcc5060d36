//! Cider journal analytics engine.
//!
//! This library provides:
//! - Trend analysis over dated journal records
//! - A two-tier (memory + persistent) result cache
//! - Dataset sampling for oversized inputs
//! - A background priority task queue
//! - Logging and CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod cache;
pub mod clock;
pub mod engine;
pub mod exit_codes;
pub mod logging;
pub mod record;
pub mod sampling;
pub mod summary;
pub mod trend;
pub mod worker;

pub use engine::AnalyticsEngine;
pub use record::{CiderRecord, DateField, NumericField};

//! Cider analytics common types, IDs, and errors.
//!
//! This crate provides foundational types shared across cider-core modules:
//! - Unified error taxonomy with stable codes
//! - Task identifiers for the background queue
//! - Period keys and grouping granularity
//! - Time range and sampling method enums

pub mod error;
pub mod id;
pub mod period;
pub mod range;
pub mod sampling;

pub use error::{Error, ErrorCategory, Result};
pub use id::TaskId;
pub use period::{parse_record_date, Granularity, PeriodKey};
pub use range::TimeRange;
pub use sampling::SamplingMethod;

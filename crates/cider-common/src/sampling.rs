//! Sampling method selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a dataset is downsampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    /// Uniform sample without replacement.
    Random,
    /// Proportional allocation across strata.
    #[default]
    Stratified,
    /// Fixed stride over pre-sorted input.
    Systematic,
}

impl std::str::FromStr for SamplingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(SamplingMethod::Random),
            "stratified" => Ok(SamplingMethod::Stratified),
            "systematic" => Ok(SamplingMethod::Systematic),
            _ => Err(format!("unknown sampling method: {}", s)),
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingMethod::Random => write!(f, "random"),
            SamplingMethod::Stratified => write!(f, "stratified"),
            SamplingMethod::Systematic => write!(f, "systematic"),
        }
    }
}

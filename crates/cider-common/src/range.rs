//! Time range selection for trend queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window of records considered by a trend query.
///
/// Relative windows are anchored to the latest timestamp present in the
/// dataset, not to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[default]
    #[serde(rename = "ALL")]
    All,
    /// Absolute, inclusive bounds.
    #[serde(rename = "custom")]
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeRange {
    /// Length of a relative window in months.
    pub fn relative_months(&self) -> Option<u32> {
        match self {
            TimeRange::OneMonth => Some(1),
            TimeRange::ThreeMonths => Some(3),
            TimeRange::SixMonths => Some(6),
            TimeRange::OneYear => Some(12),
            TimeRange::All | TimeRange::Custom { .. } => None,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, TimeRange::All)
    }

    /// Lossless form used in cache keys. Custom bounds keep millisecond
    /// precision; `Display` only shows their calendar days.
    pub fn cache_token(&self) -> String {
        match self {
            TimeRange::Custom { start, end } => format!(
                "custom:{}..{}",
                start.timestamp_millis(),
                end.timestamp_millis()
            ),
            relative => relative.to_string(),
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    /// Parses the relative forms. Custom ranges are built directly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1M" => Ok(TimeRange::OneMonth),
            "3M" => Ok(TimeRange::ThreeMonths),
            "6M" => Ok(TimeRange::SixMonths),
            "1Y" | "12M" => Ok(TimeRange::OneYear),
            "ALL" => Ok(TimeRange::All),
            _ => Err(format!("unknown time range: {}", s)),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::OneMonth => write!(f, "1M"),
            TimeRange::ThreeMonths => write!(f, "3M"),
            TimeRange::SixMonths => write!(f, "6M"),
            TimeRange::OneYear => write!(f, "1Y"),
            TimeRange::All => write!(f, "ALL"),
            TimeRange::Custom { start, end } => {
                write!(f, "{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_and_display() {
        for (s, r) in [
            ("1M", TimeRange::OneMonth),
            ("3m", TimeRange::ThreeMonths),
            ("6M", TimeRange::SixMonths),
            ("1y", TimeRange::OneYear),
            ("all", TimeRange::All),
        ] {
            let parsed: TimeRange = s.parse().unwrap();
            assert_eq!(parsed, r);
            assert_eq!(parsed.to_string(), s.to_uppercase());
        }
        assert!("2W".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_relative_months() {
        assert_eq!(TimeRange::OneYear.relative_months(), Some(12));
        assert_eq!(TimeRange::All.relative_months(), None);
    }

    #[test]
    fn test_serde_forms() {
        assert_eq!(serde_json::to_string(&TimeRange::SixMonths).unwrap(), "\"6M\"");
        let custom = TimeRange::Custom {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&custom).unwrap();
        let back: TimeRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, custom);
        assert_eq!(custom.to_string(), "2024-01-01..2024-06-30");
    }

    #[test]
    fn test_cache_token_keeps_time_of_day() {
        let day = |h| Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap();
        let narrow = TimeRange::Custom {
            start: day(0),
            end: day(1),
        };
        let wide = TimeRange::Custom {
            start: day(0),
            end: day(23),
        };
        assert_eq!(narrow.to_string(), wide.to_string());
        assert_ne!(narrow.cache_token(), wide.cache_token());
        assert_eq!(
            narrow.cache_token(),
            format!("custom:{}..{}", day(0).timestamp_millis(), day(1).timestamp_millis())
        );
        assert_eq!(TimeRange::ThreeMonths.cache_token(), "3M");
    }
}

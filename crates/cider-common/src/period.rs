//! Period keys and grouping granularity.
//!
//! A [`PeriodKey`] is the canonical string for a time bucket. It is both the
//! grouping key and the source of display labels, and it parses back to the
//! start of its period for a given [`Granularity`]:
//!
//! | granularity | key          |
//! |-------------|--------------|
//! | day         | `2024-03-15` |
//! | week        | `2024-W03`   |
//! | month       | `2024-03`    |
//! | quarter     | `2024-Q1`    |
//! | year        | `2024`       |
//!
//! Weeks follow ISO-8601: Monday start, week 1 contains the year's first
//! Thursday, and the key carries the ISO week-year (which can differ from the
//! calendar year around New Year).

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket width used when grouping records over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "quarter" | "quarterly" => Ok(Granularity::Quarter),
            "year" | "yearly" => Ok(Granularity::Year),
            _ => Err(format!("unknown granularity: {}", s)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
            Granularity::Quarter => write!(f, "quarter"),
            Granularity::Year => write!(f, "year"),
        }
    }
}

/// Canonical period identifier, e.g. `2024-W03`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(pub String);

impl PeriodKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

impl Granularity {
    /// Key of the period containing `at`.
    pub fn key_for(&self, at: DateTime<Utc>) -> PeriodKey {
        let key = match self {
            Granularity::Day => at.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let iso = at.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            Granularity::Month => at.format("%Y-%m").to_string(),
            Granularity::Quarter => format!("{}-Q{}", at.year(), at.month0() / 3 + 1),
            Granularity::Year => format!("{}", at.year()),
        };
        PeriodKey(key)
    }

    /// Start instant (UTC midnight) of the period named by `key`.
    ///
    /// Returns `None` when the key is not well formed for this granularity.
    pub fn period_start(&self, key: &PeriodKey) -> Option<DateTime<Utc>> {
        let s = key.as_str();
        let date = match self {
            Granularity::Day => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?,
            Granularity::Week => {
                let (year, week) = s.split_once("-W")?;
                NaiveDate::from_isoywd_opt(year.parse().ok()?, week.parse().ok()?, Weekday::Mon)?
            }
            Granularity::Month => {
                let (year, month) = s.split_once('-')?;
                NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?
            }
            Granularity::Quarter => {
                let (year, quarter) = s.split_once("-Q")?;
                let quarter: u32 = quarter.parse().ok()?;
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                NaiveDate::from_ymd_opt(year.parse().ok()?, (quarter - 1) * 3 + 1, 1)?
            }
            Granularity::Year => NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1)?,
        };
        midnight(date)
    }

    /// Key of the period `steps` periods after `key`.
    pub fn advance(&self, key: &PeriodKey, steps: u32) -> Option<PeriodKey> {
        let start = self.period_start(key)?;
        let next = match self {
            Granularity::Day => start.checked_add_days(Days::new(u64::from(steps)))?,
            Granularity::Week => start.checked_add_days(Days::new(7 * u64::from(steps)))?,
            Granularity::Month => start.checked_add_months(Months::new(steps))?,
            Granularity::Quarter => start.checked_add_months(Months::new(3 * steps))?,
            Granularity::Year => start.checked_add_months(Months::new(12 * steps))?,
        };
        Some(self.key_for(next))
    }

    /// Short human label for chart axes.
    pub fn label(&self, key: &PeriodKey) -> String {
        let Some(start) = self.period_start(key) else {
            return key.to_string();
        };
        match self {
            Granularity::Day => start.format("%b %d").to_string(),
            Granularity::Week => {
                let iso = start.iso_week();
                format!("W{:02} {}", iso.week(), iso.year())
            }
            Granularity::Month => start.format("%b %Y").to_string(),
            Granularity::Quarter => format!("Q{} {}", start.month0() / 3 + 1, start.year()),
            Granularity::Year => format!("{}", start.year()),
        }
    }
}

/// Parse a record's date string.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC), and
/// bare `YYYY-MM-DD`. Anything else is treated as missing.
pub fn parse_record_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(midnight)
}

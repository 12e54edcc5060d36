//! Time range filtering.

use chrono::{DateTime, Months, Utc};
use cider_common::TimeRange;

/// Records whose date falls inside `range`.
///
/// Relative windows end at the latest date found in `records` and reach back
/// the window's number of months. [`TimeRange::All`] keeps every record,
/// including undated ones, which grouping later drops. Bounds are inclusive.
pub fn filter_by_time_range<'a, R, F>(records: &'a [R], range: &TimeRange, date_of: F) -> Vec<&'a R>
where
    F: Fn(&R) -> Option<DateTime<Utc>>,
{
    let (start, end) = match range {
        TimeRange::All => return records.iter().collect(),
        TimeRange::Custom { start, end } => (*start, *end),
        relative => {
            let Some(anchor) = records.iter().filter_map(&date_of).max() else {
                return Vec::new();
            };
            let months = relative.relative_months().unwrap_or(0);
            let start = anchor
                .checked_sub_months(Months::new(months))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            (start, anchor)
        }
    };

    records
        .iter()
        .filter(|r| date_of(*r).is_some_and(|at| at >= start && at <= end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cider_common::parse_record_date;

    fn records() -> Vec<&'static str> {
        vec![
            "2023-01-15",
            "2023-11-30",
            "2024-03-01",
            "2024-05-20",
            "2024-06-01",
            "garbage",
        ]
    }

    fn date(d: &&str) -> Option<DateTime<Utc>> {
        parse_record_date(d)
    }

    #[test]
    fn test_all_keeps_everything() {
        assert_eq!(filter_by_time_range(&records(), &TimeRange::All, date).len(), 6);
    }

    #[test]
    fn test_relative_window_anchors_on_latest_record() {
        let data = records();
        let three = filter_by_time_range(&data, &TimeRange::ThreeMonths, date);
        assert_eq!(three, vec![&"2024-03-01", &"2024-05-20", &"2024-06-01"]);

        let month = filter_by_time_range(&data, &TimeRange::OneMonth, date);
        assert_eq!(month, vec![&"2024-05-20", &"2024-06-01"]);

        let year = filter_by_time_range(&data, &TimeRange::OneYear, date);
        assert_eq!(year.len(), 4);
    }

    #[test]
    fn test_custom_bounds_are_inclusive() {
        let range = TimeRange::Custom {
            start: Utc.with_ymd_and_hms(2023, 11, 30, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        };
        let data = records();
        let picked = filter_by_time_range(&data, &range, date);
        assert_eq!(picked, vec![&"2023-11-30", &"2024-03-01"]);
    }

    #[test]
    fn test_relative_without_dates_is_empty() {
        let data = vec!["nope", "still nope"];
        assert!(filter_by_time_range(&data, &TimeRange::SixMonths, date).is_empty());
    }
}

//! Period bucketing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cider_common::{Granularity, PeriodKey};

/// Records bucketed by period key.
#[derive(Debug, Clone)]
pub struct GroupedRecords<'a, R> {
    pub granularity: Granularity,
    pub buckets: BTreeMap<PeriodKey, Vec<&'a R>>,
    /// Records without a usable date.
    pub dropped: usize,
}

impl<'a, R> GroupedRecords<'a, R> {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Records placed in some bucket.
    pub fn record_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Bucket `records` by the period containing `date_of(record)`.
///
/// Records for which `date_of` yields `None` are counted in `dropped` and
/// otherwise ignored.
pub fn group_by_time_period<'a, R, I, F>(
    records: I,
    granularity: Granularity,
    date_of: F,
) -> GroupedRecords<'a, R>
where
    I: IntoIterator<Item = &'a R>,
    F: Fn(&R) -> Option<DateTime<Utc>>,
    R: 'a,
{
    let mut buckets: BTreeMap<PeriodKey, Vec<&'a R>> = BTreeMap::new();
    let mut dropped = 0;
    for record in records {
        match date_of(record) {
            Some(at) => buckets
                .entry(granularity.key_for(at))
                .or_default()
                .push(record),
            None => dropped += 1,
        }
    }
    GroupedRecords {
        granularity,
        buckets,
        dropped,
    }
}

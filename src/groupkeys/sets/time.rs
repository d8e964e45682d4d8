//! Time-bucketed group key sets
//!
//! Bucket labels are formatted date ranges; formatting is lazy and cached
//! per inner bucket so that rendering a million-group result does not
//! re-format the same handful of labels.

use crate::groupkeys::sets::{GroupKeySet, GroupKeySetRef};
use crate::groupkeys::GroupKey;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Grouping by fixed-width time buckets
#[derive(Debug)]
pub struct DateTimeRangeGroupKeySet {
    previous: GroupKeySetRef,
    earliest_start_ms: i64,
    period_ms: i64,
    num_buckets: usize,
    num_groups: usize,
    format: String,
    labels: Mutex<HashMap<usize, GroupKey>>,
}

impl DateTimeRangeGroupKeySet {
    /// Build a time-range level. `num_groups` is normally
    /// `previous.num_groups() * num_buckets`.
    pub fn new(
        previous: GroupKeySetRef,
        earliest_start_ms: i64,
        period_ms: i64,
        num_buckets: usize,
        num_groups: usize,
        format: impl Into<String>,
    ) -> Self {
        Self {
            previous,
            earliest_start_ms,
            period_ms,
            num_buckets,
            num_groups,
            format: format.into(),
            labels: Mutex::new(HashMap::new()),
        }
    }
}

impl GroupKeySet for DateTimeRangeGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        1 + (group - 1) / self.num_buckets
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group > self.num_groups {
            return None;
        }
        let inner = (group - 1) % self.num_buckets;
        let mut labels = self.labels.lock();
        let key = labels.entry(inner).or_insert_with(|| {
            let start = self.earliest_start_ms + inner as i64 * self.period_ms;
            GroupKey::from_time_range(&self.format, start, start + self.period_ms)
        });
        Some(key.clone())
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }
}

/// Calendar period widths that are not fixed in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnevenPeriod {
    /// Calendar month
    Month,
    /// Calendar quarter
    Quarter,
    /// Calendar year
    Year,
}

impl UnevenPeriod {
    fn months(&self) -> i64 {
        match self {
            UnevenPeriod::Month => 1,
            UnevenPeriod::Quarter => 3,
            UnevenPeriod::Year => 12,
        }
    }
}

/// Grouping by calendar months, quarters, or years
#[derive(Debug)]
pub struct UnevenPeriodGroupKeySet {
    previous: GroupKeySetRef,
    num_periods: usize,
    start_year: i32,
    start_month: u32,
    period: UnevenPeriod,
    format: String,
    labels: Mutex<HashMap<usize, GroupKey>>,
}

impl UnevenPeriodGroupKeySet {
    /// Build an uneven-period level starting at the first day of
    /// `start_year`/`start_month`.
    pub fn new(
        previous: GroupKeySetRef,
        num_periods: usize,
        start_year: i32,
        start_month: u32,
        period: UnevenPeriod,
        format: impl Into<String>,
    ) -> Self {
        Self {
            previous,
            num_periods,
            start_year,
            start_month,
            period,
            format: format.into(),
            labels: Mutex::new(HashMap::new()),
        }
    }

    /// Midnight UTC on the first day of the month `offset` periods after
    /// the start, in epoch milliseconds
    fn period_start_ms(&self, offset: i64) -> Option<i64> {
        let absolute_month =
            self.start_year as i64 * 12 + (self.start_month as i64 - 1) + offset * self.period.months();
        let year = absolute_month.div_euclid(12);
        let month = absolute_month.rem_euclid(12) + 1;
        let date = NaiveDate::from_ymd_opt(year as i32, month as u32, 1)?;
        Some(
            date.and_hms_opt(0, 0, 0)?
                .and_utc()
                .timestamp_millis(),
        )
    }
}

impl GroupKeySet for UnevenPeriodGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        1 + (group - 1) / self.num_periods
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group > self.num_groups() {
            return None;
        }
        let inner = (group - 1) % self.num_periods;
        if let Some(key) = self.labels.lock().get(&inner) {
            return Some(key.clone());
        }
        let start = self.period_start_ms(inner as i64)?;
        let end = self.period_start_ms(inner as i64 + 1)?;
        let key = GroupKey::from_time_range(&self.format, start, end);
        self.labels.lock().insert(inner, key.clone());
        Some(key)
    }

    fn num_groups(&self) -> usize {
        self.previous.num_groups() * self.num_periods
    }
}

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Fixed 7-way fan-out by day of week, Monday first
#[derive(Debug)]
pub struct DayOfWeekGroupKeySet {
    previous: GroupKeySetRef,
}

impl DayOfWeekGroupKeySet {
    /// Build a day-of-week level over the previous grouping
    pub fn new(previous: GroupKeySetRef) -> Self {
        Self { previous }
    }
}

impl GroupKeySet for DayOfWeekGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        1 + (group - 1) / 7
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group > self.num_groups() {
            return None;
        }
        let inner = (group - 1) % 7;
        Some(GroupKey::StringTerm(DAY_NAMES[inner].to_string()))
    }

    fn num_groups(&self) -> usize {
        self.previous.num_groups() * 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupkeys::sets::{DumbGroupKeySet, EmptyGroupKeySet};
    use crate::types::TimeUnit;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn five_groups() -> GroupKeySetRef {
        Arc::new(
            DumbGroupKeySet::new(
                Arc::new(EmptyGroupKeySet),
                vec![0, 1, 1, 1, 1, 1],
                (0..6)
                    .map(|i| if i == 0 { None } else { Some(GroupKey::IntTerm(i)) })
                    .collect(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_date_time_range() {
        let start = Utc
            .with_ymd_and_hms(2015, 2, 23, 12, 0, 0)
            .single()
            .unwrap()
            .timestamp_millis();
        let key_set = DateTimeRangeGroupKeySet::new(
            five_groups(),
            start,
            TimeUnit::Hour.period_millis(),
            24,
            120,
            TimeUnit::Hour.format_str(),
        );
        assert_eq!(key_set.num_groups(), 120);
        for parent in 1..=5 {
            for inner in 1..=24 {
                assert_eq!(key_set.parent_group((parent - 1) * 24 + inner), parent);
            }
        }
        // same inner bucket renders the same label under every parent
        for group in (1..=120).step_by(24) {
            assert_eq!(
                key_set.group_key(group),
                Some(GroupKey::TimeRange {
                    label: "[2015-02-23 12:00, 2015-02-23 13:00)".to_string()
                })
            );
        }
        assert_eq!(
            key_set.group_key(24),
            Some(GroupKey::TimeRange {
                label: "[2015-02-24 11:00, 2015-02-24 12:00)".to_string()
            })
        );
        assert!(!key_set.is_present(0));
        assert!(key_set.is_present(120));
        assert!(!key_set.is_present(121));
    }

    #[test]
    fn test_year_month() {
        let key_set = UnevenPeriodGroupKeySet::new(
            five_groups(),
            12,
            2015,
            2,
            UnevenPeriod::Month,
            "%Y-%m-%d %H:%M:%S",
        );
        assert_eq!(key_set.num_groups(), 60);
        for parent in 1..=5 {
            for inner in 1..=12 {
                assert_eq!(key_set.parent_group((parent - 1) * 12 + inner), parent);
            }
        }
        for group in (1..=60).step_by(12) {
            assert_eq!(
                key_set.group_key(group),
                Some(GroupKey::TimeRange {
                    label: "[2015-02-01 00:00:00, 2015-03-01 00:00:00)".to_string()
                })
            );
        }
        // December wraps into the next year
        assert_eq!(
            key_set.group_key(12),
            Some(GroupKey::TimeRange {
                label: "[2016-01-01 00:00:00, 2016-02-01 00:00:00)".to_string()
            })
        );
        assert!(!key_set.is_present(0));
        assert!(key_set.is_present(60));
        assert!(!key_set.is_present(61));
    }

    #[test]
    fn test_quarters() {
        let key_set = UnevenPeriodGroupKeySet::new(
            Arc::new(EmptyGroupKeySet),
            4,
            2015,
            1,
            UnevenPeriod::Quarter,
            "%Y-%m-%d",
        );
        assert_eq!(
            key_set.group_key(2),
            Some(GroupKey::TimeRange {
                label: "[2015-04-01, 2015-07-01)".to_string()
            })
        );
    }

    #[test]
    fn test_day_of_week() {
        let key_set = DayOfWeekGroupKeySet::new(five_groups());
        assert_eq!(key_set.num_groups(), 35);
        assert_eq!(
            key_set.group_key(1),
            Some(GroupKey::StringTerm("Monday".to_string()))
        );
        assert_eq!(
            key_set.group_key(7),
            Some(GroupKey::StringTerm("Sunday".to_string()))
        );
        assert_eq!(
            key_set.group_key(8),
            Some(GroupKey::StringTerm("Monday".to_string()))
        );
        assert_eq!(key_set.parent_group(8), 2);
    }
}

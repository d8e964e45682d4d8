//! Group keys and hierarchical group numbering
//!
//! Every regroup refines the current grouping into a new one. A group is
//! identified by a dense positive number (group 0 means "discarded") and
//! carries a [`GroupKey`] describing what the group represents. The chain
//! of groupings is modelled by [`sets::GroupKeySet`]: each level knows its
//! parent level, and walking the chain from any group number reconstructs
//! the full key path for result rendering.

pub mod sets;

use chrono::{TimeZone, Utc};
use std::fmt;

pub use sets::{
    DateTimeRangeGroupKeySet, DayOfWeekGroupKeySet, DumbGroupKeySet, EmptyGroupKeySet,
    GroupKeySet, GroupKeySetRef, IntTermGroupKeySet, MetricRangeGroupKeySet, RandomGroupKeySet,
    SessionNameGroupKeySet, StringTermGroupKeySet, UnevenPeriod, UnevenPeriodGroupKeySet,
};

/// The label of one group at one grouping level
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// The root group, before any regroup
    Empty,
    /// An integer field term
    IntTerm(i64),
    /// A string field term
    StringTerm(String),
    /// A half-open numeric range `[min, max)`
    Range {
        /// Inclusive lower bound
        min: i64,
        /// Exclusive upper bound
        max: i64,
    },
    /// A time bucket, pre-rendered with its format string
    TimeRange {
        /// Rendered bucket label
        label: String,
    },
    /// Gutter for values at or above the covered range
    HighGutter {
        /// Lowest value landing in this gutter
        min: i64,
    },
    /// Gutter for values below the covered range
    LowGutter {
        /// One past the highest value landing in this gutter
        max: i64,
    },
    /// Catch-all bucket for terms not matching any explicit bucket
    Default,
}

impl GroupKey {
    /// True for the catch-all bucket
    pub fn is_default(&self) -> bool {
        matches!(self, GroupKey::Default)
    }

    /// Render a time bucket key covering `[start_ms, end_ms)` with a chrono
    /// format string. Timestamps chrono cannot represent fall back to raw
    /// millisecond values.
    pub fn from_time_range(format: &str, start_ms: i64, end_ms: i64) -> GroupKey {
        let render = |ms: i64| match Utc.timestamp_millis_opt(ms).single() {
            Some(dt) => dt.format(format).to_string(),
            None => ms.to_string(),
        };
        GroupKey::TimeRange {
            label: format!("[{}, {})", render(start_ms), render(end_ms)),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Empty => write!(f, ""),
            GroupKey::IntTerm(v) => write!(f, "{}", v),
            GroupKey::StringTerm(s) => write!(f, "{}", s),
            GroupKey::Range { min, max } => write!(f, "[{}, {})", min, max),
            GroupKey::TimeRange { label } => write!(f, "{}", label),
            GroupKey::HighGutter { min } => write!(f, ">= {}", min),
            GroupKey::LowGutter { max } => write!(f, "< {}", max),
            GroupKey::Default => write!(f, "DEFAULT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(GroupKey::IntTerm(7).to_string(), "7");
        assert_eq!(GroupKey::Range { min: 0, max: 10 }.to_string(), "[0, 10)");
        assert_eq!(GroupKey::HighGutter { min: 10 }.to_string(), ">= 10");
        assert_eq!(GroupKey::LowGutter { max: 0 }.to_string(), "< 0");
        assert_eq!(GroupKey::Default.to_string(), "DEFAULT");
    }

    #[test]
    fn test_time_range_render() {
        let key = GroupKey::from_time_range("%Y-%m-%d", 0, 86_400_000);
        assert_eq!(
            key,
            GroupKey::TimeRange {
                label: "[1970-01-01, 1970-01-02)".to_string()
            }
        );
    }
}

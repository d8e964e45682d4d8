//! Numeric-range bucketing
//!
//! Each parent group fans out into `num_buckets` child slots. Unless
//! gutters are excluded, the last two slots of each fan-out catch values
//! outside the covered interval: slot `num_buckets - 1` is the high gutter
//! (`value >= min + interval * (num_buckets - 2)`) and slot
//! `num_buckets - 2` is the low gutter (`value < min`). With a default
//! bucket instead of gutters, the last slot holds rows that matched none of
//! the explicit buckets. With `from_predicate`, the group-by is driven by
//! an explicit predicate list and keys are plain term indexes rather than
//! ranges.

use crate::groupkeys::sets::{GroupKeySet, GroupKeySetRef};
use crate::groupkeys::GroupKey;

/// Grouping by fixed-width numeric buckets
#[derive(Debug)]
pub struct MetricRangeGroupKeySet {
    previous: GroupKeySetRef,
    num_buckets: usize,
    exclude_gutters: bool,
    min: i64,
    interval: i64,
    with_default_bucket: bool,
    from_predicate: bool,
    num_groups: usize,
}

impl MetricRangeGroupKeySet {
    /// Build a metric-range level. `num_groups` is the total group count,
    /// normally `previous.num_groups() * num_buckets`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        previous: GroupKeySetRef,
        num_buckets: usize,
        exclude_gutters: bool,
        min: i64,
        interval: i64,
        with_default_bucket: bool,
        from_predicate: bool,
        num_groups: usize,
    ) -> Self {
        Self {
            previous,
            num_buckets,
            exclude_gutters,
            min,
            interval,
            with_default_bucket,
            from_predicate,
            num_groups,
        }
    }
}

impl GroupKeySet for MetricRangeGroupKeySet {
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
        if !self.exclude_gutters && inner == self.num_buckets - 1 {
            Some(GroupKey::HighGutter {
                min: self.min + self.interval * (self.num_buckets as i64 - 2),
            })
        } else if !self.exclude_gutters && inner == self.num_buckets - 2 {
            Some(GroupKey::LowGutter { max: self.min })
        } else if self.with_default_bucket && inner == self.num_buckets - 1 {
            Some(GroupKey::Default)
        } else if self.from_predicate {
            Some(GroupKey::IntTerm(inner as i64))
        } else {
            Some(GroupKey::Range {
                min: self.min + inner as i64 * self.interval,
                max: self.min + (inner as i64 + 1) * self.interval,
            })
        }
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupkeys::sets::{DumbGroupKeySet, EmptyGroupKeySet};
    use std::sync::Arc;

    fn create() -> MetricRangeGroupKeySet {
        let previous = Arc::new(
            DumbGroupKeySet::new(
                Arc::new(EmptyGroupKeySet),
                vec![0, 1, 1, 1, 1, 1],
                vec![
                    None,
                    Some(GroupKey::IntTerm(1)),
                    Some(GroupKey::IntTerm(2)),
                    Some(GroupKey::IntTerm(3)),
                    Some(GroupKey::IntTerm(4)),
                    Some(GroupKey::IntTerm(5)),
                ],
            )
            .unwrap(),
        );
        MetricRangeGroupKeySet::new(previous, 7, false, 0, 2, false, false, 35)
    }

    #[test]
    fn test_parent_group() {
        let key_set = create();
        for parent in 1..=5 {
            for inner in 1..=7 {
                assert_eq!(key_set.parent_group((parent - 1) * 7 + inner), parent);
            }
        }
    }

    #[test]
    fn test_group_key() {
        let key_set = create();
        for parent_base in (0..35).step_by(7) {
            for inner in 0..5 {
                assert_eq!(
                    key_set.group_key(parent_base + inner + 1),
                    Some(GroupKey::Range {
                        min: 2 * inner as i64,
                        max: 2 * inner as i64 + 2,
                    })
                );
            }
            assert_eq!(
                key_set.group_key(parent_base + 6),
                Some(GroupKey::LowGutter { max: 0 })
            );
            assert_eq!(
                key_set.group_key(parent_base + 7),
                Some(GroupKey::HighGutter { min: 10 })
            );
        }
    }

    #[test]
    fn test_is_present() {
        let key_set = create();
        assert!(!key_set.is_present(0));
        for group in 1..=35 {
            assert!(key_set.is_present(group));
        }
        assert!(!key_set.is_present(36));
    }

    #[test]
    fn test_default_bucket() {
        let key_set = MetricRangeGroupKeySet::new(
            Arc::new(EmptyGroupKeySet),
            4,
            true,
            0,
            5,
            true,
            false,
            4,
        );
        assert_eq!(key_set.group_key(1), Some(GroupKey::Range { min: 0, max: 5 }));
        assert_eq!(key_set.group_key(4), Some(GroupKey::Default));
    }

    #[test]
    fn test_from_predicate() {
        let key_set = MetricRangeGroupKeySet::new(
            Arc::new(EmptyGroupKeySet),
            3,
            true,
            0,
            0,
            false,
            true,
            3,
        );
        assert_eq!(key_set.group_key(1), Some(GroupKey::IntTerm(0)));
        assert_eq!(key_set.group_key(3), Some(GroupKey::IntTerm(2)));
    }
}

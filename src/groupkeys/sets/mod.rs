//! Group key set variants
//!
//! A [`GroupKeySet`] is one level of nested GROUP BY, encoded as a
//! generation layer rather than a materialized tree: each level stores O(1)
//! state plus a shared link back to its parent level. Group counts can
//! reach millions of term buckets, so per-group storage exists only in the
//! variants that genuinely need it (explicit term lists).
//!
//! Variants:
//! - [`EmptyGroupKeySet`]: the root level, one group containing all rows
//! - [`DumbGroupKeySet`]: arbitrary explicit parent array and key list
//! - [`IntTermGroupKeySet`] / [`StringTermGroupKeySet`]: realized field terms
//! - [`MetricRangeGroupKeySet`]: numeric bucketing with gutters
//! - [`DateTimeRangeGroupKeySet`]: fixed-width time buckets
//! - [`UnevenPeriodGroupKeySet`]: calendar month, quarter, or year buckets
//! - [`DayOfWeekGroupKeySet`]: fixed 7-way fan-out
//! - [`SessionNameGroupKeySet`]: dataset identity as a grouping dimension
//! - [`RandomGroupKeySet`]: salted-hash bucketing

mod metric_range;
mod misc;
mod terms;
mod time;

pub use metric_range::MetricRangeGroupKeySet;
pub use misc::{RandomGroupKeySet, SessionNameGroupKeySet};
pub use terms::{IntTermGroupKeySet, StringTermGroupKeySet};
pub use time::{DateTimeRangeGroupKeySet, DayOfWeekGroupKeySet, UnevenPeriod, UnevenPeriodGroupKeySet};

use crate::error::{Error, Result};
use crate::groupkeys::GroupKey;
use std::fmt;
use std::sync::Arc;

/// Shared handle to one grouping level
pub type GroupKeySetRef = Arc<dyn GroupKeySet>;

/// One level of nested GROUP BY
pub trait GroupKeySet: fmt::Debug + Send + Sync {
    /// The enclosing level, or `None` at the root
    fn previous(&self) -> Option<&dyn GroupKeySet>;

    /// Parent group number in the previous level.
    ///
    /// Defined for `1 <= group <= num_groups()`; the result is a valid group
    /// number in `previous()`.
    fn parent_group(&self, group: usize) -> usize;

    /// Displayable key of one group, or `None` for group 0 and groups with
    /// no key
    fn group_key(&self, group: usize) -> Option<GroupKey>;

    /// Number of groups at this level. Valid group numbers are
    /// `1..=num_groups()`.
    fn num_groups(&self) -> usize;

    /// True iff the group is in range, has a key, and its parent chain is
    /// present all the way to the root
    fn is_present(&self, group: usize) -> bool {
        if group == 0 || group > self.num_groups() || self.group_key(group).is_none() {
            return false;
        }
        match self.previous() {
            Some(previous) => previous.is_present(self.parent_group(group)),
            None => true,
        }
    }
}

/// Parent group of every group at this level, as an array of length
/// `num_groups() + 1` indexed by group number. Index 0 is unused and holds 0.
pub fn parents(key_set: &dyn GroupKeySet) -> Vec<usize> {
    let num_groups = key_set.num_groups();
    let mut result = vec![0; num_groups + 1];
    for (group, slot) in result.iter_mut().enumerate().skip(1) {
        *slot = key_set.parent_group(group);
    }
    result
}

/// The root grouping level: a single group containing all rows
#[derive(Debug, Default)]
pub struct EmptyGroupKeySet;

impl GroupKeySet for EmptyGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        None
    }

    fn parent_group(&self, _group: usize) -> usize {
        1
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 1 {
            Some(GroupKey::Empty)
        } else {
            None
        }
    }

    fn num_groups(&self) -> usize {
        1
    }
}

/// A level built from an explicit parent array and key list.
///
/// Used for regroups whose structure is computed elsewhere; index 0 of both
/// arrays is unused.
#[derive(Debug)]
pub struct DumbGroupKeySet {
    previous: GroupKeySetRef,
    raw_parents: Vec<usize>,
    keys: Vec<Option<GroupKey>>,
}

impl DumbGroupKeySet {
    /// Build from explicit arrays. Both must have the same length, which is
    /// `num_groups + 1` with index 0 unused.
    pub fn new(
        previous: GroupKeySetRef,
        raw_parents: Vec<usize>,
        keys: Vec<Option<GroupKey>>,
    ) -> Result<Self> {
        if raw_parents.len() != keys.len() {
            return Err(Error::invalid_argument(format!(
                "parent array length {} does not match key list length {}",
                raw_parents.len(),
                keys.len()
            )));
        }
        if raw_parents.is_empty() {
            return Err(Error::invalid_argument(
                "parent array must include the unused index 0",
            ));
        }
        Ok(Self {
            previous,
            raw_parents,
            keys,
        })
    }
}

impl GroupKeySet for DumbGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        self.raw_parents.get(group).copied().unwrap_or(0)
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        self.keys.get(group).cloned().flatten()
    }

    fn num_groups(&self) -> usize {
        self.keys.len() - 1
    }
}

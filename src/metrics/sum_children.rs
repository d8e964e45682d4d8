//! Sibling-group sums

use crate::error::{Error, Result};
use crate::groupkeys::sets::GroupKeySetRef;
use crate::metrics::AggregateMetric;

/// For each group, the sum of the inner metric over all groups sharing its
/// parent.
///
/// Batch-only: the streaming path sees one (term, group) pair at a time and
/// cannot know the sibling totals until the stream ends.
#[derive(Debug)]
pub struct SumChildren {
    inner: Box<AggregateMetric>,

    key_set: Option<GroupKeySetRef>,
}

impl SumChildren {
    /// Sibling sum over the inner metric
    pub fn new(inner: AggregateMetric) -> Self {
        Self {
            inner: Box::new(inner),
            key_set: None,
        }
    }

    pub(crate) fn inner(&self) -> &AggregateMetric {
        &self.inner
    }

    pub(crate) fn inner_mut(&mut self) -> &mut AggregateMetric {
        &mut self.inner
    }

    pub(crate) fn bind(&mut self, key_set: &GroupKeySetRef) {
        self.key_set = Some(key_set.clone());
    }

    pub(crate) fn group_stats(&mut self, stats: &[Vec<i64>], num_groups: usize) -> Result<Vec<f64>> {
        let key_set = self
            .key_set
            .clone()
            .ok_or(Error::NotRegistered("group_stats"))?;
        let inner = self.inner.group_stats(stats, num_groups)?;
        let parent_count = key_set
            .previous()
            .map(|previous| previous.num_groups())
            .unwrap_or(1);
        let mut parent_sums = vec![0.0; parent_count + 1];
        for group in 1..=num_groups {
            let parent = key_set.parent_group(group);
            if parent < parent_sums.len() {
                parent_sums[parent] += inner[group];
            }
        }
        let mut result = vec![0.0; num_groups + 1];
        for group in 1..=num_groups {
            let parent = key_set.parent_group(group);
            result[group] = parent_sums.get(parent).copied().unwrap_or(0.0);
        }
        Ok(result)
    }
}

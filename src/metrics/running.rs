//! Cumulative sums reset at ancestor boundaries

use crate::error::{Error, Result};
use crate::groupkeys::sets::GroupKeySetRef;
use crate::metrics::AggregateMetric;
use crate::types::Term;

/// Cumulative sum of the inner metric, reset whenever the ancestor `offset`
/// levels up changes.
///
/// `offset = 1` restarts the sum at each parent group; larger offsets
/// restart it at coarser boundaries. The group-to-ancestor table is built
/// once during `register` so evaluation never walks the level chain.
#[derive(Debug)]
pub struct Running {
    offset: usize,
    inner: Box<AggregateMetric>,

    ancestors: Vec<usize>,
    sums: Vec<f64>,
}

impl Running {
    /// Running sum over the inner metric with boundaries `offset` levels up
    pub fn new(inner: AggregateMetric, offset: usize) -> Self {
        Self {
            offset,
            inner: Box::new(inner),
            ancestors: Vec::new(),
            sums: Vec::new(),
        }
    }

    pub(crate) fn inner(&self) -> &AggregateMetric {
        &self.inner
    }

    pub(crate) fn inner_mut(&mut self) -> &mut AggregateMetric {
        &mut self.inner
    }

    pub(crate) fn bind(&mut self, key_set: &GroupKeySetRef) {
        let num_groups = key_set.num_groups();
        let mut ancestors = vec![0; num_groups + 1];
        let mut max_ancestor = 0;
        for (group, slot) in ancestors.iter_mut().enumerate().skip(1) {
            let mut level: &dyn crate::groupkeys::sets::GroupKeySet = key_set.as_ref();
            let mut ancestor = group;
            for _ in 0..self.offset {
                ancestor = level.parent_group(ancestor);
                if let Some(previous) = level.previous() {
                    level = previous;
                }
            }
            *slot = ancestor;
            max_ancestor = max_ancestor.max(ancestor);
        }
        self.ancestors = ancestors;
        self.sums = vec![0.0; max_ancestor + 1];
    }

    pub(crate) fn group_stats(&mut self, stats: &[Vec<i64>], num_groups: usize) -> Result<Vec<f64>> {
        if self.ancestors.is_empty() {
            return Err(Error::NotRegistered("group_stats"));
        }
        let inner = self.inner.group_stats(stats, num_groups)?;
        let mut sums = vec![0.0; self.sums.len()];
        let mut result = vec![0.0; num_groups + 1];
        for group in 1..=num_groups {
            let ancestor = self.ancestors[group];
            sums[ancestor] += inner[group];
            result[group] = sums[ancestor];
        }
        Ok(result)
    }

    pub(crate) fn apply(&mut self, term: &Term, stats: &[i64], group: usize) -> Result<f64> {
        if self.ancestors.is_empty() {
            return Err(Error::NotRegistered("apply"));
        }
        let value = self.inner.apply(term, stats, group)?;
        let ancestor = self
            .ancestors
            .get(group)
            .copied()
            .ok_or_else(|| Error::internal(format!("group {} out of range for running sum", group)))?;
        self.sums[ancestor] += value;
        Ok(self.sums[ancestor])
    }
}

//! Lag metrics: values from earlier steps of the streaming iteration

use crate::error::{Error, Result};
use crate::groupkeys::sets::GroupKeySetRef;
use crate::metrics::AggregateMetric;
use crate::types::Term;
use std::collections::{HashMap, VecDeque};

/// The inner metric's value from `delay` terms earlier, scoped per group.
///
/// Each group sees its own term sequence; the last `delay` values per group
/// are buffered and replayed once the buffer is full. Groups with fewer
/// than `delay` values seen so far yield 0. Only meaningful in term-sorted
/// streaming order; the batch path has no term axis at all.
#[derive(Debug)]
pub struct IterateLag {
    delay: usize,
    inner: Box<AggregateMetric>,

    buffers: HashMap<usize, VecDeque<f64>>,
}

impl IterateLag {
    /// Lag of `delay` iteration steps over the inner metric
    pub fn new(delay: usize, inner: AggregateMetric) -> Self {
        Self {
            delay,
            inner: Box::new(inner),
            buffers: HashMap::new(),
        }
    }

    pub(crate) fn inner(&self) -> &AggregateMetric {
        &self.inner
    }

    pub(crate) fn inner_mut(&mut self) -> &mut AggregateMetric {
        &mut self.inner
    }

    pub(crate) fn apply(&mut self, term: &Term, stats: &[i64], group: usize) -> Result<f64> {
        let value = self.inner.apply(term, stats, group)?;
        let buffer = self.buffers.entry(group).or_default();
        buffer.push_back(value);
        if buffer.len() > self.delay {
            Ok(buffer.pop_front().unwrap_or(0.0))
        } else {
            Ok(0.0)
        }
    }
}

/// The inner metric's value from the sibling group `delay` positions back.
///
/// Carries a short buffer of (group, value) pairs across the stream and
/// looks back for the sibling `group - delay` under the same parent. Misses
/// yield 0. Unlike [`IterateLag`] this has a batch form: replaying the
/// lookup group-by-group over the dense array gives the same answers.
#[derive(Debug)]
pub struct ParentLag {
    delay: usize,
    inner: Box<AggregateMetric>,

    prev_groups: VecDeque<usize>,
    prev_scores: VecDeque<f64>,
    key_set: Option<GroupKeySetRef>,
}

impl ParentLag {
    /// Lag of `delay` sibling groups over the inner metric
    pub fn new(delay: usize, inner: AggregateMetric) -> Self {
        Self {
            delay,
            inner: Box::new(inner),
            prev_groups: VecDeque::with_capacity(delay + 1),
            prev_scores: VecDeque::with_capacity(delay + 1),
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
        let inner = self.inner.group_stats(stats, num_groups)?;
        let mut result = vec![0.0; num_groups + 1];
        for group in 1..=num_groups {
            result[group] = self.handle(group, inner[group])?;
        }
        Ok(result)
    }

    pub(crate) fn apply(&mut self, term: &Term, stats: &[i64], group: usize) -> Result<f64> {
        let value = self.inner.apply(term, stats, group)?;
        self.handle(group, value)
    }

    fn handle(&mut self, group: usize, value: f64) -> Result<f64> {
        let key_set = self.key_set.clone().ok_or(Error::NotRegistered("apply"))?;
        let parent = key_set.parent_group(group);
        let target = self
            .prev_groups
            .iter()
            .copied()
            .find(|&g| key_set.parent_group(g) == parent && g + self.delay == group);

        let mut result = 0.0;
        if let Some(target) = target {
            // drop everything up to and including the match
            while let (Some(g), Some(score)) =
                (self.prev_groups.pop_front(), self.prev_scores.pop_front())
            {
                if g == target {
                    result = score;
                    break;
                }
            }
        }

        self.prev_groups.push_back(group);
        self.prev_scores.push_back(value);
        if self.prev_scores.len() > self.delay {
            self.prev_groups.pop_front();
            self.prev_scores.pop_front();
        }

        Ok(result)
    }
}

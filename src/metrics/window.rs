//! Rolling-window sum over adjacent sibling groups

use crate::error::{Error, Result};
use crate::groupkeys::sets::GroupKeySetRef;
use crate::metrics::AggregateMetric;
use crate::types::Term;

/// Rolling sum of the inner metric over a window of `size` adjacent groups
/// sharing one parent.
///
/// The streaming path sees one value per (term, group) pair in term-sorted
/// order and scatters each value forward into the sums of the next `size`
/// sibling groups. When the term changes, any nonzero residual beyond the
/// last group seen means the window straddles groups the stream never
/// visited, which is a fatal condition. The batch path runs over a dense
/// per-group array and only needs to reset the rolling sum at parent
/// boundaries.
#[derive(Debug)]
pub struct Window {
    size: usize,
    inner: Box<AggregateMetric>,

    iteration_started: bool,
    current_term: Option<Term>,
    last_group: usize,
    sums: Vec<f64>,
    key_set: Option<GroupKeySetRef>,
}

impl Window {
    /// Window of `size` groups over the inner metric
    pub fn new(size: usize, inner: AggregateMetric) -> Self {
        Self {
            size,
            inner: Box::new(inner),
            iteration_started: false,
            current_term: None,
            last_group: 0,
            sums: Vec::new(),
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
        self.sums = vec![0.0; key_set.num_groups() + 1];
        self.key_set = Some(key_set.clone());
    }

    pub(crate) fn group_stats(&mut self, stats: &[Vec<i64>], num_groups: usize) -> Result<Vec<f64>> {
        let key_set = self
            .key_set
            .clone()
            .ok_or(Error::NotRegistered("group_stats"))?;
        let inner = self.inner.group_stats(stats, num_groups)?;
        let mut result = vec![0.0; num_groups + 1];
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut current_parent = 0usize;
        for group in 1..=num_groups {
            let parent = key_set.parent_group(group);
            if parent != current_parent {
                current_parent = parent;
                sum = 0.0;
                count = 0;
            }
            sum += inner[group];
            count += 1;
            if count > self.size {
                sum -= inner[group - self.size];
            }
            result[group] = sum;
        }
        Ok(result)
    }

    pub(crate) fn apply(&mut self, term: &Term, stats: &[i64], group: usize) -> Result<f64> {
        if self.iteration_started && self.current_term.as_ref() != Some(term) {
            self.clear()?;
        }
        if self.current_term.as_ref() != Some(term) {
            self.current_term = Some(term.clone());
        }
        let value = self.inner.apply(term, stats, group)?;
        self.handle(group, value)
    }

    /// Reset the accumulated sums at a term boundary. Residual sums past the
    /// last group seen mean the previous term's window extends into groups
    /// it never visited.
    fn clear(&mut self) -> Result<()> {
        for group in self.last_group + 1..=self.last_group + self.size {
            if group < self.sums.len() && self.sums[group] != 0.0 {
                return Err(Error::execution(
                    "cannot use window where the window overlaps missing data",
                ));
            }
        }
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        Ok(())
    }

    fn handle(&mut self, group: usize, value: f64) -> Result<f64> {
        let key_set = self.key_set.clone().ok_or(Error::NotRegistered("apply"))?;
        self.iteration_started = true;
        let parent = key_set.parent_group(group);
        for offset in 0..self.size {
            let scatter = group + offset;
            if scatter <= key_set.num_groups() && key_set.parent_group(scatter) == parent {
                self.sums[scatter] += value;
            }
        }
        self.last_group = group;
        Ok(self.sums[group])
    }
}

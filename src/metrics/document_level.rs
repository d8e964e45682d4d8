//! Leaf metric backed by a remote-computed statistic

use crate::error::{Error, Result};
use crate::types::QualifiedPush;
use std::collections::{HashMap, HashSet};

/// A statistic computed by the remote store, referenced by its
/// [`QualifiedPush`] and bound to a stats-array column during `register`.
#[derive(Debug, Clone)]
pub struct DocumentLevelMetric {
    push: QualifiedPush,
    index: Option<usize>,
}

impl DocumentLevelMetric {
    /// Metric for one remote push
    pub fn new(push: QualifiedPush) -> Self {
        Self { push, index: None }
    }

    pub(crate) fn requires(&self, out: &mut HashSet<QualifiedPush>) {
        out.insert(self.push.clone());
    }

    pub(crate) fn register(&mut self, metric_indexes: &HashMap<QualifiedPush, usize>) -> Result<()> {
        match metric_indexes.get(&self.push) {
            Some(index) => {
                self.index = Some(*index);
                Ok(())
            }
            None => Err(Error::MissingMetricIndex(self.push.clone())),
        }
    }

    pub(crate) fn group_stats(&self, stats: &[Vec<i64>], num_groups: usize) -> Result<Vec<f64>> {
        let index = self.index.ok_or(Error::NotRegistered("group_stats"))?;
        let column = stats
            .get(index)
            .ok_or_else(|| Error::internal(format!("stats array has no column {}", index)))?;
        let mut result = vec![0.0; num_groups + 1];
        for group in 1..=num_groups {
            result[group] = column.get(group).copied().unwrap_or(0) as f64;
        }
        Ok(result)
    }

    pub(crate) fn apply(&self, stats: &[i64]) -> Result<f64> {
        let index = self.index.ok_or(Error::NotRegistered("apply"))?;
        stats
            .get(index)
            .map(|v| *v as f64)
            .ok_or_else(|| Error::internal(format!("streaming stats have no column {}", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_binds_index() {
        let push = QualifiedPush::new("jobsearch", vec!["count()".to_string()]);
        let mut metric = DocumentLevelMetric::new(push.clone());

        let mut indexes = HashMap::new();
        indexes.insert(push, 1usize);
        metric.register(&indexes).unwrap();

        let stats = vec![vec![0, 10, 20], vec![0, 1, 2]];
        assert_eq!(metric.group_stats(&stats, 2).unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(metric.apply(&[5, 7]).unwrap(), 7.0);
    }

    #[test]
    fn test_missing_index_is_an_error() {
        let mut metric =
            DocumentLevelMetric::new(QualifiedPush::new("jobsearch", vec!["clicks".to_string()]));
        assert!(matches!(
            metric.register(&HashMap::new()),
            Err(Error::MissingMetricIndex(_))
        ));
    }

    #[test]
    fn test_unregistered_use_is_an_error() {
        let metric =
            DocumentLevelMetric::new(QualifiedPush::new("jobsearch", vec!["clicks".to_string()]));
        assert!(matches!(
            metric.apply(&[1]),
            Err(Error::NotRegistered("apply"))
        ));
    }
}

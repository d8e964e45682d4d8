//! Execution driver over a remote session
//!
//! [`Session`] owns the boundary to the remote document store and drives
//! one query: it applies regroup actions, tracks the active
//! [`GroupKeySet`] chain and group count, and runs the two evaluation
//! passes over metric trees. All network I/O lives behind the
//! [`RemoteSession`] trait; the core itself is pure computation.
//!
//! [`GroupKeySet`]: crate::groupkeys::sets::GroupKeySet

use crate::actions::{optimizer, Action};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::groupkeys::sets::{EmptyGroupKeySet, GroupKeySetRef};
use crate::metrics::AggregateMetric;
use crate::schema::{DatasetsMetadata, ValidationLog};
use crate::types::{QualifiedPush, Term};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// One remote regroup primitive, the wire-level counterpart of an
/// [`Action`]
#[derive(Debug, Clone, PartialEq)]
pub enum RegroupRule {
    /// Split by a per-dataset document query
    Query {
        /// Query per dataset
        per_dataset_query: BTreeMap<String, crate::docquery::DocQuery>,
        /// Group being split
        target_group: usize,
        /// Destination for matching rows
        positive_group: usize,
        /// Destination for the rest
        negative_group: usize,
    },
    /// Split by membership in an int term set
    IntTermSet {
        /// Datasets the rule applies to
        scope: BTreeSet<String>,
        /// Field holding the terms
        field: String,
        /// Matching terms, sorted
        terms: Vec<i64>,
        /// Group being split
        target_group: usize,
        /// Destination for matching rows
        positive_group: usize,
        /// Destination for the rest
        negative_group: usize,
    },
    /// Split by membership in a string term set
    StringTermSet {
        /// Datasets the rule applies to
        scope: BTreeSet<String>,
        /// Field holding the terms
        field: String,
        /// Matching terms
        terms: Vec<String>,
        /// Group being split
        target_group: usize,
        /// Destination for matching rows
        positive_group: usize,
        /// Destination for the rest
        negative_group: usize,
    },
    /// Split by a term regex
    Regex {
        /// Datasets the rule applies to
        scope: BTreeSet<String>,
        /// Field matched against the pattern
        field: String,
        /// Pattern text
        regex: String,
        /// Group being split
        target_group: usize,
        /// Destination for matching rows
        positive_group: usize,
        /// Destination for the rest
        negative_group: usize,
    },
    /// Split by a 0/1 filter metric
    MetricFilter {
        /// Push-instruction list per dataset
        per_dataset_pushes: BTreeMap<String, Vec<String>>,
        /// Group being split
        target_group: usize,
        /// Destination for matching rows
        positive_group: usize,
        /// Destination for the rest
        negative_group: usize,
    },
    /// Split by a salted per-document hash
    Sample {
        /// Datasets the rule applies to
        scope: BTreeSet<String>,
        /// Field whose terms are hashed
        field: String,
        /// Fraction kept in the positive group
        probability: f64,
        /// Hash salt
        seed: String,
        /// Group being split
        target_group: usize,
        /// Destination for sampled rows
        positive_group: usize,
        /// Destination for the rest
        negative_group: usize,
    },
    /// Move whole groups unconditionally
    Unconditional {
        /// Datasets the rule applies to
        scope: BTreeSet<String>,
        /// Groups being moved
        from_groups: Vec<usize>,
        /// Destination group
        to_group: usize,
    },
}

/// One record of a sorted remote term iteration
#[derive(Debug, Clone, PartialEq)]
pub struct FtgsRecord {
    /// Field term
    pub term: Term,
    /// Group the term's documents fall in
    pub group: usize,
    /// One value per pushed statistic
    pub stats: Vec<i64>,
}

/// Boundary to the remote document store.
///
/// Calls block; retry and cancellation policy belongs to whoever owns the
/// session, not to this crate.
pub trait RemoteSession {
    /// Apply one regroup rule; returns the resulting group count
    fn regroup(&mut self, rule: &RegroupRule) -> Result<usize>;

    /// Push one statistic; returns its stat index
    fn push_stats(&mut self, session_name: &str, pushes: &[String]) -> Result<usize>;

    /// Pop the most recently pushed statistic
    fn pop_stat(&mut self) -> Result<()>;

    /// Dense per-group values of one pushed statistic, indexed by group
    /// number with index 0 unused
    fn get_group_stats(&mut self, stat_index: usize) -> Result<Vec<i64>>;

    /// Term-sorted iteration over (term, group, stats) records for the
    /// currently pushed statistics
    fn ftgs(&mut self) -> Result<Vec<FtgsRecord>>;
}

/// Driver for one query against one remote session
pub struct Session {
    remote: Box<dyn RemoteSession>,
    metadata: DatasetsMetadata,
    config: EngineConfig,
    group_key_set: GroupKeySetRef,
    num_groups: usize,
}

impl Session {
    /// Start a session at the root grouping (one group, all rows)
    pub fn new(
        remote: Box<dyn RemoteSession>,
        metadata: DatasetsMetadata,
        config: EngineConfig,
    ) -> Self {
        Self {
            remote,
            metadata,
            config,
            group_key_set: Arc::new(EmptyGroupKeySet),
            num_groups: 1,
        }
    }

    /// The active grouping chain
    pub fn group_key_set(&self) -> &GroupKeySetRef {
        &self.group_key_set
    }

    /// Engine configuration, e.g. the time format for bucket labels
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current group count
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Install the grouping produced by a regroup. The key set's own group
    /// count wins; regroups and key-set construction happen in lockstep.
    pub fn set_group_key_set(&mut self, key_set: GroupKeySetRef) -> Result<()> {
        self.num_groups = key_set.num_groups();
        self.group_key_set = key_set;
        self.check_group_limit(self.num_groups)
    }

    fn check_group_limit(&self, groups: usize) -> Result<()> {
        let limit = self.config.limits.group_limit;
        if groups > limit {
            return Err(Error::GroupLimitExceeded { groups, limit });
        }
        Ok(())
    }

    /// Validate, optionally optimize, translate, and issue a batch of
    /// actions. Validation problems abort before the first remote call.
    pub fn apply_actions(&mut self, actions: Vec<Action>) -> Result<()> {
        let mut log = ValidationLog::new();
        for action in &actions {
            action.validate(&self.metadata, &mut log);
        }
        if !log.is_valid() {
            return Err(Error::invalid_argument(log.errors().join("; ")));
        }

        let actions = if self.config.regroup.optimize_consecutive_queries {
            optimizer::optimize_consecutive_query_actions(actions)
        } else {
            actions
        };

        for action in &actions {
            for rule in action.to_regroup_rules(&self.metadata) {
                tracing::debug!(?rule, "issuing regroup");
                let groups = self.remote.regroup(&rule)?;
                self.check_group_limit(groups)?;
                self.num_groups = groups;
            }
        }
        Ok(())
    }

    /// Batch evaluation pass.
    ///
    /// Unions `requires()` across the metric trees, assigns dense metric
    /// indexes, registers every tree, fetches one stats column per push,
    /// then evaluates each tree over the dense arrays. Multi-valued
    /// per-group constants expand into one output column per value. Output
    /// is one column per metric (or expanded value), each of length
    /// `num_groups + 1`.
    pub fn get_group_stats(&mut self, metrics: &mut [AggregateMetric]) -> Result<Vec<Vec<f64>>> {
        let (stats, _) = self.fetch_stats(metrics)?;

        let mut columns = Vec::with_capacity(metrics.len());
        for metric in metrics.iter_mut() {
            match metric {
                AggregateMetric::MultiPerGroupConstant(constant) => {
                    let width = constant
                        .values
                        .iter()
                        .map(|row| row.len())
                        .max()
                        .unwrap_or(0);
                    for value_index in 0..width {
                        let mut column = vec![0.0; self.num_groups + 1];
                        for group in 1..=self.num_groups {
                            column[group] = constant
                                .values
                                .get(group)
                                .and_then(|row| row.get(value_index))
                                .copied()
                                .unwrap_or(0.0);
                        }
                        columns.push(column);
                    }
                }
                metric => columns.push(metric.group_stats(&stats, self.num_groups)?),
            }
        }
        Ok(columns)
    }

    /// Streaming evaluation pass over a sorted remote term iteration.
    ///
    /// Required whenever any metric `needs_sorted()`. Drives every record
    /// through every tree; each group's final value is the last one its
    /// stream produced. Output is one column per metric of length
    /// `num_groups + 1`.
    pub fn stream_group_stats(&mut self, metrics: &mut [AggregateMetric]) -> Result<Vec<Vec<f64>>> {
        self.register_and_push(metrics)?;
        let records = self.remote.ftgs()?;

        let mut columns = vec![vec![0.0; self.num_groups + 1]; metrics.len()];
        for record in &records {
            for (metric, column) in metrics.iter_mut().zip(columns.iter_mut()) {
                let value = metric.apply(&record.term, &record.stats, record.group)?;
                if record.group <= self.num_groups {
                    column[record.group] = value;
                }
            }
        }
        Ok(columns)
    }

    /// Register the trees and fetch dense stats columns for every required
    /// push
    fn fetch_stats(
        &mut self,
        metrics: &mut [AggregateMetric],
    ) -> Result<(Vec<Vec<i64>>, HashMap<QualifiedPush, usize>)> {
        let indexes = self.register_metrics(metrics)?;

        let mut stats = vec![Vec::new(); indexes.len()];
        let mut ordered: Vec<(&QualifiedPush, &usize)> = indexes.iter().collect();
        ordered.sort_by_key(|(_, index)| **index);
        for (push, index) in ordered {
            let stat_index = self.remote.push_stats(&push.session_name, &push.pushes)?;
            stats[*index] = self.remote.get_group_stats(stat_index)?;
            self.remote.pop_stat()?;
        }
        Ok((stats, indexes))
    }

    /// Register the trees and push every required stat, leaving the pushes
    /// in place for an FTGS pass
    fn register_and_push(
        &mut self,
        metrics: &mut [AggregateMetric],
    ) -> Result<HashMap<QualifiedPush, usize>> {
        let indexes = self.register_metrics(metrics)?;
        let mut ordered: Vec<(&QualifiedPush, &usize)> = indexes.iter().collect();
        ordered.sort_by_key(|(_, index)| **index);
        for (push, _) in ordered {
            self.remote.push_stats(&push.session_name, &push.pushes)?;
        }
        Ok(indexes)
    }

    /// Union of `requires()` across trees, assigned dense indexes in a
    /// deterministic order, then `register` on every tree
    fn register_metrics(
        &mut self,
        metrics: &mut [AggregateMetric],
    ) -> Result<HashMap<QualifiedPush, usize>> {
        let mut pushes: Vec<QualifiedPush> = Vec::new();
        for metric in metrics.iter() {
            for push in metric.requires() {
                if !pushes.contains(&push) {
                    pushes.push(push);
                }
            }
        }
        pushes.sort_by(|a, b| {
            a.session_name
                .cmp(&b.session_name)
                .then_with(|| a.pushes.cmp(&b.pushes))
        });
        let indexes: HashMap<QualifiedPush, usize> = pushes
            .into_iter()
            .enumerate()
            .map(|(index, push)| (push, index))
            .collect();

        tracing::debug!(stat_count = indexes.len(), "registering metric trees");
        for metric in metrics.iter_mut() {
            metric.register(&indexes, &self.group_key_set)?;
        }
        Ok(indexes)
    }
}

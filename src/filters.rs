//! Aggregate filter expression trees
//!
//! Boolean sibling of [`AggregateMetric`], with the same dual evaluation
//! contract: batch [`AggregateFilter::group_stats`] yields one bool per
//! group, streaming [`AggregateFilter::allow`] yields one bool per
//! (term, group) pair. Term-pattern filters exist only in the streaming
//! path since the batch path has no term axis.

use crate::error::{Error, Result};
use crate::groupkeys::sets::GroupKeySetRef;
use crate::metrics::AggregateMetric;
use crate::types::{QualifiedPush, Term};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// A compiled term pattern.
///
/// Patterns are compiled eagerly so malformed regexes surface while the
/// query is still being validated, not mid-stream.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    pattern: String,
    regex: Regex,
}

impl RegexFilter {
    /// Compile a pattern
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern).map_err(|source| Error::InvalidRegex {
            pattern: pattern.clone(),
            source,
        })?;
        Ok(Self { pattern, regex })
    }

    /// The original pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn matches(&self, term: &Term) -> bool {
        self.regex.is_match(&term.render())
    }
}

/// Comparison operator for metric filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Neq,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
}

impl CompareOp {
    fn eval(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Neq => left != right,
            CompareOp::Gt => left > right,
            CompareOp::Gte => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Lte => left <= right,
        }
    }
}

/// One node of an aggregate filter expression tree
#[derive(Debug)]
pub enum AggregateFilter {
    /// Current term equals the given term
    TermEquals(Term),
    /// Current term matches the pattern
    TermRegex(RegexFilter),
    /// Current term matches the pattern (field-regex form)
    Regex(RegexFilter),
    /// Negation
    Not(Box<AggregateFilter>),
    /// All children hold
    And(Vec<AggregateFilter>),
    /// At least one child holds
    Or(Vec<AggregateFilter>),
    /// Comparison of two metric values
    MetricCompare {
        /// Comparison operator
        op: CompareOp,
        /// Left metric
        left: Box<AggregateMetric>,
        /// Right metric
        right: Box<AggregateMetric>,
    },
    /// Fixed truth value
    Constant(bool),
    /// True for groups whose key is the catch-all bucket
    IsDefaultGroup {
        /// Active grouping, captured at register
        key_set: Option<GroupKeySetRef>,
    },
}

impl AggregateFilter {
    /// Term-equality filter
    pub fn term_equals(term: impl Into<Term>) -> Self {
        AggregateFilter::TermEquals(term.into())
    }

    /// Term-pattern filter
    pub fn term_regex(pattern: impl Into<String>) -> Result<Self> {
        Ok(AggregateFilter::TermRegex(RegexFilter::new(pattern)?))
    }

    /// Negation
    pub fn not(inner: AggregateFilter) -> Self {
        AggregateFilter::Not(Box::new(inner))
    }

    /// N-ary conjunction, requires at least two children
    pub fn and(children: Vec<AggregateFilter>) -> Result<Self> {
        if children.len() < 2 {
            return Err(Error::invalid_argument(
                "conjunction requires at least two operands",
            ));
        }
        Ok(AggregateFilter::And(children))
    }

    /// N-ary disjunction, requires at least two children
    pub fn or(children: Vec<AggregateFilter>) -> Result<Self> {
        if children.len() < 2 {
            return Err(Error::invalid_argument(
                "disjunction requires at least two operands",
            ));
        }
        Ok(AggregateFilter::Or(children))
    }

    /// Comparison of two metric values
    pub fn compare(op: CompareOp, left: AggregateMetric, right: AggregateMetric) -> Self {
        AggregateFilter::MetricCompare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Default-bucket filter; binds to the grouping at register
    pub fn is_default_group() -> Self {
        AggregateFilter::IsDefaultGroup { key_set: None }
    }

    /// The remote statistics this tree needs
    pub fn requires(&self) -> HashSet<QualifiedPush> {
        let mut out = HashSet::new();
        self.collect_requires(&mut out);
        out
    }

    pub(crate) fn collect_requires(&self, out: &mut HashSet<QualifiedPush>) {
        match self {
            AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::Regex(_)
            | AggregateFilter::Constant(_)
            | AggregateFilter::IsDefaultGroup { .. } => {}
            AggregateFilter::Not(inner) => inner.collect_requires(out),
            AggregateFilter::And(children) | AggregateFilter::Or(children) => {
                for child in children {
                    child.collect_requires(out);
                }
            }
            AggregateFilter::MetricCompare { left, right, .. } => {
                left.collect_requires(out);
                right.collect_requires(out);
            }
        }
    }

    /// Bind metric leaves and capture the active grouping where needed
    pub fn register(
        &mut self,
        metric_indexes: &HashMap<QualifiedPush, usize>,
        key_set: &GroupKeySetRef,
    ) -> Result<()> {
        match self {
            AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::Regex(_)
            | AggregateFilter::Constant(_) => Ok(()),
            AggregateFilter::IsDefaultGroup { key_set: slot } => {
                *slot = Some(key_set.clone());
                Ok(())
            }
            AggregateFilter::Not(inner) => inner.register(metric_indexes, key_set),
            AggregateFilter::And(children) | AggregateFilter::Or(children) => {
                for child in children {
                    child.register(metric_indexes, key_set)?;
                }
                Ok(())
            }
            AggregateFilter::MetricCompare { left, right, .. } => {
                left.register(metric_indexes, key_set)?;
                right.register(metric_indexes, key_set)
            }
        }
    }

    /// Batch evaluation, one bool per group, index 0 unused
    pub fn group_stats(&mut self, stats: &[Vec<i64>], num_groups: usize) -> Result<Vec<bool>> {
        match self {
            AggregateFilter::TermEquals(_) => Err(Error::Unsupported {
                what: "term-equality filter",
                mode: "batch",
            }),
            AggregateFilter::TermRegex(_) | AggregateFilter::Regex(_) => Err(Error::Unsupported {
                what: "term-pattern filter",
                mode: "batch",
            }),
            AggregateFilter::Not(inner) => {
                let mut result = inner.group_stats(stats, num_groups)?;
                for value in result.iter_mut().skip(1) {
                    *value = !*value;
                }
                Ok(result)
            }
            AggregateFilter::And(children) => {
                let mut result = vec![true; num_groups + 1];
                for child in children {
                    let child_result = child.group_stats(stats, num_groups)?;
                    for (value, c) in result.iter_mut().zip(child_result).skip(1) {
                        *value = *value && c;
                    }
                }
                Ok(result)
            }
            AggregateFilter::Or(children) => {
                let mut result = vec![false; num_groups + 1];
                for child in children {
                    let child_result = child.group_stats(stats, num_groups)?;
                    for (value, c) in result.iter_mut().zip(child_result).skip(1) {
                        *value = *value || c;
                    }
                }
                Ok(result)
            }
            AggregateFilter::MetricCompare { op, left, right } => {
                let left = left.group_stats(stats, num_groups)?;
                let right = right.group_stats(stats, num_groups)?;
                let mut result = vec![false; num_groups + 1];
                for group in 1..=num_groups {
                    result[group] = op.eval(left[group], right[group]);
                }
                Ok(result)
            }
            AggregateFilter::Constant(value) => Ok(vec![*value; num_groups + 1]),
            AggregateFilter::IsDefaultGroup { key_set } => {
                let key_set = key_set.clone().ok_or(Error::NotRegistered("group_stats"))?;
                let mut result = vec![false; num_groups + 1];
                for (group, slot) in result.iter_mut().enumerate().skip(1) {
                    *slot = key_set
                        .group_key(group)
                        .map(|key| key.is_default())
                        .unwrap_or(false);
                }
                Ok(result)
            }
        }
    }

    /// Streaming evaluation, one call per (term, group) pair
    pub fn allow(&mut self, term: &Term, stats: &[i64], group: usize) -> Result<bool> {
        match self {
            AggregateFilter::TermEquals(expected) => match (expected, term) {
                (Term::Int(a), Term::Int(b)) => Ok(a == b),
                // mixed comparisons go through the rendered form
                (a, b) => Ok(a.render() == b.render()),
            },
            AggregateFilter::TermRegex(filter) | AggregateFilter::Regex(filter) => {
                Ok(filter.matches(term))
            }
            AggregateFilter::Not(inner) => Ok(!inner.allow(term, stats, group)?),
            AggregateFilter::And(children) => {
                for child in children {
                    if !child.allow(term, stats, group)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            AggregateFilter::Or(children) => {
                for child in children {
                    if child.allow(term, stats, group)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            AggregateFilter::MetricCompare { op, left, right } => Ok(op.eval(
                left.apply(term, stats, group)?,
                right.apply(term, stats, group)?,
            )),
            AggregateFilter::Constant(value) => Ok(*value),
            AggregateFilter::IsDefaultGroup { key_set } => {
                let key_set = key_set.clone().ok_or(Error::NotRegistered("allow"))?;
                Ok(key_set
                    .group_key(group)
                    .map(|key| key.is_default())
                    .unwrap_or(false))
            }
        }
    }

    /// True iff any node requires term-sorted streaming input
    pub fn needs_sorted(&self) -> bool {
        match self {
            AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::Regex(_)
            | AggregateFilter::Constant(_)
            | AggregateFilter::IsDefaultGroup { .. } => false,
            AggregateFilter::Not(inner) => inner.needs_sorted(),
            AggregateFilter::And(children) | AggregateFilter::Or(children) => {
                children.iter().any(|c| c.needs_sorted())
            }
            AggregateFilter::MetricCompare { left, right, .. } => {
                left.needs_sorted() || right.needs_sorted()
            }
        }
    }

    /// True iff any node reads the group argument
    pub fn needs_group(&self) -> bool {
        match self {
            AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::Regex(_)
            | AggregateFilter::Constant(_) => false,
            AggregateFilter::IsDefaultGroup { .. } => true,
            AggregateFilter::Not(inner) => inner.needs_group(),
            AggregateFilter::And(children) | AggregateFilter::Or(children) => {
                children.iter().any(|c| c.needs_group())
            }
            AggregateFilter::MetricCompare { left, right, .. } => {
                left.needs_group() || right.needs_group()
            }
        }
    }

    /// True iff any node reads the stats argument
    pub fn needs_stats(&self) -> bool {
        match self {
            AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::Regex(_)
            | AggregateFilter::Constant(_)
            | AggregateFilter::IsDefaultGroup { .. } => false,
            AggregateFilter::Not(inner) => inner.needs_stats(),
            AggregateFilter::And(children) | AggregateFilter::Or(children) => {
                children.iter().any(|c| c.needs_stats())
            }
            AggregateFilter::MetricCompare { left, right, .. } => {
                left.needs_stats() || right.needs_stats()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groupkeys::sets::{EmptyGroupKeySet, StringTermGroupKeySet};
    use std::sync::Arc;

    #[test]
    fn test_term_equals() {
        let mut filter = AggregateFilter::term_equals("us");
        assert!(filter.allow(&Term::from("us"), &[], 1).unwrap());
        assert!(!filter.allow(&Term::from("uk"), &[], 1).unwrap());

        // int term against a stringy filter compares rendered forms
        let mut filter = AggregateFilter::term_equals("42");
        assert!(filter.allow(&Term::Int(42), &[], 1).unwrap());
    }

    #[test]
    fn test_term_regex() {
        let mut filter = AggregateFilter::term_regex("^a.*b$").unwrap();
        assert!(filter.allow(&Term::from("axxb"), &[], 1).unwrap());
        assert!(!filter.allow(&Term::from("bxxa"), &[], 1).unwrap());
        assert!(AggregateFilter::term_regex("[unclosed").is_err());
    }

    #[test]
    fn test_term_filters_reject_batch() {
        let mut filter = AggregateFilter::term_equals("us");
        assert!(matches!(
            filter.group_stats(&[], 2),
            Err(Error::Unsupported { mode: "batch", .. })
        ));
    }

    #[test]
    fn test_metric_compare_batch() {
        let mut filter = AggregateFilter::compare(
            CompareOp::Gt,
            AggregateMetric::per_group_constant(vec![0.0, 1.0, 5.0]),
            AggregateMetric::constant(2.0),
        );
        assert_eq!(
            filter.group_stats(&[], 2).unwrap(),
            vec![false, false, true]
        );
    }

    #[test]
    fn test_and_or_arity() {
        assert!(AggregateFilter::and(vec![AggregateFilter::Constant(true)]).is_err());
        assert!(AggregateFilter::or(vec![]).is_err());

        let mut filter = AggregateFilter::and(vec![
            AggregateFilter::Constant(true),
            AggregateFilter::Constant(false),
        ])
        .unwrap();
        assert!(!filter.allow(&Term::Int(0), &[], 1).unwrap());
    }

    #[test]
    fn test_is_default_group() {
        let key_set: GroupKeySetRef = Arc::new(
            StringTermGroupKeySet::new(
                Arc::new(EmptyGroupKeySet),
                vec!["".to_string(), "us".to_string(), "".to_string()],
                vec![0, 1, 1],
                Some(vec![false, false, true]),
            )
            .unwrap(),
        );
        let mut filter = AggregateFilter::is_default_group();
        filter.register(&HashMap::new(), &key_set).unwrap();
        assert_eq!(
            filter.group_stats(&[], 2).unwrap(),
            vec![false, false, true]
        );
        assert!(filter.allow(&Term::Int(0), &[], 2).unwrap());
    }
}

//! Aggregate metric expression trees
//!
//! An [`AggregateMetric`] is evaluated in one of two modes that must agree
//! on every group:
//!
//! - **batch**: [`AggregateMetric::group_stats`] consumes dense per-group
//!   stats arrays fetched from the remote store
//! - **streaming**: [`AggregateMetric::apply`] is invoked once per
//!   (term, group) pair during a sorted remote iteration
//!
//! Some combinators exist in only one mode. Metrics that are inherently
//! sequential over sorted terms (per-term lag) reject the batch path, and
//! sibling sums reject the streaming path; both signal
//! [`Error::Unsupported`]. A tree must be bound with
//! [`AggregateMetric::register`] exactly once before either evaluation
//! method runs. Trees are single-query objects and are not reusable.

mod document_level;
mod lag;
mod running;
mod sum_children;
mod window;

pub use document_level::DocumentLevelMetric;
pub use lag::{IterateLag, ParentLag};
pub use running::Running;
pub use sum_children::SumChildren;
pub use window::Window;

use crate::error::{Error, Result};
use crate::filters::AggregateFilter;
use crate::groupkeys::sets::GroupKeySetRef;
use crate::types::{QualifiedPush, Term};
use std::collections::{HashMap, HashSet};

/// Pure single-operand arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Absolute value
    Abs,
    /// -1, 0, or 1 by sign
    Signum,
    /// Natural logarithm
    Log,
    /// Round up
    Ceil,
    /// Round down
    Floor,
    /// Round to nearest
    Round,
}

impl UnaryOp {
    fn eval(&self, value: f64) -> f64 {
        match self {
            UnaryOp::Abs => value.abs(),
            // f64::signum maps 0.0 to 1.0, which is not wanted here
            UnaryOp::Signum => {
                if value > 0.0 {
                    1.0
                } else if value < 0.0 {
                    -1.0
                } else {
                    value
                }
            }
            UnaryOp::Log => value.ln(),
            UnaryOp::Ceil => value.ceil(),
            UnaryOp::Floor => value.floor(),
            UnaryOp::Round => value.round(),
        }
    }
}

/// Pure two-operand arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Left plus right
    Add,
    /// Left minus right
    Subtract,
    /// Left times right
    Multiply,
    /// Left over right; x/0 follows IEEE 754
    Divide,
    /// Remainder
    Modulus,
    /// Left to the power of right
    Power,
    /// Smaller operand
    Min,
    /// Larger operand
    Max,
}

impl BinaryOp {
    fn eval(&self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Subtract => left - right,
            BinaryOp::Multiply => left * right,
            BinaryOp::Divide => left / right,
            BinaryOp::Modulus => left % right,
            BinaryOp::Power => left.powf(right),
            BinaryOp::Min => left.min(right),
            BinaryOp::Max => left.max(right),
        }
    }
}

/// A literal that varies by destination group
#[derive(Debug, Clone)]
pub struct PerGroupConstant {
    /// Per-group values indexed by group number, index 0 unused
    pub values: Vec<f64>,
}

/// A per-group literal with several values per group.
///
/// Expanded column-wise by the driver into one output column per value;
/// neither evaluation path can produce a single scalar for it.
#[derive(Debug, Clone)]
pub struct MultiPerGroupConstant {
    /// Per-group value lists indexed by group number, index 0 unused
    pub values: Vec<Vec<f64>>,
}

/// Conditional selection between two metrics
#[derive(Debug)]
pub struct IfThenElse {
    /// Selecting condition
    pub condition: AggregateFilter,
    /// Result where the condition holds
    pub true_case: AggregateMetric,
    /// Result where it does not
    pub false_case: AggregateMetric,
}

/// One node of an aggregate metric expression tree
#[derive(Debug)]
pub enum AggregateMetric {
    /// Remote-computed statistic
    DocStats(DocumentLevelMetric),
    /// Fixed literal
    Constant(f64),
    /// Literal varying by group
    PerGroupConstant(PerGroupConstant),
    /// Multi-valued literal varying by group, driver-expanded
    MultiPerGroupConstant(MultiPerGroupConstant),
    /// Single-operand arithmetic
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand subtree
        operand: Box<AggregateMetric>,
    },
    /// Two-operand arithmetic
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left subtree
        left: Box<AggregateMetric>,
        /// Right subtree
        right: Box<AggregateMetric>,
    },
    /// Rolling sum over adjacent sibling groups
    Window(Window),
    /// Cumulative sum reset at ancestor boundaries
    Running(Running),
    /// Value from earlier iteration steps, per group
    IterateLag(IterateLag),
    /// Value from earlier sibling groups
    ParentLag(ParentLag),
    /// Sum over sibling groups
    SumChildren(SumChildren),
    /// Conditional selection
    IfThenElse(Box<IfThenElse>),
}

impl AggregateMetric {
    /// Remote statistic leaf
    pub fn doc_stats(push: QualifiedPush) -> Self {
        AggregateMetric::DocStats(DocumentLevelMetric::new(push))
    }

    /// Fixed literal leaf
    pub fn constant(value: f64) -> Self {
        AggregateMetric::Constant(value)
    }

    /// Per-group literal leaf
    pub fn per_group_constant(values: Vec<f64>) -> Self {
        AggregateMetric::PerGroupConstant(PerGroupConstant { values })
    }

    /// Single-operand arithmetic node
    pub fn unary(op: UnaryOp, operand: AggregateMetric) -> Self {
        AggregateMetric::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Two-operand arithmetic node
    pub fn binary(op: BinaryOp, left: AggregateMetric, right: AggregateMetric) -> Self {
        AggregateMetric::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Sum node
    pub fn add(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    /// Quotient node
    pub fn divide(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Divide, left, right)
    }

    /// Conditional node
    pub fn if_then_else(
        condition: AggregateFilter,
        true_case: AggregateMetric,
        false_case: AggregateMetric,
    ) -> Self {
        AggregateMetric::IfThenElse(Box::new(IfThenElse {
            condition,
            true_case,
            false_case,
        }))
    }

    /// The remote statistics this tree needs, as the union over all leaves
    pub fn requires(&self) -> HashSet<QualifiedPush> {
        let mut out = HashSet::new();
        self.collect_requires(&mut out);
        out
    }

    pub(crate) fn collect_requires(&self, out: &mut HashSet<QualifiedPush>) {
        match self {
            AggregateMetric::DocStats(doc) => doc.requires(out),
            AggregateMetric::Constant(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => {}
            AggregateMetric::Unary { operand, .. } => operand.collect_requires(out),
            AggregateMetric::Binary { left, right, .. } => {
                left.collect_requires(out);
                right.collect_requires(out);
            }
            AggregateMetric::Window(m) => m.inner().collect_requires(out),
            AggregateMetric::Running(m) => m.inner().collect_requires(out),
            AggregateMetric::IterateLag(m) => m.inner().collect_requires(out),
            AggregateMetric::ParentLag(m) => m.inner().collect_requires(out),
            AggregateMetric::SumChildren(m) => m.inner().collect_requires(out),
            AggregateMetric::IfThenElse(node) => {
                node.condition.collect_requires(out);
                node.true_case.collect_requires(out);
                node.false_case.collect_requires(out);
            }
        }
    }

    /// Bind every leaf to its stats-array column and capture the active
    /// grouping. Must be called exactly once before either evaluation
    /// method; stateful nodes allocate their accumulators here, so a second
    /// call discards in-flight state.
    pub fn register(
        &mut self,
        metric_indexes: &HashMap<QualifiedPush, usize>,
        key_set: &GroupKeySetRef,
    ) -> Result<()> {
        match self {
            AggregateMetric::DocStats(doc) => doc.register(metric_indexes),
            AggregateMetric::Constant(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => Ok(()),
            AggregateMetric::Unary { operand, .. } => operand.register(metric_indexes, key_set),
            AggregateMetric::Binary { left, right, .. } => {
                left.register(metric_indexes, key_set)?;
                right.register(metric_indexes, key_set)
            }
            AggregateMetric::Window(m) => {
                m.inner_mut().register(metric_indexes, key_set)?;
                m.bind(key_set);
                Ok(())
            }
            AggregateMetric::Running(m) => {
                m.inner_mut().register(metric_indexes, key_set)?;
                m.bind(key_set);
                Ok(())
            }
            AggregateMetric::IterateLag(m) => m.inner_mut().register(metric_indexes, key_set),
            AggregateMetric::ParentLag(m) => {
                m.inner_mut().register(metric_indexes, key_set)?;
                m.bind(key_set);
                Ok(())
            }
            AggregateMetric::SumChildren(m) => {
                m.inner_mut().register(metric_indexes, key_set)?;
                m.bind(key_set);
                Ok(())
            }
            AggregateMetric::IfThenElse(node) => {
                node.condition.register(metric_indexes, key_set)?;
                node.true_case.register(metric_indexes, key_set)?;
                node.false_case.register(metric_indexes, key_set)
            }
        }
    }

    /// Batch evaluation over dense per-group stats arrays.
    ///
    /// Returns an array of length `num_groups + 1` indexed by group number,
    /// index 0 unused.
    pub fn group_stats(&mut self, stats: &[Vec<i64>], num_groups: usize) -> Result<Vec<f64>> {
        match self {
            AggregateMetric::DocStats(doc) => doc.group_stats(stats, num_groups),
            AggregateMetric::Constant(value) => Ok(vec![*value; num_groups + 1]),
            AggregateMetric::PerGroupConstant(constant) => {
                let mut result = constant.values.clone();
                result.resize(num_groups + 1, 0.0);
                Ok(result)
            }
            AggregateMetric::MultiPerGroupConstant(_) => Err(Error::Unsupported {
                what: "multi-valued per-group constant",
                mode: "batch",
            }),
            AggregateMetric::Unary { op, operand } => {
                let mut result = operand.group_stats(stats, num_groups)?;
                for value in result.iter_mut().skip(1) {
                    *value = op.eval(*value);
                }
                Ok(result)
            }
            AggregateMetric::Binary { op, left, right } => {
                let mut result = left.group_stats(stats, num_groups)?;
                let right = right.group_stats(stats, num_groups)?;
                for (value, r) in result.iter_mut().zip(right).skip(1) {
                    *value = op.eval(*value, r);
                }
                Ok(result)
            }
            AggregateMetric::Window(m) => m.group_stats(stats, num_groups),
            AggregateMetric::Running(m) => m.group_stats(stats, num_groups),
            AggregateMetric::IterateLag(_) => Err(Error::Unsupported {
                what: "per-term lag",
                mode: "batch",
            }),
            AggregateMetric::ParentLag(m) => m.group_stats(stats, num_groups),
            AggregateMetric::SumChildren(m) => m.group_stats(stats, num_groups),
            AggregateMetric::IfThenElse(node) => {
                let selected = node.condition.group_stats(stats, num_groups)?;
                let when_true = node.true_case.group_stats(stats, num_groups)?;
                let when_false = node.false_case.group_stats(stats, num_groups)?;
                let mut result = vec![0.0; num_groups + 1];
                for group in 1..=num_groups {
                    result[group] = if selected[group] {
                        when_true[group]
                    } else {
                        when_false[group]
                    };
                }
                Ok(result)
            }
        }
    }

    /// Streaming evaluation, one call per (term, group) pair.
    ///
    /// Must be invoked in term-sorted order whenever [`needs_sorted`] is
    /// true. When [`needs_stats`] is false, `stats` may be empty; when
    /// [`needs_group`] is false, `group` may be arbitrary.
    ///
    /// [`needs_sorted`]: AggregateMetric::needs_sorted
    /// [`needs_stats`]: AggregateMetric::needs_stats
    /// [`needs_group`]: AggregateMetric::needs_group
    pub fn apply(&mut self, term: &Term, stats: &[i64], group: usize) -> Result<f64> {
        match self {
            AggregateMetric::DocStats(doc) => doc.apply(stats),
            AggregateMetric::Constant(value) => Ok(*value),
            AggregateMetric::PerGroupConstant(constant) => {
                constant.values.get(group).copied().ok_or_else(|| {
                    Error::internal(format!("group {} out of range for per-group constant", group))
                })
            }
            AggregateMetric::MultiPerGroupConstant(_) => Err(Error::Unsupported {
                what: "multi-valued per-group constant",
                mode: "streaming",
            }),
            AggregateMetric::Unary { op, operand } => Ok(op.eval(operand.apply(term, stats, group)?)),
            AggregateMetric::Binary { op, left, right } => Ok(op.eval(
                left.apply(term, stats, group)?,
                right.apply(term, stats, group)?,
            )),
            AggregateMetric::Window(m) => m.apply(term, stats, group),
            AggregateMetric::Running(m) => m.apply(term, stats, group),
            AggregateMetric::IterateLag(m) => m.apply(term, stats, group),
            AggregateMetric::ParentLag(m) => m.apply(term, stats, group),
            AggregateMetric::SumChildren(_) => Err(Error::Unsupported {
                what: "sibling sum",
                mode: "streaming",
            }),
            AggregateMetric::IfThenElse(node) => {
                if node.condition.allow(term, stats, group)? {
                    node.true_case.apply(term, stats, group)
                } else {
                    node.false_case.apply(term, stats, group)
                }
            }
        }
    }

    /// True iff any node requires term-sorted streaming input
    pub fn needs_sorted(&self) -> bool {
        match self {
            AggregateMetric::DocStats(_)
            | AggregateMetric::Constant(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => false,
            AggregateMetric::Unary { operand, .. } => operand.needs_sorted(),
            AggregateMetric::Binary { left, right, .. } => {
                left.needs_sorted() || right.needs_sorted()
            }
            AggregateMetric::Window(_)
            | AggregateMetric::IterateLag(_)
            | AggregateMetric::ParentLag(_) => true,
            AggregateMetric::Running(m) => m.inner().needs_sorted(),
            AggregateMetric::SumChildren(m) => m.inner().needs_sorted(),
            AggregateMetric::IfThenElse(node) => {
                node.condition.needs_sorted()
                    || node.true_case.needs_sorted()
                    || node.false_case.needs_sorted()
            }
        }
    }

    /// True iff any node reads the group argument
    pub fn needs_group(&self) -> bool {
        match self {
            AggregateMetric::DocStats(_) | AggregateMetric::Constant(_) => false,
            AggregateMetric::PerGroupConstant(_) | AggregateMetric::MultiPerGroupConstant(_) => {
                true
            }
            AggregateMetric::Unary { operand, .. } => operand.needs_group(),
            AggregateMetric::Binary { left, right, .. } => {
                left.needs_group() || right.needs_group()
            }
            AggregateMetric::Window(_)
            | AggregateMetric::Running(_)
            | AggregateMetric::IterateLag(_)
            | AggregateMetric::ParentLag(_)
            | AggregateMetric::SumChildren(_) => true,
            AggregateMetric::IfThenElse(node) => {
                node.condition.needs_group()
                    || node.true_case.needs_group()
                    || node.false_case.needs_group()
            }
        }
    }

    /// True iff any node reads the stats argument
    pub fn needs_stats(&self) -> bool {
        match self {
            AggregateMetric::DocStats(_) => true,
            AggregateMetric::Constant(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => false,
            AggregateMetric::Unary { operand, .. } => operand.needs_stats(),
            AggregateMetric::Binary { left, right, .. } => {
                left.needs_stats() || right.needs_stats()
            }
            AggregateMetric::Window(m) => m.inner().needs_stats(),
            AggregateMetric::Running(m) => m.inner().needs_stats(),
            AggregateMetric::IterateLag(m) => m.inner().needs_stats(),
            AggregateMetric::ParentLag(m) => m.inner().needs_stats(),
            AggregateMetric::SumChildren(m) => m.inner().needs_stats(),
            AggregateMetric::IfThenElse(node) => {
                node.condition.needs_stats()
                    || node.true_case.needs_stats()
                    || node.false_case.needs_stats()
            }
        }
    }
}

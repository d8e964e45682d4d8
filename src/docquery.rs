//! Document-level predicate trees
//!
//! A [`DocQuery`] describes a per-document predicate evaluated remotely by
//! the document store during a query regroup. The engine itself never scans
//! documents; it only builds, merges, validates, and serializes these trees.
//! A local [`DocQuery::matches`] evaluator is provided for EXPLAIN-style
//! debugging and for equivalence testing of the regroup optimizer.

use crate::schema::{DatasetsMetadata, ValidationLog};
use crate::types::Term;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Boolean connective for compound queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOp {
    /// All operands must match
    And,
    /// At least one operand must match
    Or,
    /// No operand may match
    Not,
}

/// A predicate over single documents, evaluated remotely during regroups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocQuery {
    /// Field equals the given term
    Term {
        /// Field name
        field: String,
        /// Term the field must contain
        term: Term,
    },
    /// Int field value in `[lower, upper)`
    Range {
        /// Field name
        field: String,
        /// Inclusive lower bound
        lower: i64,
        /// Exclusive upper bound
        upper: i64,
    },
    /// Boolean combination of sub-queries
    Boolean {
        /// Connective
        op: BooleanOp,
        /// Sub-queries
        operands: Vec<DocQuery>,
    },
}

impl DocQuery {
    /// Field-equals-term query
    pub fn term(field: impl Into<String>, term: impl Into<Term>) -> Self {
        DocQuery::Term {
            field: field.into(),
            term: term.into(),
        }
    }

    /// Combine two queries with a boolean connective
    pub fn boolean(op: BooleanOp, operands: Vec<DocQuery>) -> Self {
        DocQuery::Boolean { op, operands }
    }

    /// All field names referenced anywhere in the tree
    pub fn fields(&self) -> HashSet<&str> {
        let mut out = HashSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut HashSet<&'a str>) {
        match self {
            DocQuery::Term { field, .. } | DocQuery::Range { field, .. } => {
                out.insert(field.as_str());
            }
            DocQuery::Boolean { operands, .. } => {
                for operand in operands {
                    operand.collect_fields(out);
                }
            }
        }
    }

    /// Check the query against a dataset's schema, appending problems to the
    /// log. Advisory only; the query is not modified.
    pub fn validate(&self, dataset: &str, metadata: &DatasetsMetadata, log: &mut ValidationLog) {
        match self {
            DocQuery::Term { field, term } => {
                if !metadata.contains_field(dataset, field) {
                    log.error(format!("dataset {} has no field {}", dataset, field));
                } else if let Term::String(s) = term {
                    let int_only = metadata.contains_int_field(dataset, field)
                        && !metadata.contains_string_field(dataset, field);
                    if int_only && s.parse::<i64>().is_err() {
                        log.error(format!(
                            "string term {:?} used against int field {}.{}",
                            s, dataset, field
                        ));
                    }
                }
            }
            DocQuery::Range { field, .. } => {
                if !metadata.contains_int_field(dataset, field) {
                    log.error(format!(
                        "range query requires int field, but {}.{} is not an int field",
                        dataset, field
                    ));
                }
            }
            DocQuery::Boolean { operands, .. } => {
                for operand in operands {
                    operand.validate(dataset, metadata, log);
                }
            }
        }
    }

    /// Evaluate the predicate against one document. Local mirror of the
    /// remote store's semantics; used for debugging and tests.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            DocQuery::Term { field, term } => match term {
                Term::Int(v) => doc.int_values(field).contains(v),
                Term::String(s) => doc.string_values(field).iter().any(|x| x == s),
            },
            DocQuery::Range { field, lower, upper } => doc
                .int_values(field)
                .iter()
                .any(|v| *lower <= *v && *v < *upper),
            DocQuery::Boolean { op, operands } => match op {
                BooleanOp::And => operands.iter().all(|q| q.matches(doc)),
                BooleanOp::Or => operands.iter().any(|q| q.matches(doc)),
                BooleanOp::Not => !operands.iter().any(|q| q.matches(doc)),
            },
        }
    }
}

/// A single document with multi-valued int and string fields
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Int field values keyed by field name
    pub int_fields: HashMap<String, Vec<i64>>,
    /// String field values keyed by field name
    pub string_fields: HashMap<String, Vec<String>>,
}

impl Document {
    /// Empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one int term to a field
    pub fn with_int(mut self, field: impl Into<String>, value: i64) -> Self {
        self.int_fields.entry(field.into()).or_default().push(value);
        self
    }

    /// Add one string term to a field
    pub fn with_string(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.string_fields
            .entry(field.into())
            .or_default()
            .push(value.into());
        self
    }

    fn int_values(&self, field: &str) -> &[i64] {
        self.int_fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn string_values(&self, field: &str) -> &[String] {
        self.string_fields
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

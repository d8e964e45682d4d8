//! Core data types used throughout the engine
//!
//! This module defines the fundamental data structures used across the system:
//!
//! # Key Types
//!
//! - **`QualifiedPush`**: identifier for one statistic computed by the remote
//!   document store (session name + ordered push instructions)
//! - **`Term`**: an int or string field term as produced by a sorted remote
//!   iteration
//! - **`TimeUnit`**: fixed-width time bucket sizes with their label formats
//!
//! Group numbers themselves are plain `usize` values: positive, dense within
//! one grouping level, with group 0 reserved to mean "discarded".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one scalar statistic computed by the remote store.
///
/// Two pushes are equal iff the session name and the push-instruction
/// sequence are equal element-wise; the derived `Eq`/`Hash` give exactly
/// that, so a `QualifiedPush` can be used as a map key when assigning
/// stat columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedPush {
    /// Logical session (dataset) name the stat is pushed on
    #[serde(rename = "sessionName")]
    pub session_name: String,
    /// Ordered push instructions understood by the remote store
    pub pushes: Vec<String>,
}

impl QualifiedPush {
    /// Create a new qualified push
    pub fn new(session_name: impl Into<String>, pushes: Vec<String>) -> Self {
        Self {
            session_name: session_name.into(),
            pushes,
        }
    }
}

/// A field term seen during a sorted remote iteration.
///
/// Remote fields are either integer-typed or string-typed; both kinds flow
/// through the same streaming evaluation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    /// Integer field term
    Int(i64),
    /// String field term
    String(String),
}

impl Term {
    /// True for integer terms
    pub fn is_int(&self) -> bool {
        matches!(self, Term::Int(_))
    }

    /// The term rendered as text (integers are stringified)
    pub fn render(&self) -> String {
        match self {
            Term::Int(v) => v.to_string(),
            Term::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Int(v) => write!(f, "{}", v),
            Term::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Int(value)
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::String(value.to_string())
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term::String(value)
    }
}

/// Fixed-width time bucket sizes used by time-range grouping.
///
/// Calendar-aligned periods (month, quarter, year) are not fixed-width and
/// are handled separately by the uneven-period group key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    /// One second buckets
    Second,
    /// One minute buckets
    Minute,
    /// One hour buckets
    Hour,
    /// One day buckets
    Day,
    /// One week buckets
    Week,
}

impl TimeUnit {
    /// Bucket width in milliseconds
    pub fn period_millis(&self) -> i64 {
        match self {
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60 * 1_000,
            TimeUnit::Hour => 60 * 60 * 1_000,
            TimeUnit::Day => 24 * 60 * 60 * 1_000,
            TimeUnit::Week => 7 * 24 * 60 * 60 * 1_000,
        }
    }

    /// chrono format string used for bucket labels of this width
    pub fn format_str(&self) -> &'static str {
        match self {
            TimeUnit::Second => "%Y-%m-%d %H:%M:%S",
            TimeUnit::Minute => "%Y-%m-%d %H:%M",
            TimeUnit::Hour => "%Y-%m-%d %H:00",
            TimeUnit::Day => "%Y-%m-%d",
            TimeUnit::Week => "%Y-%m-%d",
        }
    }
}

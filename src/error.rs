//! Error types for the engine
//!
//! All fallible operations in the crate return [`Result`]. Validation
//! problems (missing fields, bad regexes) are *not* represented here; they
//! are collected into a batched [`crate::schema::ValidationLog`] so that one
//! query reports every problem at once. The variants below are execution
//! errors: they abort the current query and are not retried.

use crate::types::QualifiedPush;
use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal error raised while evaluating a metric or filter
    #[error("execution error: {0}")]
    Execution(String),

    /// Operation invoked in an evaluation mode that cannot support it
    #[error("{what} is not supported in {mode} evaluation")]
    Unsupported {
        /// The metric or filter that was invoked
        what: &'static str,
        /// The evaluation mode ("batch" or "streaming")
        mode: &'static str,
    },

    /// A leaf metric was registered against an index map that does not
    /// contain its push. This is a programming error in the driver, not a
    /// user-facing condition.
    #[error("no metric index registered for {0:?}")]
    MissingMetricIndex(QualifiedPush),

    /// A data-consuming method was called before `register`
    #[error("register must be called before {0}")]
    NotRegistered(&'static str),

    /// Invalid argument passed to a constructor
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Regex pattern failed to compile
    #[error("invalid regex {pattern:?}")]
    InvalidRegex {
        /// The offending pattern
        pattern: String,
        /// Compiler error from the regex crate
        #[source]
        source: regex::Error,
    },

    /// A regroup would produce more groups than the configured limit
    #[error("regroup would produce {groups} groups, exceeding the limit of {limit}")]
    GroupLimitExceeded {
        /// Groups the regroup would produce
        groups: usize,
        /// Configured limit
        limit: usize,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation (bug, unexpected state)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution(message.into())
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display() {
        let err = Error::Unsupported {
            what: "window",
            mode: "batch",
        };
        assert_eq!(
            format!("{}", err),
            "window is not supported in batch evaluation"
        );
    }

    #[test]
    fn test_execution_display() {
        let err = Error::execution("window overlaps missing data");
        assert!(format!("{}", err).contains("window overlaps missing data"));
    }
}

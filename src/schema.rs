//! Dataset field metadata and batched validation
//!
//! Regroup actions and document queries are checked against a
//! [`DatasetsMetadata`] snapshot before anything is sent to the remote
//! store. Problems are collected into a [`ValidationLog`] rather than
//! returned one at a time, so a single pass reports everything wrong with
//! a query.

use std::collections::{HashMap, HashSet};

/// Field names of one dataset, split by type.
///
/// A field may appear in both sets; remote stores index some fields as
/// both int and string.
#[derive(Debug, Clone, Default)]
pub struct FieldTypes {
    /// Integer-typed field names
    pub int_fields: HashSet<String>,
    /// String-typed field names
    pub string_fields: HashSet<String>,
}

impl FieldTypes {
    /// Build from iterators of field names
    pub fn new<I, S, J, T>(int_fields: I, string_fields: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            int_fields: int_fields.into_iter().map(Into::into).collect(),
            string_fields: string_fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Field metadata for every dataset visible to a query
#[derive(Debug, Clone, Default)]
pub struct DatasetsMetadata {
    datasets: HashMap<String, FieldTypes>,
}

impl DatasetsMetadata {
    /// Empty metadata (every lookup misses)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one dataset's field types
    pub fn with_dataset(mut self, name: impl Into<String>, fields: FieldTypes) -> Self {
        self.datasets.insert(name.into(), fields);
        self
    }

    /// Field types of one dataset, if known
    pub fn dataset(&self, name: &str) -> Option<&FieldTypes> {
        self.datasets.get(name)
    }

    /// True if the dataset has the field with either type
    pub fn contains_field(&self, dataset: &str, field: &str) -> bool {
        self.contains_int_field(dataset, field) || self.contains_string_field(dataset, field)
    }

    /// True if the dataset has an int field with this name
    pub fn contains_int_field(&self, dataset: &str, field: &str) -> bool {
        self.datasets
            .get(dataset)
            .map(|f| f.int_fields.contains(field))
            .unwrap_or(false)
    }

    /// True if the dataset has a string field with this name
    pub fn contains_string_field(&self, dataset: &str, field: &str) -> bool {
        self.datasets
            .get(dataset)
            .map(|f| f.string_fields.contains(field))
            .unwrap_or(false)
    }
}

/// Accumulator for validation problems.
///
/// Errors mean the query must not run; warnings are passed through to the
/// user but do not block execution.
#[derive(Debug, Default)]
pub struct ValidationLog {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(error = %message, "validation error");
        self.errors.push(message);
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// All errors recorded so far
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// All warnings recorded so far
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// True if no errors were recorded
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> DatasetsMetadata {
        DatasetsMetadata::new().with_dataset(
            "jobsearch",
            FieldTypes::new(["clicks", "sji"], ["country", "sji"]),
        )
    }

    #[test]
    fn test_field_lookups() {
        let m = metadata();
        assert!(m.contains_int_field("jobsearch", "clicks"));
        assert!(!m.contains_string_field("jobsearch", "clicks"));
        assert!(m.contains_string_field("jobsearch", "country"));
        // a field can be both
        assert!(m.contains_int_field("jobsearch", "sji"));
        assert!(m.contains_string_field("jobsearch", "sji"));
        assert!(!m.contains_field("jobsearch", "missing"));
        assert!(!m.contains_field("unknown", "clicks"));
    }

    #[test]
    fn test_validation_log() {
        let mut log = ValidationLog::new();
        assert!(log.is_valid());
        log.warn("suspicious but fine");
        assert!(log.is_valid());
        log.error("broken");
        assert!(!log.is_valid());
        assert_eq!(log.errors().len(), 1);
        assert_eq!(log.warnings().len(), 1);
    }
}

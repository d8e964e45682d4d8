//! Regroup actions
//!
//! An [`Action`] is an immutable descriptor of one remote regroup: a
//! dataset scope, a predicate payload, and three group numbers. Rows of
//! `target` whose documents match the predicate move to `positive`, the
//! rest to `negative`. Actions are created by the command layer, optionally
//! merged by [`optimizer::optimize_consecutive_query_actions`], translated
//! exactly once into remote regroup rules, then discarded.
//!
//! The serde form doubles as the JSON command protocol sent to the
//! execution tier, so field names are a compatibility surface.

pub mod optimizer;

use crate::docquery::{BooleanOp, DocQuery};
use crate::filters::RegexFilter;
use crate::schema::{DatasetsMetadata, ValidationLog};
use crate::session::RegroupRule;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One remote regroup descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    /// Split by a per-dataset document query
    #[serde(rename = "queryAction")]
    Query(QueryAction),
    /// Split by a 0/1 filter metric given as per-dataset push lists
    #[serde(rename = "metricAction")]
    Metric(MetricAction),
    /// Split by membership in an explicit int term set
    #[serde(rename = "intOrAction")]
    IntOr(IntOrAction),
    /// Split by membership in an explicit string term set
    #[serde(rename = "stringOrAction")]
    StringOr(StringOrAction),
    /// Split by a term regex
    #[serde(rename = "regexAction")]
    Regex(RegexAction),
    /// Split by a salted per-document hash
    #[serde(rename = "sampleAction")]
    Sample(SampleAction),
    /// Move the target group unconditionally
    #[serde(rename = "unconditionalAction")]
    Unconditional(UnconditionalAction),
}

/// Split by a per-dataset document query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Query per dataset in scope
    #[serde(rename = "perDatasetQuery")]
    pub per_dataset_query: BTreeMap<String, DocQuery>,
    /// Group being split
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination for matching rows
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Destination for the rest
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

/// Split by a 0/1 filter metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Push-instruction list per dataset, evaluating to 0 or 1 per document
    #[serde(rename = "perDatasetFilter")]
    pub per_dataset_filter: BTreeMap<String, Vec<String>>,
    /// Group being split
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination for matching rows
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Destination for the rest
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

/// Split by membership in an explicit int term set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntOrAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Field holding the terms
    pub field: String,
    /// Matching terms; kept sorted
    pub terms: BTreeSet<i64>,
    /// Group being split
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination for matching rows
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Destination for the rest
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

/// Split by membership in an explicit string term set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringOrAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Field holding the terms
    pub field: String,
    /// Matching terms
    pub terms: BTreeSet<String>,
    /// Group being split
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination for matching rows
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Destination for the rest
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

/// Split by a term regex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Field matched against the pattern
    pub field: String,
    /// Pattern text; compiled remotely, checked locally during validation
    pub regex: String,
    /// Group being split
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination for matching rows
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Destination for the rest
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

/// Split by a salted per-document hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Field whose terms are hashed
    pub field: String,
    /// Fraction of documents kept in the positive group
    pub probability: f64,
    /// Hash salt, making the split reproducible
    pub seed: String,
    /// Group being split
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination for sampled rows
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Destination for the rest
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

/// Move every row of the target group unconditionally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnconditionalAction {
    /// Datasets the action applies to
    pub scope: BTreeSet<String>,
    /// Group being moved
    #[serde(rename = "target")]
    pub target_group: usize,
    /// Destination group
    #[serde(rename = "positive")]
    pub positive_group: usize,
    /// Unused; kept for protocol uniformity
    #[serde(rename = "negative")]
    pub negative_group: usize,
}

impl Action {
    /// Datasets the action applies to
    pub fn scope(&self) -> &BTreeSet<String> {
        match self {
            Action::Query(a) => &a.scope,
            Action::Metric(a) => &a.scope,
            Action::IntOr(a) => &a.scope,
            Action::StringOr(a) => &a.scope,
            Action::Regex(a) => &a.scope,
            Action::Sample(a) => &a.scope,
            Action::Unconditional(a) => &a.scope,
        }
    }

    /// Check the action against dataset schemas, collecting problems into
    /// the log. Advisory; never mutates the action.
    pub fn validate(&self, metadata: &DatasetsMetadata, log: &mut ValidationLog) {
        for dataset in self.scope() {
            if metadata.dataset(dataset).is_none() {
                log.error(format!("unknown dataset {}", dataset));
            }
        }
        match self {
            Action::Query(a) => {
                for (dataset, query) in &a.per_dataset_query {
                    query.validate(dataset, metadata, log);
                }
                for dataset in &a.scope {
                    if !a.per_dataset_query.contains_key(dataset) {
                        log.error(format!("query action has no query for dataset {}", dataset));
                    }
                }
            }
            Action::Metric(a) => {
                for dataset in &a.scope {
                    if !a.per_dataset_filter.contains_key(dataset) {
                        log.error(format!(
                            "metric action has no filter pushes for dataset {}",
                            dataset
                        ));
                    }
                }
            }
            Action::IntOr(a) => {
                for dataset in &a.scope {
                    if metadata.dataset(dataset).is_some()
                        && !metadata.contains_field(dataset, &a.field)
                    {
                        log.error(format!("dataset {} has no field {}", dataset, a.field));
                    }
                }
            }
            Action::StringOr(a) => {
                for dataset in &a.scope {
                    if metadata.dataset(dataset).is_some()
                        && !metadata.contains_string_field(dataset, &a.field)
                    {
                        log.error(format!(
                            "dataset {} has no string field {}",
                            dataset, a.field
                        ));
                    }
                }
            }
            Action::Regex(a) => {
                if let Err(e) = RegexFilter::new(a.regex.clone()) {
                    log.error(e.to_string());
                }
                for dataset in &a.scope {
                    if metadata.dataset(dataset).is_some()
                        && !metadata.contains_string_field(dataset, &a.field)
                    {
                        log.error(format!(
                            "dataset {} has no string field {}",
                            dataset, a.field
                        ));
                    }
                }
            }
            Action::Sample(a) => {
                if !(0.0..=1.0).contains(&a.probability) {
                    log.error(format!(
                        "sample probability {} is outside [0, 1]",
                        a.probability
                    ));
                }
                for dataset in &a.scope {
                    if metadata.dataset(dataset).is_some()
                        && !metadata.contains_field(dataset, &a.field)
                    {
                        log.error(format!("dataset {} has no field {}", dataset, a.field));
                    }
                }
            }
            Action::Unconditional(_) => {}
        }
    }

    /// Translate into remote regroup rules.
    ///
    /// This is where schema knowledge is applied: an int term set against a
    /// field that is not int-typed in every scoped dataset is issued as a
    /// string-term-set regroup over the stringified terms instead.
    pub fn to_regroup_rules(&self, metadata: &DatasetsMetadata) -> Vec<RegroupRule> {
        match self {
            Action::Query(a) => vec![RegroupRule::Query {
                per_dataset_query: a.per_dataset_query.clone(),
                target_group: a.target_group,
                positive_group: a.positive_group,
                negative_group: a.negative_group,
            }],
            Action::Metric(a) => vec![RegroupRule::MetricFilter {
                per_dataset_pushes: a.per_dataset_filter.clone(),
                target_group: a.target_group,
                positive_group: a.positive_group,
                negative_group: a.negative_group,
            }],
            Action::IntOr(a) => {
                let int_everywhere = a
                    .scope
                    .iter()
                    .all(|dataset| metadata.contains_int_field(dataset, &a.field));
                if int_everywhere {
                    vec![RegroupRule::IntTermSet {
                        scope: a.scope.clone(),
                        field: a.field.clone(),
                        terms: a.terms.iter().copied().collect(),
                        target_group: a.target_group,
                        positive_group: a.positive_group,
                        negative_group: a.negative_group,
                    }]
                } else {
                    vec![RegroupRule::StringTermSet {
                        scope: a.scope.clone(),
                        field: a.field.clone(),
                        terms: a.terms.iter().map(|t| t.to_string()).collect(),
                        target_group: a.target_group,
                        positive_group: a.positive_group,
                        negative_group: a.negative_group,
                    }]
                }
            }
            Action::StringOr(a) => vec![RegroupRule::StringTermSet {
                scope: a.scope.clone(),
                field: a.field.clone(),
                terms: a.terms.iter().cloned().collect(),
                target_group: a.target_group,
                positive_group: a.positive_group,
                negative_group: a.negative_group,
            }],
            Action::Regex(a) => vec![RegroupRule::Regex {
                scope: a.scope.clone(),
                field: a.field.clone(),
                regex: a.regex.clone(),
                target_group: a.target_group,
                positive_group: a.positive_group,
                negative_group: a.negative_group,
            }],
            Action::Sample(a) => vec![RegroupRule::Sample {
                scope: a.scope.clone(),
                field: a.field.clone(),
                probability: a.probability,
                seed: a.seed.clone(),
                target_group: a.target_group,
                positive_group: a.positive_group,
                negative_group: a.negative_group,
            }],
            Action::Unconditional(a) => vec![RegroupRule::Unconditional {
                scope: a.scope.clone(),
                from_groups: vec![a.target_group],
                to_group: a.positive_group,
            }],
        }
    }
}

impl QueryAction {
    /// Query action with the same query applied to every dataset in scope
    pub fn uniform(
        scope: BTreeSet<String>,
        query: DocQuery,
        target_group: usize,
        positive_group: usize,
        negative_group: usize,
    ) -> Self {
        let per_dataset_query = scope
            .iter()
            .map(|dataset| (dataset.clone(), query.clone()))
            .collect();
        Self {
            scope,
            per_dataset_query,
            target_group,
            positive_group,
            negative_group,
        }
    }

    pub(crate) fn merge_queries(&self, other: &QueryAction, op: BooleanOp) -> QueryAction {
        let per_dataset_query = other
            .scope
            .iter()
            .map(|dataset| {
                let operands = [
                    self.per_dataset_query.get(dataset),
                    other.per_dataset_query.get(dataset),
                ]
                .into_iter()
                .flatten()
                .cloned()
                .collect();
                (dataset.clone(), DocQuery::boolean(op, operands))
            })
            .collect();
        QueryAction {
            scope: other.scope.clone(),
            per_dataset_query,
            target_group: other.target_group,
            positive_group: other.positive_group,
            negative_group: other.negative_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldTypes;

    fn scope() -> BTreeSet<String> {
        ["jobsearch".to_string()].into_iter().collect()
    }

    fn metadata() -> DatasetsMetadata {
        DatasetsMetadata::new().with_dataset(
            "jobsearch",
            FieldTypes::new(["clicks"], ["country"]),
        )
    }

    #[test]
    fn test_serde_protocol_shape() {
        let action = Action::Query(QueryAction::uniform(
            scope(),
            DocQuery::term("country", "us"),
            1,
            1,
            0,
        ));
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "queryAction");
        assert_eq!(json["target"], 1);
        assert_eq!(json["positive"], 1);
        assert_eq!(json["negative"], 0);
        assert_eq!(json["perDatasetQuery"]["jobsearch"]["field"], "country");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_round_trip_preserves_translation() {
        let action = Action::IntOr(IntOrAction {
            scope: scope(),
            field: "clicks".to_string(),
            terms: [3, 1, 2].into_iter().collect(),
            target_group: 1,
            positive_group: 2,
            negative_group: 1,
        });
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        let metadata = metadata();
        assert_eq!(
            back.to_regroup_rules(&metadata),
            action.to_regroup_rules(&metadata)
        );
    }

    #[test]
    fn test_int_or_translation() {
        let metadata = metadata();
        let action = Action::IntOr(IntOrAction {
            scope: scope(),
            field: "clicks".to_string(),
            terms: [3, 1, 2].into_iter().collect(),
            target_group: 1,
            positive_group: 2,
            negative_group: 1,
        });
        match &action.to_regroup_rules(&metadata)[..] {
            [RegroupRule::IntTermSet { terms, .. }] => assert_eq!(terms, &vec![1, 2, 3]),
            other => panic!("unexpected rules: {:?}", other),
        }

        // field is not int-typed: falls back to stringified terms
        let action = Action::IntOr(IntOrAction {
            scope: scope(),
            field: "country".to_string(),
            terms: [440, 44].into_iter().collect(),
            target_group: 1,
            positive_group: 2,
            negative_group: 1,
        });
        match &action.to_regroup_rules(&metadata)[..] {
            [RegroupRule::StringTermSet { terms, .. }] => {
                assert_eq!(terms, &vec!["44".to_string(), "440".to_string()]);
            }
            other => panic!("unexpected rules: {:?}", other),
        }
    }

    #[test]
    fn test_validation_is_batched() {
        let metadata = metadata();
        let mut log = ValidationLog::new();
        Action::Regex(RegexAction {
            scope: scope(),
            field: "missing".to_string(),
            regex: "[unclosed".to_string(),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        })
        .validate(&metadata, &mut log);
        // both the bad pattern and the bad field are reported at once
        assert_eq!(log.errors().len(), 2);
    }

    #[test]
    fn test_sample_probability_validation() {
        let mut log = ValidationLog::new();
        Action::Sample(SampleAction {
            scope: scope(),
            field: "clicks".to_string(),
            probability: 1.5,
            seed: "salt".to_string(),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        })
        .validate(&metadata(), &mut log);
        assert!(!log.is_valid());
    }
}

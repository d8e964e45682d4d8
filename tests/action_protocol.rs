//! Action serialization, validation, and optimizer replay equivalence

use regroup_engine::actions::{
    optimizer::optimize_consecutive_query_actions, Action, IntOrAction, QueryAction, RegexAction,
    SampleAction, StringOrAction, UnconditionalAction,
};
use regroup_engine::docquery::{BooleanOp, DocQuery, Document};
use regroup_engine::schema::{DatasetsMetadata, FieldTypes, ValidationLog};
use std::collections::{BTreeMap, BTreeSet};

fn scope() -> BTreeSet<String> {
    ["jobsearch".to_string()].into_iter().collect()
}

fn metadata() -> DatasetsMetadata {
    DatasetsMetadata::new().with_dataset(
        "jobsearch",
        FieldTypes::new(["clicks", "ctkrcvd"], ["country", "q"]),
    )
}

fn query_action(query: DocQuery, target: usize, positive: usize, negative: usize) -> Action {
    Action::Query(QueryAction::uniform(scope(), query, target, positive, negative))
}

/// Reference group-state simulator: documents carry a current group; each
/// query action reassigns documents of the target group by predicate.
fn replay(actions: &[Action], docs: &[(Document, usize)]) -> Vec<usize> {
    let mut groups: Vec<usize> = docs.iter().map(|(_, g)| *g).collect();
    for action in actions {
        let Action::Query(query_action) = action else {
            panic!("simulator only handles query actions");
        };
        let query = &query_action.per_dataset_query["jobsearch"];
        for ((doc, _), group) in docs.iter().zip(groups.iter_mut()) {
            if *group == query_action.target_group {
                *group = if query.matches(doc) {
                    query_action.positive_group
                } else {
                    query_action.negative_group
                };
            }
        }
    }
    groups
}

fn sample_docs() -> Vec<(Document, usize)> {
    let countries = ["us", "uk", "jp", "de", "fr"];
    countries
        .iter()
        .enumerate()
        .flat_map(|(i, country)| {
            (0..3).map(move |clicks| {
                (
                    Document::new()
                        .with_string("country", *country)
                        .with_int("clicks", clicks + i as i64),
                    1usize,
                )
            })
        })
        .collect()
}

#[test]
fn test_or_merge_replay_equivalence() {
    let original = vec![
        query_action(DocQuery::term("country", "us"), 1, 2, 1),
        query_action(DocQuery::term("country", "uk"), 1, 2, 1),
    ];
    let optimized = optimize_consecutive_query_actions(original.clone());
    assert_eq!(optimized.len(), 1);

    let docs = sample_docs();
    assert_eq!(replay(&original, &docs), replay(&optimized, &docs));
}

#[test]
fn test_and_merge_replay_equivalence() {
    let original = vec![
        query_action(DocQuery::term("country", "us"), 1, 1, 0),
        query_action(
            DocQuery::Range {
                field: "clicks".to_string(),
                lower: 1,
                upper: 3,
            },
            1,
            1,
            0,
        ),
    ];
    let optimized = optimize_consecutive_query_actions(original.clone());
    assert_eq!(optimized.len(), 1);

    let docs = sample_docs();
    assert_eq!(replay(&original, &docs), replay(&optimized, &docs));
}

#[test]
fn test_unmergeable_sequence_is_untouched() {
    let original = vec![
        query_action(DocQuery::term("country", "us"), 1, 2, 3),
        query_action(DocQuery::term("country", "uk"), 3, 4, 5),
    ];
    let optimized = optimize_consecutive_query_actions(original.clone());
    assert_eq!(optimized, original);
}

#[test]
fn test_optimizer_output_never_longer() {
    let actions = vec![
        query_action(DocQuery::term("country", "us"), 1, 1, 0),
        query_action(DocQuery::term("country", "uk"), 1, 1, 0),
        query_action(DocQuery::term("country", "jp"), 1, 2, 1),
        query_action(DocQuery::term("country", "de"), 1, 2, 1),
        query_action(DocQuery::term("country", "fr"), 2, 3, 4),
    ];
    let input_len = actions.len();
    let optimized = optimize_consecutive_query_actions(actions);
    assert!(optimized.len() <= input_len);
    assert_eq!(optimized.len(), 3);
}

#[test]
fn test_every_variant_round_trips() {
    let actions = vec![
        query_action(
            DocQuery::boolean(
                BooleanOp::Or,
                vec![
                    DocQuery::term("country", "us"),
                    DocQuery::term("clicks", 3),
                ],
            ),
            1,
            1,
            0,
        ),
        Action::Metric(regroup_engine::actions::MetricAction {
            scope: scope(),
            per_dataset_filter: BTreeMap::from([(
                "jobsearch".to_string(),
                vec!["clicks".to_string(), "1".to_string(), ">=".to_string()],
            )]),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        }),
        Action::IntOr(IntOrAction {
            scope: scope(),
            field: "clicks".to_string(),
            terms: [5, 1].into_iter().collect(),
            target_group: 1,
            positive_group: 2,
            negative_group: 1,
        }),
        Action::StringOr(StringOrAction {
            scope: scope(),
            field: "country".to_string(),
            terms: ["us".to_string(), "uk".to_string()].into_iter().collect(),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        }),
        Action::Regex(RegexAction {
            scope: scope(),
            field: "q".to_string(),
            regex: "^eng.*".to_string(),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        }),
        Action::Sample(SampleAction {
            scope: scope(),
            field: "q".to_string(),
            probability: 0.1,
            seed: "salt".to_string(),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        }),
        Action::Unconditional(UnconditionalAction {
            scope: scope(),
            target_group: 2,
            positive_group: 1,
            negative_group: 0,
        }),
    ];

    let metadata = metadata();
    for action in actions {
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action, "round trip changed {}", json);
        assert_eq!(
            back.to_regroup_rules(&metadata),
            action.to_regroup_rules(&metadata),
            "translation changed after round trip"
        );
    }
}

#[test]
fn test_protocol_tags() {
    let cases = vec![
        (
            serde_json::to_value(query_action(DocQuery::term("country", "us"), 1, 1, 0)).unwrap(),
            "queryAction",
        ),
        (
            serde_json::to_value(Action::Unconditional(UnconditionalAction {
                scope: scope(),
                target_group: 1,
                positive_group: 2,
                negative_group: 0,
            }))
            .unwrap(),
            "unconditionalAction",
        ),
    ];
    for (json, tag) in cases {
        assert_eq!(json["action"], tag);
        assert!(json.get("target").is_some());
        assert!(json.get("positive").is_some());
        assert!(json.get("negative").is_some());
    }
}

#[test]
fn test_validation_collects_all_problems() {
    let metadata = metadata();
    let mut log = ValidationLog::new();
    let actions = vec![
        query_action(DocQuery::term("nofield", "x"), 1, 1, 0),
        Action::Regex(RegexAction {
            scope: scope(),
            field: "country".to_string(),
            regex: "(bad".to_string(),
            target_group: 1,
            positive_group: 1,
            negative_group: 0,
        }),
    ];
    for action in &actions {
        action.validate(&metadata, &mut log);
    }
    assert_eq!(log.errors().len(), 2);
}

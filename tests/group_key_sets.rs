//! Structural properties of group key set chains

use regroup_engine::groupkeys::sets::{
    parents, DateTimeRangeGroupKeySet, DayOfWeekGroupKeySet, DumbGroupKeySet, EmptyGroupKeySet,
    GroupKeySet, GroupKeySetRef, MetricRangeGroupKeySet, RandomGroupKeySet,
    SessionNameGroupKeySet, StringTermGroupKeySet, UnevenPeriod, UnevenPeriodGroupKeySet,
};
use regroup_engine::groupkeys::GroupKey;
use regroup_engine::types::TimeUnit;
use std::sync::Arc;

fn five_int_terms() -> GroupKeySetRef {
    Arc::new(
        DumbGroupKeySet::new(
            Arc::new(EmptyGroupKeySet),
            vec![0, 1, 1, 1, 1, 1],
            (0..6)
                .map(|i| if i == 0 { None } else { Some(GroupKey::IntTerm(i)) })
                .collect(),
        )
        .unwrap(),
    )
}

/// Every fixed-fan-out variant multiplies the previous level's group count.
#[test]
fn test_group_count_multiplicativity() {
    let previous = five_int_terms();

    let day_of_week = DayOfWeekGroupKeySet::new(previous.clone());
    assert_eq!(day_of_week.num_groups(), previous.num_groups() * 7);

    let metric_range =
        MetricRangeGroupKeySet::new(previous.clone(), 7, false, 0, 2, false, false, 35);
    assert_eq!(metric_range.num_groups(), previous.num_groups() * 7);

    let time_range = DateTimeRangeGroupKeySet::new(
        previous.clone(),
        0,
        TimeUnit::Hour.period_millis(),
        24,
        120,
        TimeUnit::Hour.format_str(),
    );
    assert_eq!(time_range.num_groups(), previous.num_groups() * 24);

    let months = UnevenPeriodGroupKeySet::new(
        previous.clone(),
        12,
        2015,
        2,
        UnevenPeriod::Month,
        "%Y-%m-%d",
    );
    assert_eq!(months.num_groups(), previous.num_groups() * 12);

    let sessions = SessionNameGroupKeySet::new(
        previous.clone(),
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
    );
    assert_eq!(sessions.num_groups(), previous.num_groups() * 3);

    let random = RandomGroupKeySet::new(previous.clone(), 11);
    assert_eq!(random.num_groups(), previous.num_groups() * 11);
}

/// Parents are always valid group numbers of the previous level.
#[test]
fn test_parent_monotonicity() {
    let previous = five_int_terms();
    let key_sets: Vec<Box<dyn GroupKeySet>> = vec![
        Box::new(DayOfWeekGroupKeySet::new(previous.clone())),
        Box::new(MetricRangeGroupKeySet::new(
            previous.clone(),
            7,
            false,
            0,
            2,
            false,
            false,
            35,
        )),
        Box::new(DateTimeRangeGroupKeySet::new(
            previous.clone(),
            0,
            TimeUnit::Day.period_millis(),
            30,
            150,
            TimeUnit::Day.format_str(),
        )),
        Box::new(RandomGroupKeySet::new(previous.clone(), 4)),
    ];
    for key_set in &key_sets {
        for group in 1..=key_set.num_groups() {
            let parent = key_set.parent_group(group);
            assert!(parent >= 1, "group {} has parent {}", group, parent);
            assert!(parent <= previous.num_groups());
        }
    }
}

/// A missing parent makes every descendant absent, transitively.
#[test]
fn test_is_present_propagation() {
    // middle level has a hole at group 2 (no key)
    let middle: GroupKeySetRef = Arc::new(
        DumbGroupKeySet::new(
            Arc::new(EmptyGroupKeySet),
            vec![0, 1, 1, 1],
            vec![
                None,
                Some(GroupKey::IntTerm(1)),
                None,
                Some(GroupKey::IntTerm(3)),
            ],
        )
        .unwrap(),
    );
    assert!(middle.is_present(1));
    assert!(!middle.is_present(2));

    let leaf = DayOfWeekGroupKeySet::new(middle);
    for inner in 1..=7 {
        assert!(leaf.is_present(inner));
        assert!(!leaf.is_present(7 + inner), "parent 2 is absent");
        assert!(leaf.is_present(14 + inner));
    }
}

#[test]
fn test_parents_array() {
    let key_set = DayOfWeekGroupKeySet::new(five_int_terms());
    let parents = parents(&key_set);
    assert_eq!(parents.len(), key_set.num_groups() + 1);
    assert_eq!(parents[0], 0);
    for group in 1..=key_set.num_groups() {
        assert_eq!(parents[group], key_set.parent_group(group));
    }
}

#[test]
fn test_term_default_bucket_keys() {
    let key_set = StringTermGroupKeySet::new(
        five_int_terms(),
        vec![
            "".to_string(),
            "engineer".to_string(),
            "nurse".to_string(),
            "".to_string(),
        ],
        vec![0, 1, 1, 2],
        Some(vec![false, false, false, true]),
    )
    .unwrap();
    assert_eq!(
        key_set.group_key(1),
        Some(GroupKey::StringTerm("engineer".to_string()))
    );
    assert_eq!(key_set.group_key(3), Some(GroupKey::Default));
    assert!(!key_set.is_present(0));
    assert_eq!(key_set.parent_group(3), 2);
}

/// Deep chains resolve keys level by level without any per-level copying.
#[test]
fn test_deep_chain_key_resolution() {
    let mut key_set: GroupKeySetRef = Arc::new(EmptyGroupKeySet);
    for _ in 0..6 {
        key_set = Arc::new(DayOfWeekGroupKeySet::new(key_set));
    }
    assert_eq!(key_set.num_groups(), 7usize.pow(6));

    // walk the last group back to the root
    let mut group = key_set.num_groups();
    let mut level: &dyn GroupKeySet = key_set.as_ref();
    let mut depth = 0;
    loop {
        assert!(level.is_present(group));
        group = level.parent_group(group);
        match level.previous() {
            Some(previous) => level = previous,
            None => break,
        }
        depth += 1;
    }
    assert_eq!(depth, 6);
    assert_eq!(group, 1);
}

#[test]
fn test_uneven_period_quarter_and_year_boundaries() {
    let quarters = UnevenPeriodGroupKeySet::new(
        Arc::new(EmptyGroupKeySet),
        8,
        2014,
        10,
        UnevenPeriod::Quarter,
        "%Y-%m-%d",
    );
    assert_eq!(
        quarters.group_key(1),
        Some(GroupKey::TimeRange {
            label: "[2014-10-01, 2015-01-01)".to_string()
        })
    );
    assert_eq!(
        quarters.group_key(2),
        Some(GroupKey::TimeRange {
            label: "[2015-01-01, 2015-04-01)".to_string()
        })
    );

    let years = UnevenPeriodGroupKeySet::new(
        Arc::new(EmptyGroupKeySet),
        3,
        2014,
        1,
        UnevenPeriod::Year,
        "%Y-%m-%d",
    );
    assert_eq!(
        years.group_key(3),
        Some(GroupKey::TimeRange {
            label: "[2016-01-01, 2017-01-01)".to_string()
        })
    );
}

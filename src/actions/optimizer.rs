//! Regroup plan optimization
//!
//! Consecutive query regroups over the same scope and group triple are
//! frequently produced by filter chains; each one is a full remote pass, so
//! merging them is the single most valuable plan rewrite.

use crate::actions::{Action, QueryAction};
use crate::docquery::BooleanOp;

fn groups_and_scope_match(a: &QueryAction, b: &QueryAction) -> bool {
    a.scope == b.scope
        && a.target_group == b.target_group
        && a.positive_group == b.positive_group
        && a.negative_group == b.negative_group
}

/// Merge adjacent query actions sharing `(scope, target, positive,
/// negative)` in one left-to-right pass.
///
/// A candidate narrowing the excluded side (`target == negative`) merges
/// with boolean OR; one narrowing the included side (`target == positive`)
/// merges with AND; anything else flushes the accumulator. Non-query
/// actions always flush, so ordering relative to them is preserved. Output
/// length never exceeds input length, and replaying either sequence against
/// the same initial group state yields identical assignments.
pub fn optimize_consecutive_query_actions(actions: Vec<Action>) -> Vec<Action> {
    let mut result = Vec::with_capacity(actions.len());
    let mut current: Option<QueryAction> = None;

    for action in actions {
        match action {
            Action::Query(query_action) => {
                current = Some(match current.take() {
                    None => query_action,
                    Some(accumulated) => {
                        if groups_and_scope_match(&accumulated, &query_action) {
                            if query_action.target_group == query_action.negative_group {
                                tracing::debug!(
                                    target_group = query_action.target_group,
                                    "merging consecutive query actions with OR"
                                );
                                accumulated.merge_queries(&query_action, BooleanOp::Or)
                            } else if query_action.target_group == query_action.positive_group {
                                tracing::debug!(
                                    target_group = query_action.target_group,
                                    "merging consecutive query actions with AND"
                                );
                                accumulated.merge_queries(&query_action, BooleanOp::And)
                            } else {
                                result.push(Action::Query(accumulated));
                                query_action
                            }
                        } else {
                            result.push(Action::Query(accumulated));
                            query_action
                        }
                    }
                });
            }
            other => {
                if let Some(accumulated) = current.take() {
                    result.push(Action::Query(accumulated));
                }
                result.push(other);
            }
        }
    }
    if let Some(accumulated) = current {
        result.push(Action::Query(accumulated));
    }
    result
}

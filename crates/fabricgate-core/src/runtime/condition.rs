// fabricgate-core/src/runtime/condition.rs
// ============================================================================
// Module: Fabricgate Condition Evaluator
// Description: Evaluates automation conditions against a field resolver.
// Purpose: Shared matcher used by event-trigger matching (C7) and
//          conditional actions inside the chain executor (C8).
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! The evaluator is generic over how a field path resolves to a value so the
//! same matcher serves two callers: event-trigger matching resolves paths
//! against an [`crate::core::Event`], while conditional actions resolve them
//! against the executor's variable scope. Failure to resolve a path always
//! yields `false` except for `NotExists`, which is defined precisely for
//! that case.

use crate::core::Condition;
use crate::core::ConditionOperator;

/// Evaluates `condition` by resolving its field through `resolve`.
#[must_use]
pub fn evaluate_condition(
    condition: &Condition,
    resolve: impl Fn(&str) -> Option<serde_json::Value>,
) -> bool {
    let resolved = resolve(&condition.field);
    match condition.operator {
        ConditionOperator::Exists => resolved.is_some(),
        ConditionOperator::NotExists => resolved.is_none(),
        ConditionOperator::Equals => resolved.as_ref() == Some(&condition.value),
        ConditionOperator::NotEquals => resolved.as_ref() != Some(&condition.value),
        ConditionOperator::Contains => match resolved {
            Some(serde_json::Value::String(haystack)) => condition
                .value
                .as_str()
                .is_some_and(|needle| haystack.contains(needle)),
            Some(serde_json::Value::Array(items)) => items.contains(&condition.value),
            _ => false,
        },
        ConditionOperator::GreaterThan => numeric_cmp(&resolved, &condition.value)
            .is_some_and(|ordering| ordering.is_gt()),
        ConditionOperator::LessThan => numeric_cmp(&resolved, &condition.value)
            .is_some_and(|ordering| ordering.is_lt()),
    }
}

/// Evaluates all conditions in `conditions`, returning true only if every
/// one holds (empty slice vacuously matches).
#[must_use]
pub fn evaluate_all(
    conditions: &[Condition],
    resolve: impl Fn(&str) -> Option<serde_json::Value>,
) -> bool {
    conditions.iter().all(|condition| evaluate_condition(condition, &resolve))
}

fn numeric_cmp(
    resolved: &Option<serde_json::Value>,
    expected: &serde_json::Value,
) -> Option<std::cmp::Ordering> {
    let resolved = resolved.as_ref()?.as_f64()?;
    let expected = expected.as_f64()?;
    resolved.partial_cmp(&expected)
}

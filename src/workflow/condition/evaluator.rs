// SPDX-License-Identifier: MIT

//! Condition evaluator

use serde_json::Value;

use super::operator::ConditionOperator;
use crate::error::NodeError;
use crate::workflow::types::ConditionConfig;

/// Evaluate a condition against a contact payload
///
/// Missing fields behave like `null`. Ordering operators need a numeric
/// configured value; anything else is an evaluation error.
pub fn evaluate(condition: &ConditionConfig, contact: &Value) -> Result<bool, NodeError> {
    let left = lookup_path(contact, &condition.field);
    let right = &condition.value;

    let result = match condition.operator {
        ConditionOperator::Equals => values_equal(left, right),
        ConditionOperator::NotEquals => !values_equal(left, right),
        ConditionOperator::Contains => check_contains(left, right),
        ConditionOperator::NotContains => !check_contains(left, right),
        ConditionOperator::StartsWith => match_str(left, right, |s, p| s.starts_with(p)),
        ConditionOperator::EndsWith => match_str(left, right, |s, p| s.ends_with(p)),
        ConditionOperator::GreaterThan => compare_numbers(condition, left, |a, b| a > b)?,
        ConditionOperator::LessThan => compare_numbers(condition, left, |a, b| a < b)?,
        ConditionOperator::IsEmpty => is_empty(left),
        ConditionOperator::IsNotEmpty => !is_empty(left),
    };

    log::debug!(
        "Condition '{} {} {}' evaluated to {}",
        condition.field,
        condition.operator,
        right,
        result
    );
    Ok(result)
}

/// Get a nested value using dot notation (e.g., "address.city")
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }
    Some(current)
}

fn values_equal(left: Option<&Value>, right: &Value) -> bool {
    match (left, right) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(l), r) => match (as_number(l), as_number(r)) {
            (Some(a), Some(b)) if l.is_number() || r.is_number() => (a - b).abs() < f64::EPSILON,
            _ => l == r,
        },
    }
}

fn compare_numbers<F>(
    condition: &ConditionConfig,
    left: Option<&Value>,
    cmp: F,
) -> Result<bool, NodeError>
where
    F: Fn(f64, f64) -> bool,
{
    let right = as_number(&condition.value).ok_or_else(|| NodeError::Evaluation {
        field: condition.field.clone(),
        reason: format!("'{}' is not a number", condition.value),
    })?;

    Ok(left
        .and_then(as_number)
        .map(|l| cmp(l, right))
        .unwrap_or(false))
}

fn check_contains(left: Option<&Value>, right: &Value) -> bool {
    match (left, right) {
        // String contains substring
        (Some(Value::String(s)), Value::String(sub)) => s.contains(sub.as_str()),
        // Array contains value
        (Some(Value::Array(items)), needle) => items.iter().any(|v| values_equal(Some(v), needle)),
        _ => false,
    }
}

fn match_str<F>(left: Option<&Value>, right: &Value, f: F) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    match (left, right) {
        (Some(Value::String(s)), Value::String(p)) => f(s, p),
        _ => false,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Numbers, and strings that parse as numbers
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

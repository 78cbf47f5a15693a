use serde_json::Value;

use crate::data::{FormData, is_empty_value, to_number, value_to_string};
use crate::spec::logic::{Condition, Operator};

/// Evaluates a single rule against the snapshot.
///
/// Inert rules (empty source id) never match; the visibility resolver filters them
/// out before calling this.
pub fn evaluate(rule: &Condition, data: &FormData) -> bool {
    if !rule.is_active() {
        return false;
    }
    let source = data.get(&rule.field_id);

    if is_empty_value(source) {
        return matches!(rule.operator, Operator::NotEquals | Operator::IsEmpty);
    }

    match source {
        Some(Value::Array(items)) => evaluate_sequence(rule, items),
        Some(value) => evaluate_scalar(rule, value),
        None => false,
    }
}

impl Condition {
    pub fn matches(&self, data: &FormData) -> bool {
        evaluate(self, data)
    }
}

fn evaluate_sequence(rule: &Condition, items: &[Value]) -> bool {
    let target = value_to_string(&rule.value);
    let contains = items.iter().any(|item| value_to_string(item) == target);
    match rule.operator {
        Operator::Equals => items.len() == 1 && value_to_string(&items[0]) == target,
        Operator::NotEquals => !contains,
        Operator::Contains => contains,
        Operator::IsNotEmpty => true,
        _ => false,
    }
}

fn evaluate_scalar(rule: &Condition, value: &Value) -> bool {
    let text = value_to_string(value);
    let target = value_to_string(&rule.value);

    match rule.operator {
        Operator::Equals => text == target,
        Operator::NotEquals => text != target,
        Operator::Contains => text.to_lowercase().contains(&target.to_lowercase()),
        Operator::StartsWith => text.to_lowercase().starts_with(&target.to_lowercase()),
        Operator::EndsWith => text.to_lowercase().ends_with(&target.to_lowercase()),
        // NaN on either side makes every ordering comparison false.
        Operator::GreaterThan => to_number(value) > to_number(&rule.value),
        Operator::LessThan => to_number(value) < to_number(&rule.value),
        Operator::GreaterThanOrEqual => to_number(value) >= to_number(&rule.value),
        Operator::LessThanOrEqual => to_number(value) <= to_number(&rule.value),
        Operator::IsEmpty => false,
        Operator::IsNotEmpty => true,
    }
}

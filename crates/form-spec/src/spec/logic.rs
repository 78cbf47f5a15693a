use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happens to a field when its rules match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogicAction {
    #[default]
    Show,
    Hide,
}

/// How the results of several rules are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogicScope {
    /// Every rule must match.
    #[default]
    All,
    /// At least one rule must match.
    Any,
}

/// Fixed operator set understood by the condition evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
        }
    }
}

/// Compares one source field's value against a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Source field id. An empty id makes the rule inert.
    #[serde(default)]
    pub field_id: String,
    pub operator: Operator,
    /// Comparison value; a string or a number in exported documents.
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field_id: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field_id: field_id.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.field_id.trim().is_empty()
    }
}

/// Rule set attached to a field, with its show/hide action and AND/OR scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ConditionalLogic {
    #[serde(default)]
    pub action: LogicAction,
    #[serde(default)]
    pub scope: LogicScope,
    #[serde(default)]
    pub rules: Vec<Condition>,
}

impl ConditionalLogic {
    pub fn active_rules(&self) -> impl Iterator<Item = &Condition> {
        self.rules.iter().filter(|rule| rule.is_active())
    }
}

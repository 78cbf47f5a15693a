//! The form data snapshot and the value coercions every evaluator shares.

use serde_json::{Map, Number, Value};

use crate::spec::form::FormSpec;

/// Mapping from field id to its current value.
pub type FormData = Map<String, Value>;

/// Builds the initial snapshot from each field's static default value.
pub fn seed_defaults(spec: &FormSpec) -> FormData {
    let mut data = FormData::new();
    for field in spec.fields() {
        if let Some(default) = field.default_value.as_deref().filter(|v| !v.is_empty()) {
            data.insert(field.id.clone(), Value::String(default.to_string()));
        }
    }
    data
}

/// Absent, null, the empty string and the empty sequence all count as empty.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// String form of a value, as shown to the person filling the form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_to_string(number),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn number_to_string(number: &Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
            format!("{}", float as i64)
        }
        _ => number.to_string(),
    }
}

/// Numeric coercion; anything that does not read as a number becomes NaN.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => parse_number(text),
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(single),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

/// Parses user text as a number. Blank text reads as zero.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '+' | '-' | 'e' | 'E')) =>
        {
            trimmed.parse::<f64>().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Converts a computed number into a stored value.
///
/// Whole numbers are stored as integers so that `150` compares equal to `"150"`.
/// Non-finite results have no JSON number form and are stored as their text.
pub fn number_value(number: f64) -> Value {
    if number.is_nan() {
        return Value::String("NaN".into());
    }
    if number.is_infinite() {
        let text = if number > 0.0 { "Infinity" } else { "-Infinity" };
        return Value::String(text.into());
    }
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(number as i64));
    }
    Number::from_f64(number)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

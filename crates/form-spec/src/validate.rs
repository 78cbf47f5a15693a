use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{FormData, is_empty_value};
use crate::spec::field::{Field, FieldType};
use crate::spec::form::FormSpec;
use crate::visibility::resolve_visibility;

static EMAIL: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    pub field_id: String,
    pub path: String,
    pub message: String,
    pub code: String,
}

/// Every problem found in one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub missing_required: Vec<String>,
}

impl ValidationResult {
    /// Missing required fields first, then fields with errors, without repeats.
    pub fn offending_fields(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.missing_required.clone();
        for error in &self.errors {
            if !ids.contains(&error.field_id) {
                ids.push(error.field_id.clone());
            }
        }
        ids
    }
}

/// Checks every visible input field; hidden fields are never validated.
pub fn validate(spec: &FormSpec, data: &FormData) -> ValidationResult {
    let visibility = resolve_visibility(spec, data);
    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for field in spec.fields() {
        if field.kind.is_layout() || !visibility.get(&field.id).copied().unwrap_or(true) {
            continue;
        }

        let value = data.get(&field.id);
        if is_empty_value(value) {
            if field.required {
                missing_required.push(field.id.clone());
            }
            continue;
        }

        if let Some(value) = value
            && let Some(error) = validate_value(field, value)
        {
            errors.push(error);
        }
    }

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty(),
        errors,
        missing_required,
    }
}

fn validate_value(field: &Field, value: &Value) -> Option<ValidationError> {
    if field.kind == FieldType::Email {
        let valid = match (value.as_str(), EMAIL.as_ref()) {
            (Some(text), Ok(pattern)) => pattern.is_match(text.trim()),
            (None, _) => false,
            (Some(_), Err(err)) => {
                log::error!("email pattern failed to compile: {}", err);
                true
            }
        };
        if !valid {
            return Some(base_error(field, "enter a valid email address", "invalid_email"));
        }
    }

    None
}

fn base_error(field: &Field, message: &str, code: &str) -> ValidationError {
    ValidationError {
        field_id: field.id.clone(),
        path: format!("/{}", field.id),
        message: message.into(),
        code: code.into(),
    }
}

use serde_json::{Map, Value, json};

use crate::entry::Submission;
use crate::spec::field::{Field, FieldType};
use crate::spec::form::FormSpec;
use crate::visibility::VisibilityMap;

/// JSON Schema of the form definition interchange document.
pub fn form_definition_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(FormSpec)).unwrap_or(Value::Null)
}

pub fn submission_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(Submission)).unwrap_or(Value::Null)
}

/// JSON Schema describing the `data` of a submission for the given visibility.
///
/// Hidden and layout fields are left out entirely.
pub fn entry_schema(spec: &FormSpec, visibility: &VisibilityMap) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in spec.fields() {
        if field.kind.is_layout() || !visibility.get(&field.id).copied().unwrap_or(true) {
            continue;
        }
        properties.insert(field.id.clone(), field_schema(field));
        if field.required {
            required.push(Value::String(field.id.clone()));
        }
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": spec.title,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn field_schema(field: &Field) -> Value {
    let mut schema = if field.kind.is_multi_select() {
        let mut items = json!({ "type": "string" });
        let values = field.choice_values();
        if !values.is_empty() {
            items["enum"] = json!(values);
        }
        json!({ "type": "array", "items": items })
    } else if field.kind.has_choices() {
        let mut schema = json!({ "type": "string" });
        let values = field.choice_values();
        if !values.is_empty() {
            schema["enum"] = json!(values);
        }
        schema
    } else {
        match field.kind {
            FieldType::Number | FieldType::Calculation => json!({ "type": ["number", "string"] }),
            FieldType::Email => json!({ "type": "string", "format": "email" }),
            FieldType::Date => json!({ "type": "string", "format": "date" }),
            _ => json!({ "type": "string" }),
        }
    };
    schema["title"] = Value::String(field.display_label().to_string());
    if let Some(description) = &field.description {
        schema["description"] = Value::String(description.clone());
    }
    schema
}

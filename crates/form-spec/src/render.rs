use serde_json::{Map, Value, json};

use crate::data::{FormData, is_empty_value, value_to_string};
use crate::spec::field::{Field, FieldType};
use crate::spec::form::FormSpec;
use crate::validate::validate;
use crate::visibility::{VisibilityMap, resolve_visibility};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Some visible field still blocks submission.
    NeedInput,
    /// Every visible field passes validation.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Progress counters over visible input fields.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// A single field as the renderer sees it.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub kind: FieldType,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<Value>,
    pub choices: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct RenderPage {
    pub id: String,
    pub title: String,
    pub fields: Vec<RenderField>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: String,
    pub form_title: String,
    pub help: Option<String>,
    pub submit_label: String,
    pub status: RenderStatus,
    pub next_field_id: Option<String>,
    pub progress: RenderProgress,
    pub pages: Vec<RenderPage>,
}

impl RenderPayload {
    pub fn fields(&self) -> impl Iterator<Item = &RenderField> {
        self.pages.iter().flat_map(|page| page.fields.iter())
    }

    pub fn field(&self, id: &str) -> Option<&RenderField> {
        self.fields().find(|field| field.id == id)
    }
}

/// Builds the payload from the form and a data snapshot.
///
/// Visibility is recomputed here from the data alone, so this output matches what
/// the live session shows for the same snapshot.
pub fn build_render_payload(spec: &FormSpec, data: &FormData) -> RenderPayload {
    let visibility = resolve_visibility(spec, data);
    let validation = validate(spec, data);

    let pages = spec
        .pages
        .iter()
        .map(|page| RenderPage {
            id: page.id.clone(),
            title: page.title.clone(),
            fields: page
                .fields
                .iter()
                .map(|field| render_field(field, data, &visibility))
                .collect(),
        })
        .collect::<Vec<_>>();

    let inputs = pages
        .iter()
        .flat_map(|page| page.fields.iter())
        .filter(|field| field.visible && !field.kind.is_layout())
        .collect::<Vec<_>>();
    let answered = inputs
        .iter()
        .filter(|field| !is_empty_value(field.current_value.as_ref()))
        .count();
    let next_field_id = inputs
        .iter()
        .find(|field| {
            field.kind != FieldType::Calculation && is_empty_value(field.current_value.as_ref())
        })
        .map(|field| field.id.clone());
    let total = inputs.len();

    let status = if validation.valid {
        RenderStatus::Complete
    } else {
        RenderStatus::NeedInput
    };

    let submit_label = if spec.submit_button_text.trim().is_empty() {
        "Complete Submission".to_string()
    } else {
        spec.submit_button_text.clone()
    };

    RenderPayload {
        form_id: spec.id.clone(),
        form_title: spec.title.clone(),
        help: Some(spec.description.clone()).filter(|text| !text.trim().is_empty()),
        submit_label,
        status,
        next_field_id,
        progress: RenderProgress { answered, total },
        pages,
    }
}

fn render_field(field: &Field, data: &FormData, visibility: &VisibilityMap) -> RenderField {
    let visible = visibility.get(&field.id).copied().unwrap_or(true);
    RenderField {
        id: field.id.clone(),
        label: field.display_label().to_string(),
        description: field.description.clone(),
        placeholder: field.placeholder.clone(),
        kind: field.kind,
        required: field.required,
        visible,
        // Hidden values stay in the session.
        current_value: data.get(&field.id).filter(|_| visible).cloned(),
        choices: field
            .choices
            .iter()
            .flatten()
            .map(|choice| (choice.value.clone(), choice.text.clone()))
            .collect(),
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let pages = payload
        .pages
        .iter()
        .map(|page| {
            let fields = page.fields.iter().map(field_json).collect::<Vec<_>>();
            json!({
                "id": page.id,
                "title": page.title,
                "fields": fields,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "help": payload.help,
        "submit_label": payload.submit_label,
        "status": payload.status.as_str(),
        "next_field_id": payload.next_field_id,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "pages": pages,
    })
}

fn field_json(field: &RenderField) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), Value::String(field.id.clone()));
    map.insert("label".into(), Value::String(field.label.clone()));
    map.insert(
        "description".into(),
        field
            .description
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    map.insert("type".into(), Value::String(field.kind.as_str().to_string()));
    map.insert("required".into(), Value::Bool(field.required));
    map.insert("visible".into(), Value::Bool(field.visible));
    if let Some(placeholder) = &field.placeholder {
        map.insert("placeholder".into(), Value::String(placeholder.clone()));
    }
    if let Some(current_value) = &field.current_value {
        map.insert("current_value".into(), current_value.clone());
    }
    if !field.choices.is_empty() {
        map.insert(
            "choices".into(),
            Value::Array(
                field
                    .choices
                    .iter()
                    .map(|(value, text)| json!({ "value": value, "text": text }))
                    .collect(),
            ),
        );
    }
    Value::Object(map)
}

/// Render the payload as human-friendly text. Hidden fields are not shown.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} ({})", payload.form_title, payload.form_id));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));
    if let Some(help) = &payload.help {
        lines.push(format!("Help: {}", help));
    }

    for page in &payload.pages {
        let visible = page
            .fields
            .iter()
            .filter(|field| field.visible)
            .collect::<Vec<_>>();
        if visible.is_empty() {
            continue;
        }
        if !page.title.is_empty() {
            lines.push(format!("== {} ==", page.title));
        }
        for field in visible {
            match field.kind {
                FieldType::Section => lines.push(format!("-- {} --", field.label)),
                FieldType::PageBreak => lines.push("--------".to_string()),
                _ => {
                    let mut entry = format!(" - {} ({})", field.id, field.label);
                    if field.required {
                        entry.push_str(" [required]");
                    }
                    if let Some(current_value) = &field.current_value
                        && !is_empty_value(Some(current_value))
                    {
                        entry.push_str(&format!(" = {}", value_to_string(current_value)));
                    }
                    lines.push(entry);
                }
            }
        }
    }

    match &payload.next_field_id {
        Some(next) => lines.push(format!("Next field: {}", next)),
        None => lines.push("All visible fields are answered.".to_string()),
    }

    lines.join("\n")
}

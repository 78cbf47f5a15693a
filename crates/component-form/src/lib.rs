use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use form_spec::{
    Draft, FormData, FormSpec, ImportError, ImportedDocument, PassReport, RenderSession,
    SessionError, SubmitError, VisibilityMap, build_render_payload, entry_schema,
    render_confirmation, render_json_ui as form_render_json_ui, render_text as form_render_text,
    seed_defaults, validate,
};
use form_spec::interchange::check_form;

const DEFAULT_SPEC: &str = include_str!("../../form-spec/tests/fixtures/order_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse input: {0}")]
    InputParse(#[source] serde_json::Error),
    #[error("form '{0}' is not available")]
    FormUnavailable(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Template(#[from] form_spec::TemplateError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
}

/// What a host keeps between calls: the data snapshot and the visibility it was shown with.
#[derive(Debug, Deserialize, Serialize, Default)]
struct SessionState {
    #[serde(default)]
    data: FormData,
    #[serde(default)]
    visibility: Option<VisibilityMap>,
}

fn load_form_spec(config_json: &str) -> Result<FormSpec, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.form_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);

    let spec: FormSpec = serde_json::from_str(spec_json).map_err(ComponentError::ConfigParse)?;
    check_form(&spec)?;
    Ok(spec)
}

fn ensure_form(form_id: &str, config_json: &str) -> Result<FormSpec, ComponentError> {
    let spec = load_form_spec(config_json)?;
    if spec.id != form_id {
        Err(ComponentError::FormUnavailable(form_id.to_string()))
    } else {
        Ok(spec)
    }
}

/// Accepts either a bare data object or a `{ "data": .., "visibility": .. }` state.
fn parse_state(state_json: &str) -> Result<SessionState, ComponentError> {
    if state_json.trim().is_empty() {
        return Ok(SessionState::default());
    }
    let value: Value = serde_json::from_str(state_json).map_err(ComponentError::InputParse)?;
    if value.get("data").is_some_and(Value::is_object) {
        serde_json::from_value(value).map_err(ComponentError::InputParse)
    } else {
        let data = serde_json::from_value(value).map_err(ComponentError::InputParse)?;
        Ok(SessionState {
            data,
            visibility: None,
        })
    }
}

/// Without a stored visibility the snapshot is treated as new: static defaults are
/// seeded under it and every visible field counts as newly shown.
fn open_session(spec: &FormSpec, state: SessionState) -> RenderSession<'_> {
    match state.visibility {
        Some(visibility) => RenderSession::restore(spec, state.data, visibility),
        None => {
            let mut data = seed_defaults(spec);
            data.extend(state.data);
            RenderSession::restore(spec, data, VisibilityMap::new())
        }
    }
}

fn settled_session<'a>(
    spec: &'a FormSpec,
    state_json: &str,
) -> Result<RenderSession<'a>, ComponentError> {
    let mut session = open_session(spec, parse_state(state_json)?);
    session.evaluate()?;
    Ok(session)
}

fn session_response(session: &RenderSession<'_>, report: &PassReport) -> Value {
    json!({
        "data": session.data(),
        "visibility": session.visibility(),
        "passes": report.passes,
        "changed": report.changed,
    })
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => {
            log::debug!("component call failed: {}", err);
            json!({ "error": err.to_string() }).to_string()
        }
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

pub fn describe(form_id: &str, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        serde_json::to_value(spec).map_err(ComponentError::JsonEncode)
    }))
}

/// Runs the engine over a snapshot until it settles.
pub fn evaluate(form_id: &str, config_json: &str, state_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let mut session = open_session(&spec, parse_state(state_json)?);
        let report = session.evaluate()?;
        Ok(session_response(&session, &report))
    }))
}

/// Records one input against a snapshot and returns the settled state.
pub fn set_value(
    form_id: &str,
    config_json: &str,
    state_json: &str,
    field_id: &str,
    value_json: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::InputParse)?;
        let mut session = settled_session(&spec, state_json)?;
        let report = if value.is_null() {
            session.clear_value(field_id)?
        } else {
            session.set_value(field_id, value)?
        };
        Ok(session_response(&session, &report))
    }))
}

/// Validates the settled snapshot, the same data `submit` would check.
pub fn validate_entry(form_id: &str, config_json: &str, data_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let session = settled_session(&spec, data_json)?;
        serde_json::to_value(validate(&spec, session.data())).map_err(ComponentError::JsonEncode)
    }))
}

pub fn get_entry_schema(form_id: &str, config_json: &str, state_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let session = settled_session(&spec, state_json)?;
        Ok(entry_schema(&spec, session.visibility()))
    }))
}

pub fn render_text(form_id: &str, config_json: &str, state_json: &str) -> String {
    respond_string(ensure_form(form_id, config_json).and_then(|spec| {
        let session = settled_session(&spec, state_json)?;
        Ok(form_render_text(&build_render_payload(&spec, session.data())))
    }))
}

pub fn render_json_ui(form_id: &str, config_json: &str, state_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let session = settled_session(&spec, state_json)?;
        Ok(form_render_json_ui(&build_render_payload(
            &spec,
            session.data(),
        )))
    }))
}

/// Validates and submits. Validation failures are a normal response, not an error.
pub fn submit(form_id: &str, config_json: &str, state_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let session = settled_session(&spec, state_json)?;
        match session.submit(None) {
            Ok(submission) => {
                let confirmation = render_confirmation(&spec, &submission)?;
                Ok(json!({
                    "status": "submitted",
                    "submission": serde_json::to_value(&submission)
                        .map_err(ComponentError::JsonEncode)?,
                    "confirmation": confirmation,
                }))
            }
            Err(SubmitError::Validation(validation)) => Ok(json!({
                "status": "error",
                "data": session.data(),
                "validation": serde_json::to_value(&validation)
                    .map_err(ComponentError::JsonEncode)?,
            })),
        }
    }))
}

pub fn save_draft(form_id: &str, config_json: &str, state_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let session = settled_session(&spec, state_json)?;
        serde_json::to_value(session.save_draft()).map_err(ComponentError::JsonEncode)
    }))
}

/// Saves into the given draft, keeping its resume code.
pub fn update_draft(
    form_id: &str,
    config_json: &str,
    draft_json: &str,
    state_json: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let mut draft: Draft =
            serde_json::from_str(draft_json).map_err(ComponentError::InputParse)?;
        let session = settled_session(&spec, state_json)?;
        session.update_draft(&mut draft)?;
        serde_json::to_value(draft).map_err(ComponentError::JsonEncode)
    }))
}

pub fn resume_draft(form_id: &str, config_json: &str, draft_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let draft: Draft = serde_json::from_str(draft_json).map_err(ComponentError::InputParse)?;
        let session = RenderSession::resume(&spec, &draft)?;
        Ok(resumed_response(&draft, &session))
    }))
}

/// Like [`resume_draft`], but only when `code` is the draft's resume code.
pub fn resume_draft_with_code(
    form_id: &str,
    config_json: &str,
    draft_json: &str,
    code: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let draft: Draft = serde_json::from_str(draft_json).map_err(ComponentError::InputParse)?;
        let session = RenderSession::resume_with_code(&spec, &draft, code)?;
        Ok(resumed_response(&draft, &session))
    }))
}

fn resumed_response(draft: &Draft, session: &RenderSession<'_>) -> Value {
    json!({
        "draft_id": draft.id,
        "data": session.data(),
        "visibility": session.visibility(),
    })
}

/// Classifies an interchange document as a whole form or a single field.
pub fn import(document_json: &str) -> String {
    respond(
        form_spec::import_document(document_json)
            .map_err(ComponentError::from)
            .and_then(|document| {
                let (kind, value) = match document {
                    ImportedDocument::Form(spec) => ("form", serde_json::to_value(spec)),
                    ImportedDocument::Field(field) => ("field", serde_json::to_value(field)),
                };
                let value = value.map_err(ComponentError::JsonEncode)?;
                Ok(json!({ "kind": kind, "document": value }))
            }),
    )
}

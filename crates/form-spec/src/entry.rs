use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::data::{FormData, value_to_string};
use crate::draft::random_code;
use crate::spec::form::FormSpec;
use crate::validate::{ValidationResult, validate};
use crate::visibility::resolve_visibility;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(
        "submission blocked: {} field(s) need attention",
        .0.offending_fields().len()
    )]
    Validation(ValidationResult),
}

/// Details about the client that produced a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// A frozen, submitted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub form_id: String,
    pub data: FormData,
    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub submitted_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_meta: Option<ClientMeta>,
}

/// Label and display value of one submitted field, for PDF and CSV collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRow {
    pub field_id: String,
    pub label: String,
    pub value: String,
}

/// Keeps exactly the visible input fields; values of hidden fields are dropped.
pub fn build_submission(spec: &FormSpec, data: &FormData) -> FormData {
    let visibility = resolve_visibility(spec, data);
    spec.fields()
        .filter(|field| !field.kind.is_layout())
        .filter(|field| visibility.get(&field.id).copied().unwrap_or(false))
        .filter_map(|field| {
            data.get(&field.id)
                .map(|value| (field.id.clone(), value.clone()))
        })
        .collect()
}

/// Runs the validation gate, then assembles the submission record.
pub fn submit(
    spec: &FormSpec,
    data: &FormData,
    client_meta: Option<ClientMeta>,
) -> Result<Submission, SubmitError> {
    let validation = validate(spec, data);
    if !validation.valid {
        return Err(SubmitError::Validation(validation));
    }

    Ok(Submission {
        id: format!("entry-{}", random_code(9).to_ascii_lowercase()),
        form_id: spec.id.clone(),
        data: build_submission(spec, data),
        submitted_at: OffsetDateTime::now_utc(),
        client_meta,
    })
}

pub fn entry_rows(spec: &FormSpec, submission: &Submission) -> Vec<EntryRow> {
    spec.fields()
        .filter_map(|field| {
            submission.data.get(&field.id).map(|value| EntryRow {
                field_id: field.id.clone(),
                label: field.display_label().to_string(),
                value: value_to_string(value),
            })
        })
        .collect()
}

//! Import and export of form definitions and single-field snippets.

use serde_json::Value;
use thiserror::Error;

use crate::draft::random_code;
use crate::spec::field::Field;
use crate::spec::form::FormSpec;

const FRESH_ID_LEN: usize = 9;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("document is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error(
        "unrecognized document structure: expected a form with a `pages` array or a field with `id`, `type` and `label`"
    )]
    StructuralMismatch,
    #[error("{kind} document is malformed: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("field on page '{page}' has an empty id")]
    EmptyFieldId { page: String },
    #[error("field id '{0}' is used more than once")]
    DuplicateFieldId(String),
}

/// A successfully classified interchange document.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportedDocument {
    Form(FormSpec),
    Field(Field),
}

impl ImportedDocument {
    /// Gives the document a new `form-`/`field-` id so importing a template
    /// twice, or a snippet that already exists in the target, never collides.
    pub fn with_fresh_id(self) -> Self {
        match self {
            ImportedDocument::Form(mut spec) => {
                spec.id = fresh_form_id();
                ImportedDocument::Form(spec)
            }
            ImportedDocument::Field(mut field) => {
                field.id = fresh_field_id();
                ImportedDocument::Field(field)
            }
        }
    }
}

pub fn fresh_form_id() -> String {
    format!("form-{}", random_code(FRESH_ID_LEN).to_ascii_lowercase())
}

pub fn fresh_field_id() -> String {
    format!("field-{}", random_code(FRESH_ID_LEN).to_ascii_lowercase())
}

pub fn import_document(json: &str) -> Result<ImportedDocument, ImportError> {
    let value: Value = serde_json::from_str(json).map_err(ImportError::InvalidJson)?;
    import_value(value)
}

pub fn import_value(value: Value) -> Result<ImportedDocument, ImportError> {
    let result = classify(value);
    if let Err(err) = &result {
        log::warn!("rejected form import: {}", err);
    }
    result
}

fn classify(value: Value) -> Result<ImportedDocument, ImportError> {
    let Some(object) = value.as_object() else {
        return Err(ImportError::StructuralMismatch);
    };

    if object.get("pages").is_some_and(Value::is_array) {
        let mut spec: FormSpec = serde_json::from_value(value)
            .map_err(|source| ImportError::Malformed { kind: "form", source })?;
        if spec.id.trim().is_empty() {
            spec.id = fresh_form_id();
        }
        check_form(&spec)?;
        return Ok(ImportedDocument::Form(spec));
    }

    let has_text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|text| !text.is_empty())
    };
    if has_text("id") && has_text("type") && has_text("label") {
        let field: Field = serde_json::from_value(value)
            .map_err(|source| ImportError::Malformed { kind: "field", source })?;
        return Ok(ImportedDocument::Field(field));
    }

    Err(ImportError::StructuralMismatch)
}

/// Structural invariants a form must hold before it replaces the active one.
pub fn check_form(spec: &FormSpec) -> Result<(), ImportError> {
    for page in &spec.pages {
        if page.fields.iter().any(|field| field.id.trim().is_empty()) {
            return Err(ImportError::EmptyFieldId {
                page: page.id.clone(),
            });
        }
    }
    for (field, reference) in spec.unknown_formula_references() {
        log::warn!(
            "formula of '{}' references unknown field '{}'",
            field,
            reference
        );
    }
    match spec.duplicate_field_ids().into_iter().next() {
        Some(duplicate) => Err(ImportError::DuplicateFieldId(duplicate)),
        None => Ok(()),
    }
}

pub fn export_form(spec: &FormSpec) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(spec)
}

pub fn export_field(field: &Field) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(field)
}

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::formula::referenced_fields;
use crate::interchange::{ImportError, fresh_field_id};
use crate::spec::field::Field;

/// Default bound on evaluation passes before a session reports non-convergence.
pub const DEFAULT_MAX_PASSES: usize = 5;

/// Paper size used by the PDF collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
}

/// Presentation hints consumed by the PDF collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PdfConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_logo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_submission_date: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_size: Option<PaperSize>,
}

/// Engine settings carried with the form definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationPolicy {
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// One page of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormPage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Top-level form definition, as exchanged with the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub pages: Vec<FormPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    #[serde(default)]
    pub submit_button_text: String,
    #[serde(default)]
    pub confirm_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_config: Option<PdfConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationPolicy>,
}

impl FormSpec {
    /// All fields across all pages, in page order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.pages.iter().flat_map(|page| page.fields.iter())
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields().find(|field| field.id == id)
    }

    pub fn max_passes(&self) -> usize {
        self.evaluation
            .map(|policy| policy.max_passes)
            .unwrap_or(DEFAULT_MAX_PASSES)
            .max(1)
    }

    /// Field ids that appear more than once across the whole form.
    pub fn duplicate_field_ids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for field in self.fields() {
            if !seen.insert(field.id.as_str()) {
                duplicates.insert(field.id.clone());
            }
        }
        duplicates.into_iter().collect()
    }

    /// `(calculation field, referenced id)` pairs whose id the form does not define.
    /// Such references evaluate as `0`.
    pub fn unknown_formula_references(&self) -> Vec<(String, String)> {
        self.fields()
            .filter_map(|field| field.formula.as_deref().map(|formula| (field, formula)))
            .flat_map(|(field, formula)| {
                referenced_fields(formula)
                    .into_iter()
                    .filter(|id| self.field(id).is_none())
                    .map(|id| (field.id.clone(), id))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.fields()
            .map(|field| (field.id.clone(), field.display_label().to_string()))
            .collect()
    }

    pub fn label_for(&self, id: &str) -> Option<&str> {
        self.field(id).map(Field::display_label)
    }

    /// Appends a field to the last page, creating one if the form has none.
    ///
    /// A field whose id is already used leaves the form untouched.
    pub fn append_field(&mut self, field: Field) -> Result<(), ImportError> {
        if self.field(&field.id).is_some() {
            return Err(ImportError::DuplicateFieldId(field.id));
        }
        self.push_to_last_page(field);
        Ok(())
    }

    /// Appends a snippet under a newly generated id and returns that id.
    pub fn import_field(&mut self, mut field: Field) -> String {
        let mut id = fresh_field_id();
        while self.field(&id).is_some() {
            id = fresh_field_id();
        }
        field.id = id.clone();
        self.push_to_last_page(field);
        id
    }

    fn push_to_last_page(&mut self, field: Field) {
        if self.pages.is_empty() {
            self.pages.push(FormPage {
                id: "page-1".into(),
                title: "Page 1".into(),
                fields: Vec::new(),
            });
        }
        if let Some(page) = self.pages.last_mut() {
            page.fields.push(field);
        }
    }
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::logic::ConditionalLogic;

/// Closed set of field types the builder can place on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single line text.
    #[default]
    Text,
    /// Paragraph text.
    Textarea,
    /// Drop down.
    Select,
    Radio,
    Checkbox,
    Number,
    Email,
    Date,
    File,
    Signature,
    /// Section break; layout only.
    Section,
    /// Page break; layout only.
    PageBreak,
    Calculation,
    Quiz,
    Poll,
    Survey,
    Product,
    NestedForm,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Date => "date",
            FieldType::File => "file",
            FieldType::Signature => "signature",
            FieldType::Section => "section",
            FieldType::PageBreak => "page_break",
            FieldType::Calculation => "calculation",
            FieldType::Quiz => "quiz",
            FieldType::Poll => "poll",
            FieldType::Survey => "survey",
            FieldType::Product => "product",
            FieldType::NestedForm => "nested_form",
        }
    }

    /// Layout fields never hold a value and are skipped by validation and submission.
    pub fn is_layout(&self) -> bool {
        matches!(self, FieldType::Section | FieldType::PageBreak)
    }

    pub fn has_choices(&self) -> bool {
        matches!(
            self,
            FieldType::Select
                | FieldType::Radio
                | FieldType::Checkbox
                | FieldType::Quiz
                | FieldType::Poll
                | FieldType::Survey
        )
    }

    /// Types whose value is a sequence of selected choice values.
    pub fn is_multi_select(&self) -> bool {
        matches!(self, FieldType::Checkbox)
    }
}

/// Relative column width used by the builder grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum FieldWidth {
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "3/4")]
    ThreeQuarters,
    #[default]
    #[serde(rename = "1/1")]
    Full,
}

/// One selectable option of a choice-bearing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_selected: Option<bool>,
}

/// A single input unit of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    #[serde(default)]
    pub width: FieldWidth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_default_value: Option<String>,
    /// Arithmetic template over `{field:ID}` references; read only for calculation fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_files: Option<bool>,
}

impl Field {
    pub fn new(id: impl Into<String>, kind: FieldType) -> Self {
        Self {
            id: id.into(),
            kind,
            ..Self::default()
        }
    }

    /// Label shown to people reading an entry.
    pub fn display_label(&self) -> &str {
        if !self.label.trim().is_empty() {
            &self.label
        } else if let Some(admin) = self.admin_label.as_deref().filter(|l| !l.trim().is_empty()) {
            admin
        } else {
            &self.id
        }
    }

    pub fn choice_values(&self) -> Vec<&str> {
        self.choices
            .iter()
            .flatten()
            .map(|choice| choice.value.as_str())
            .collect()
    }
}

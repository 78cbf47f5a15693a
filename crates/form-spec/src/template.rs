use handlebars::Handlebars;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::entry::Submission;
use crate::spec::form::FormSpec;

const DEFAULT_CONFIRMATION: &str = "Thank you! Your submission has been received.";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render template: {0}")]
    Render(#[from] Box<handlebars::RenderError>),
}

/// Thin wrapper over a non-escaping, non-strict handlebars registry.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    pub fn render(&self, template: &str, ctx: &Value) -> Result<String, TemplateError> {
        self.registry
            .render_template(template, ctx)
            .map_err(|err| TemplateError::Render(Box::new(err)))
    }
}

/// Renders the form's confirmation message against a submission.
///
/// Submitted values are addressed by field id (`{{[field-id]}}` for ids with dashes);
/// `form_title` and `entry_id` are also available.
pub fn render_confirmation(spec: &FormSpec, submission: &Submission) -> Result<String, TemplateError> {
    let template = if spec.confirm_message.trim().is_empty() {
        DEFAULT_CONFIRMATION
    } else {
        spec.confirm_message.as_str()
    };

    let mut ctx = Map::new();
    for (id, value) in &submission.data {
        ctx.insert(id.clone(), value.clone());
    }
    ctx.insert("form_title".into(), Value::String(spec.title.clone()));
    ctx.insert("entry_id".into(), Value::String(submission.id.clone()));

    TemplateEngine::new().render(template, &Value::Object(ctx))
}

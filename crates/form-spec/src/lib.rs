#![allow(missing_docs)]

pub mod condition;
pub mod data;
pub mod draft;
pub mod entry;
pub mod formula;
pub mod interchange;
pub mod render;
pub mod schema;
pub mod session;
pub mod spec;
pub mod template;
pub mod validate;
pub mod visibility;

pub use data::{FormData, is_empty_value, seed_defaults, value_to_string};
pub use draft::{Draft, normalize_resume_code};
pub use entry::{
    ClientMeta, EntryRow, SubmitError, Submission, build_submission, entry_rows, submit,
};
pub use formula::FormulaError;
pub use interchange::{
    ImportError, ImportedDocument, export_field, export_form, fresh_field_id, fresh_form_id,
    import_document,
};
pub use render::{
    RenderField, RenderPage, RenderPayload, RenderProgress, RenderStatus, build_render_payload,
    render_json_ui, render_text,
};
pub use schema::{entry_schema, form_definition_schema, submission_schema};
pub use session::{Mutation, MutationCause, PassReport, RenderSession, SessionError, plan_pass};
pub use spec::{
    Choice, Condition, ConditionalLogic, EvaluationPolicy, Field, FieldType, FieldWidth, FormPage,
    FormSpec, LogicAction, LogicScope, Operator, PdfConfig,
};
pub use template::{TemplateEngine, TemplateError, render_confirmation};
pub use validate::{ValidationError, ValidationResult, validate};
pub use visibility::{VisibilityMap, is_visible, resolve_visibility};

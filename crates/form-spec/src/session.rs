//! The rendering session: owns the form data snapshot, tracks visibility
//! transitions between passes and drives evaluation to a fixed point.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::data::{FormData, is_empty_value, number_value, seed_defaults, value_to_string};
use crate::draft::Draft;
use crate::entry::{ClientMeta, SubmitError, Submission, submit};
use crate::formula;
use crate::spec::field::{Field, FieldType};
use crate::spec::form::FormSpec;
use crate::visibility::{VisibilityMap, resolve_visibility};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("field '{0}' is not part of this form")]
    UnknownField(String),
    #[error(
        "form configuration did not settle after {passes} evaluation passes; still changing: {}",
        pending.join(", ")
    )]
    NonConvergent { passes: usize, pending: Vec<String> },
    #[error("draft '{draft_id}' belongs to form '{draft_form}', not '{form}'")]
    DraftFormMismatch {
        draft_id: String,
        draft_form: String,
        form: String,
    },
    #[error("resume code '{code}' does not match draft '{draft_id}'")]
    ResumeCodeMismatch { code: String, draft_id: String },
}

/// Why a pass wants to change a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationCause {
    ConditionalDefault,
    Calculation,
}

/// One value write produced by a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mutation {
    pub field_id: String,
    pub value: Value,
    pub cause: MutationCause,
}

/// Result of planning one pass against a fixed snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub visibility: VisibilityMap,
    pub mutations: Vec<Mutation>,
}

/// Summary of an evaluation that reached a fixed point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PassReport {
    /// Passes run, including the final pass that changed nothing.
    pub passes: usize,
    /// Fields whose value the engine changed, in first-change order.
    pub changed: Vec<String>,
}

/// Plans one pass. Every field reads the same `data`; nothing is written here.
pub fn plan_pass(spec: &FormSpec, data: &FormData, previous: &VisibilityMap) -> PassPlan {
    let visibility = resolve_visibility(spec, data);
    let mut mutations = Vec::new();

    for field in spec.fields() {
        let visible = visibility.get(&field.id).copied().unwrap_or(true);
        let was_visible = previous.get(&field.id).copied() == Some(true);

        if visible
            && !was_visible
            && let Some(value) = transition_default(field, data)
        {
            mutations.push(Mutation {
                field_id: field.id.clone(),
                value,
                cause: MutationCause::ConditionalDefault,
            });
        }

        if let Some(value) = calculated_value(field, data) {
            mutations.push(Mutation {
                field_id: field.id.clone(),
                value,
                cause: MutationCause::Calculation,
            });
        }
    }

    PassPlan {
        visibility,
        mutations,
    }
}

/// The conditional default to apply on a hidden-to-visible transition, unless the
/// person already typed something other than the static default.
fn transition_default(field: &Field, data: &FormData) -> Option<Value> {
    let conditional = field.conditional_default_value.as_deref()?;
    let current = data.get(&field.id);
    let untouched = is_empty_value(current)
        || match (current, field.default_value.as_deref()) {
            (Some(value), Some(default)) => value_to_string(value) == default,
            _ => false,
        };
    let replacement = Value::String(conditional.to_string());
    (untouched && current != Some(&replacement)).then_some(replacement)
}

fn calculated_value(field: &Field, data: &FormData) -> Option<Value> {
    if field.kind != FieldType::Calculation {
        return None;
    }
    let result = formula::evaluate(field.formula.as_deref()?, data)?;
    let value = number_value(result);
    (data.get(&field.id) != Some(&value)).then_some(value)
}

/// Single-writer session over one form's data.
#[derive(Debug, Clone)]
pub struct RenderSession<'a> {
    spec: &'a FormSpec,
    data: FormData,
    previous_visibility: VisibilityMap,
}

impl<'a> RenderSession<'a> {
    /// Starts a session seeded with static defaults and evaluates it.
    pub fn new(spec: &'a FormSpec) -> Result<Self, SessionError> {
        Self::with_initial_data(spec, FormData::new())
    }

    /// Starts a session whose defaults are overlaid with `initial` (e.g. a draft).
    pub fn with_initial_data(spec: &'a FormSpec, initial: FormData) -> Result<Self, SessionError> {
        let mut data = seed_defaults(spec);
        data.extend(initial);
        let mut session = Self {
            spec,
            data,
            previous_visibility: VisibilityMap::new(),
        };
        session.evaluate()?;
        Ok(session)
    }

    /// Rebuilds a session from a snapshot and the visibility it was last shown with.
    ///
    /// Nothing is evaluated until [`RenderSession::evaluate`] runs. Fields already
    /// visible in `visibility` do not count as newly shown.
    pub fn restore(spec: &'a FormSpec, data: FormData, visibility: VisibilityMap) -> Self {
        Self {
            spec,
            data,
            previous_visibility: visibility,
        }
    }

    pub fn resume(spec: &'a FormSpec, draft: &Draft) -> Result<Self, SessionError> {
        if draft.form_id != spec.id {
            return Err(SessionError::DraftFormMismatch {
                draft_id: draft.id.clone(),
                draft_form: draft.form_id.clone(),
                form: spec.id.clone(),
            });
        }
        Self::with_initial_data(spec, draft.data.clone())
    }

    /// Resumes only when `code` names this draft, in any accepted spelling.
    pub fn resume_with_code(
        spec: &'a FormSpec,
        draft: &Draft,
        code: &str,
    ) -> Result<Self, SessionError> {
        if !draft.matches_code(code) {
            return Err(SessionError::ResumeCodeMismatch {
                code: code.trim().to_string(),
                draft_id: draft.id.clone(),
            });
        }
        Self::resume(spec, draft)
    }

    pub fn spec(&self) -> &FormSpec {
        self.spec
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    /// Visibility as of the last pass.
    pub fn visibility(&self) -> &VisibilityMap {
        &self.previous_visibility
    }

    pub fn is_visible(&self, field_id: &str) -> bool {
        self.previous_visibility
            .get(field_id)
            .copied()
            .unwrap_or(false)
    }

    /// Records one input and re-evaluates.
    pub fn set_value(
        &mut self,
        field_id: &str,
        value: Value,
    ) -> Result<PassReport, SessionError> {
        self.ensure_field(field_id)?;
        self.data.insert(field_id.to_string(), value);
        self.evaluate()
    }

    pub fn clear_value(&mut self, field_id: &str) -> Result<PassReport, SessionError> {
        self.ensure_field(field_id)?;
        self.data.remove(field_id);
        self.evaluate()
    }

    /// Runs passes until one changes nothing.
    ///
    /// Gives up after the form's `max_passes`; the writes made so far stay applied.
    pub fn evaluate(&mut self) -> Result<PassReport, SessionError> {
        let max_passes = self.spec.max_passes();
        let mut changed: Vec<String> = Vec::new();
        let mut pending = Vec::new();

        for pass in 1..=max_passes {
            let mutations = self.run_pass();
            if mutations.is_empty() {
                log::trace!("form '{}' settled after {} passes", self.spec.id, pass);
                return Ok(PassReport {
                    passes: pass,
                    changed,
                });
            }
            pending.clear();
            for mutation in mutations {
                if !changed.contains(&mutation.field_id) {
                    changed.push(mutation.field_id.clone());
                }
                if !pending.contains(&mutation.field_id) {
                    pending.push(mutation.field_id);
                }
            }
        }

        log::warn!(
            "form '{}' did not converge after {} passes (pending: {})",
            self.spec.id,
            max_passes,
            pending.join(", ")
        );
        Err(SessionError::NonConvergent {
            passes: max_passes,
            pending,
        })
    }

    /// Runs exactly one pass and applies its writes.
    pub fn run_pass(&mut self) -> Vec<Mutation> {
        let plan = plan_pass(self.spec, &self.data, &self.previous_visibility);
        self.previous_visibility = plan.visibility;
        for mutation in &plan.mutations {
            self.data
                .insert(mutation.field_id.clone(), mutation.value.clone());
        }
        plan.mutations
    }

    pub fn save_draft(&self) -> Draft {
        Draft::new(&self.spec.id, self.data.clone())
    }

    /// Saves into an existing draft so its resume code stays valid.
    pub fn update_draft(&self, draft: &mut Draft) -> Result<(), SessionError> {
        if draft.form_id != self.spec.id {
            return Err(SessionError::DraftFormMismatch {
                draft_id: draft.id.clone(),
                draft_form: draft.form_id.clone(),
                form: self.spec.id.clone(),
            });
        }
        draft.update(self.data.clone());
        Ok(())
    }

    /// Validates and freezes the visible values into a submission record.
    pub fn submit(&self, client_meta: Option<ClientMeta>) -> Result<Submission, SubmitError> {
        submit(self.spec, &self.data, client_meta)
    }

    fn ensure_field(&self, field_id: &str) -> Result<(), SessionError> {
        if self.spec.field(field_id).is_some() {
            Ok(())
        } else {
            Err(SessionError::UnknownField(field_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::form::FormPage;
    use crate::spec::logic::{Condition, ConditionalLogic, LogicAction, LogicScope, Operator};
    use serde_json::json;

    fn shown_when(field: Field, source: &str, expected: &str) -> Field {
        Field {
            conditional_logic: Some(ConditionalLogic {
                action: LogicAction::Show,
                scope: LogicScope::All,
                rules: vec![Condition::new(source, Operator::Equals, expected)],
            }),
            ..field
        }
    }

    fn form(fields: Vec<Field>) -> FormSpec {
        FormSpec {
            id: "session-form".into(),
            pages: vec![FormPage {
                id: "p1".into(),
                title: "Page".into(),
                fields,
            }],
            ..FormSpec::default()
        }
    }

    fn dependent_form() -> FormSpec {
        let b = Field {
            conditional_default_value: Some("X".into()),
            ..Field::new("b", FieldType::Text)
        };
        form(vec![
            Field::new("a", FieldType::Text),
            shown_when(b, "a", "yes"),
        ])
    }

    #[test]
    fn transition_default_applies_once_and_respects_edits() {
        let spec = dependent_form();
        let mut initial = FormData::new();
        initial.insert("a".into(), json!(""));
        let mut session = RenderSession::with_initial_data(&spec, initial).unwrap();
        assert!(!session.is_visible("b"));
        assert_eq!(session.data().get("b"), None);

        let report = session.set_value("a", json!("yes")).unwrap();
        assert!(session.is_visible("b"));
        assert_eq!(session.data()["b"], json!("X"));
        assert_eq!(report.changed, vec!["b".to_string()]);

        session.set_value("b", json!("custom")).unwrap();
        session.set_value("a", json!("no")).unwrap();
        assert!(!session.is_visible("b"));
        session.set_value("a", json!("yes")).unwrap();
        assert!(session.is_visible("b"));
        assert_eq!(session.data()["b"], json!("custom"));
    }

    #[test]
    fn transition_default_reapplies_when_value_was_cleared() {
        let spec = dependent_form();
        let mut session = RenderSession::new(&spec).unwrap();
        session.set_value("a", json!("yes")).unwrap();
        session.clear_value("b").unwrap();
        // Still visible: no transition, so the cleared value stays cleared.
        assert_eq!(session.data().get("b"), None);

        session.set_value("a", json!("no")).unwrap();
        session.set_value("a", json!("yes")).unwrap();
        assert_eq!(session.data()["b"], json!("X"));
    }

    #[test]
    fn static_default_is_replaced_on_transition() {
        let b = Field {
            default_value: Some("standard".into()),
            conditional_default_value: Some("special".into()),
            ..Field::new("b", FieldType::Text)
        };
        let spec = form(vec![Field::new("a", FieldType::Text), shown_when(b, "a", "yes")]);
        let mut session = RenderSession::new(&spec).unwrap();
        assert_eq!(session.data()["b"], json!("standard"));
        session.set_value("a", json!("yes")).unwrap();
        assert_eq!(session.data()["b"], json!("special"));
    }

    #[test]
    fn first_appearance_counts_as_transition() {
        let field = Field {
            conditional_default_value: Some("hello".into()),
            ..Field::new("greeting", FieldType::Text)
        };
        let spec = form(vec![field]);
        let session = RenderSession::new(&spec).unwrap();
        assert_eq!(session.data()["greeting"], json!("hello"));
    }

    #[test]
    fn calculations_feed_visibility_within_one_evaluation() {
        let total = Field {
            formula: Some("{field:qty} * {field:price}".into()),
            ..Field::new("total", FieldType::Calculation)
        };
        let bulk = Field {
            conditional_logic: Some(ConditionalLogic {
                action: LogicAction::Show,
                scope: LogicScope::All,
                rules: vec![Condition::new("total", Operator::GreaterThan, 100)],
            }),
            conditional_default_value: Some("bulk".into()),
            ..Field::new("note", FieldType::Text)
        };
        let spec = form(vec![
            Field::new("qty", FieldType::Number),
            Field::new("price", FieldType::Number),
            total,
            bulk,
        ]);
        let mut session = RenderSession::new(&spec).unwrap();
        assert_eq!(session.data()["total"], json!(0));
        assert!(!session.is_visible("note"));

        session.set_value("qty", json!("3")).unwrap();
        let report = session.set_value("price", json!("50")).unwrap();
        assert_eq!(session.data()["total"], json!(150));
        assert!(session.is_visible("note"));
        assert_eq!(session.data()["note"], json!("bulk"));
        assert_eq!(report.changed, vec!["total".to_string(), "note".to_string()]);
        assert_eq!(report.passes, 3);
    }

    #[test]
    fn rejected_formula_keeps_previous_value() {
        let calc = Field {
            formula: Some("{field:x}; drop table".into()),
            ..Field::new("calc", FieldType::Calculation)
        };
        let spec = form(vec![Field::new("x", FieldType::Number), calc]);
        let mut initial = FormData::new();
        initial.insert("calc".into(), json!(42));
        let mut session = RenderSession::with_initial_data(&spec, initial).unwrap();
        session.set_value("x", json!(7)).unwrap();
        assert_eq!(session.data()["calc"], json!(42));
    }

    #[test]
    fn formulas_only_write_calculation_fields() {
        let text = Field {
            formula: Some("1 + 1".into()),
            ..Field::new("plain", FieldType::Text)
        };
        let spec = form(vec![text]);
        let session = RenderSession::new(&spec).unwrap();
        assert_eq!(session.data().get("plain"), None);
    }

    #[test]
    fn self_referencing_formula_aborts() {
        let counter = Field {
            formula: Some("{field:counter} + 1".into()),
            ..Field::new("counter", FieldType::Calculation)
        };
        let spec = form(vec![counter]);
        let err = RenderSession::new(&spec).unwrap_err();
        assert_eq!(
            err,
            SessionError::NonConvergent {
                passes: 5,
                pending: vec!["counter".into()],
            }
        );
    }

    #[test]
    fn converged_session_is_idempotent() {
        let spec = dependent_form();
        let mut session = RenderSession::new(&spec).unwrap();
        session.set_value("a", json!("yes")).unwrap();
        let before = session.data().clone();
        assert!(session.run_pass().is_empty());
        assert!(session.run_pass().is_empty());
        assert_eq!(session.data(), &before);
    }

    #[test]
    fn restore_keeps_transition_memory() {
        let spec = dependent_form();
        let mut session = RenderSession::new(&spec).unwrap();
        session.set_value("a", json!("yes")).unwrap();
        session.clear_value("b").unwrap();

        let mut restored =
            RenderSession::restore(&spec, session.data().clone(), session.visibility().clone());
        let report = restored.evaluate().unwrap();
        assert_eq!(report.passes, 1);
        assert_eq!(restored.data().get("b"), None);

        let fresh = RenderSession::with_initial_data(&spec, session.data().clone()).unwrap();
        assert_eq!(fresh.data()["b"], json!("X"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let spec = dependent_form();
        let mut session = RenderSession::new(&spec).unwrap();
        assert_eq!(
            session.set_value("missing", json!(1)),
            Err(SessionError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn plan_pass_reads_one_snapshot() {
        // `b` depends on `calc`; the calculation's write must not be visible to
        // `b` until the following pass.
        let calc = Field {
            formula: Some("2 + 2".into()),
            ..Field::new("calc", FieldType::Calculation)
        };
        let b = Field {
            conditional_logic: Some(ConditionalLogic {
                action: LogicAction::Show,
                scope: LogicScope::All,
                rules: vec![Condition::new("calc", Operator::Equals, 4)],
            }),
            ..Field::new("b", FieldType::Text)
        };
        let spec = form(vec![calc, b]);
        let plan = plan_pass(&spec, &FormData::new(), &VisibilityMap::new());
        assert!(!plan.visibility["b"]);
        assert_eq!(plan.mutations.len(), 1);
        assert_eq!(plan.mutations[0].cause, MutationCause::Calculation);
    }
}

use crate::condition;
use crate::data::FormData;
use crate::spec::field::Field;
use crate::spec::form::FormSpec;
use crate::spec::logic::{LogicAction, LogicScope};

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Decides whether a field is shown for the given snapshot.
///
/// Only other fields' values are consulted, never their visibility, so every field
/// can be resolved independently.
pub fn is_visible(field: &Field, data: &FormData) -> bool {
    let Some(logic) = &field.conditional_logic else {
        return true;
    };

    let mut results = logic
        .active_rules()
        .map(|rule| condition::evaluate(rule, data))
        .peekable();
    // No active rules: fail open.
    if results.peek().is_none() {
        return true;
    }

    let matched = match logic.scope {
        LogicScope::All => results.all(|matched| matched),
        LogicScope::Any => results.any(|matched| matched),
    };

    match logic.action {
        LogicAction::Show => matched,
        LogicAction::Hide => !matched,
    }
}

pub fn resolve_visibility(spec: &FormSpec, data: &FormData) -> VisibilityMap {
    spec.fields()
        .map(|field| (field.id.clone(), is_visible(field, data)))
        .collect()
}

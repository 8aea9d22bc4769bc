//! Pure step validation and navigation.
//!
//! Nothing here touches a store or a clock; the session in [`super::Wizard`]
//! layers persistence on top.

use crate::error::FieldErrors;
use crate::record::FieldValue;

use super::model::{FieldRule, Format, StepValidation, WizardDraft, WizardSchema};
use super::validation::{is_valid_email, is_valid_phone};

/// Validate one step. An index past the last step is trivially valid.
pub fn validate_step(schema: &WizardSchema, draft: &WizardDraft, step: usize) -> StepValidation {
    let Some(def) = schema.step(step) else {
        return StepValidation {
            valid: true,
            errors: FieldErrors::new(),
        };
    };

    let mut errors = FieldErrors::new();
    for rule in &def.rules {
        if let Some(message) = check_rule(rule, draft) {
            errors.insert(rule.field.clone(), message);
        }
    }
    for check in &def.checks {
        if errors.contains(&check.field) {
            continue;
        }
        if let Some(message) = (check.check)(draft) {
            errors.insert(check.field.clone(), message);
        }
    }

    StepValidation {
        valid: errors.is_empty(),
        errors,
    }
}

fn check_rule(rule: &FieldRule, draft: &WizardDraft) -> Option<String> {
    let value = draft.field(&rule.field);
    let blank = value.map_or(true, FieldValue::is_blank);

    if blank {
        if let Some(message) = &rule.required {
            return Some(message.clone());
        }
    }

    if let Some((format, message)) = &rule.format {
        let text = draft.text(&rule.field);
        let ok = match format {
            _ if text.is_empty() => true,
            Format::Email => is_valid_email(text),
            Format::Phone => is_valid_phone(text),
        };
        if !ok {
            return Some(message.clone());
        }
    }

    if let Some((bound, message)) = &rule.greater_than {
        let n = draft.number(&rule.field).unwrap_or(0.0);
        if n.is_nan() || n <= *bound {
            return Some(message.clone());
        }
    }

    None
}

/// Validate every step in order; the first failure wins.
pub fn validate_all(schema: &WizardSchema, draft: &WizardDraft) -> Result<(), (usize, FieldErrors)> {
    for step in 0..schema.step_count() {
        let result = validate_step(schema, draft, step);
        if !result.valid {
            return Err((step, result.errors));
        }
    }
    Ok(())
}

/// Replace the errors owned by `step` with `fresh`.
pub(crate) fn replace_step_errors(schema: &WizardSchema, draft: &mut WizardDraft, step: usize, fresh: FieldErrors) {
    if let Some(def) = schema.step(step) {
        draft.errors.clear_fields(def.error_fields());
    }
    draft.errors.extend(fresh);
}

/// Move forward one step if the current step validates.
pub fn advance(schema: &WizardSchema, mut draft: WizardDraft) -> WizardDraft {
    let step = draft.current_step;
    let result = validate_step(schema, &draft, step);
    replace_step_errors(schema, &mut draft, step, result.errors);
    if result.valid {
        draft.current_step = (step + 1).min(schema.last_step());
    }
    draft
}

/// Move back one step; never validates.
pub fn retreat(mut draft: WizardDraft) -> WizardDraft {
    draft.current_step = draft.current_step.saturating_sub(1);
    draft
}

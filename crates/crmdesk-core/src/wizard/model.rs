//! Wizard domain models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::record::{EntityKind, FieldMap, FieldValue, NewRecord, Record};

/// An in-progress record under construction by a wizard.
///
/// This is also the persisted draft shape, so every field defaults when
/// missing from a stored draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardDraft {
    pub fields: FieldMap,
    pub current_step: usize,
    pub errors: FieldErrors,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, String>,
    pub is_dirty: bool,
}

impl WizardDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn at_step(mut self, step: usize) -> Self {
        self.current_step = step;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Trimmed text of a field; empty when unset or not text.
    pub fn text(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .unwrap_or("")
    }

    /// Trimmed text, `None` when blank.
    pub fn non_blank(&self, name: &str) -> Option<&str> {
        Some(self.text(name)).filter(|s| !s.is_empty())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(FieldValue::as_number)
    }

    /// Whether anything in the draft counts as user input.
    pub fn has_content(&self) -> bool {
        self.fields.values().any(FieldValue::has_content)
            || !self.tags.is_empty()
            || !self.custom_fields.is_empty()
    }
}

/// Whether the wizard creates a new record or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WizardMode {
    #[default]
    Create,
    Edit { record_id: String },
}

impl WizardMode {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }
}

/// Initial values for a wizard session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardSeed {
    pub fields: FieldMap,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, String>,
}

impl From<FieldMap> for WizardSeed {
    fn from(fields: FieldMap) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }
}

impl From<&Record> for WizardSeed {
    fn from(record: &Record) -> Self {
        Self {
            fields: record.fields.clone(),
            tags: record.tags.clone(),
            custom_fields: record.custom_fields.clone(),
        }
    }
}

/// Text format checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Email,
    Phone,
}

/// Validation for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub field: String,
    /// Message when the field is blank; `None` means optional.
    pub required: Option<String>,
    /// Checked only when the field has a value.
    pub format: Option<(Format, String)>,
    /// Exclusive lower bound; an unset number counts as 0.
    pub greater_than: Option<(f64, String)>,
}

impl FieldRule {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            required: None,
            format: None,
            greater_than: None,
        }
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn format(mut self, format: Format, message: impl Into<String>) -> Self {
        self.format = Some((format, message.into()));
        self
    }

    pub fn greater_than(mut self, bound: f64, message: impl Into<String>) -> Self {
        self.greater_than = Some((bound, message.into()));
        self
    }
}

/// Rule spanning several fields; reports its message under `field`.
#[derive(Debug, Clone)]
pub struct CrossFieldRule {
    pub field: String,
    pub check: fn(&WizardDraft) -> Option<String>,
}

impl CrossFieldRule {
    pub fn new(field: impl Into<String>, check: fn(&WizardDraft) -> Option<String>) -> Self {
        Self {
            field: field.into(),
            check,
        }
    }
}

/// One wizard step.
#[derive(Debug, Clone)]
pub struct StepDef {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Fields edited on this step, validated or not.
    pub fields: Vec<String>,
    pub rules: Vec<FieldRule>,
    pub checks: Vec<CrossFieldRule>,
}

impl StepDef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            fields: Vec::new(),
            rules: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn check(mut self, check: CrossFieldRule) -> Self {
        self.checks.push(check);
        self
    }

    /// Every field name whose error this step owns.
    pub fn error_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .chain(self.rules.iter().map(|r| &r.field))
            .chain(self.checks.iter().map(|c| &c.field))
            .map(String::as_str)
    }
}

/// A complete wizard definition for one entity kind.
#[derive(Debug, Clone)]
pub struct WizardSchema {
    pub kind: EntityKind,
    pub steps: Vec<StepDef>,
    pub defaults: FieldMap,
    pub transform: fn(&WizardDraft) -> NewRecord,
}

impl WizardSchema {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, index: usize) -> Option<&StepDef> {
        self.steps.get(index)
    }

    pub fn last_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Empty draft with the schema defaults applied.
    pub fn initial_draft(&self) -> WizardDraft {
        WizardDraft {
            fields: self.defaults.clone(),
            ..WizardDraft::default()
        }
    }

    /// Whether the draft holds anything beyond the schema defaults.
    pub fn has_user_content(&self, draft: &WizardDraft) -> bool {
        draft
            .fields
            .iter()
            .any(|(name, value)| value.has_content() && self.defaults.get(name) != Some(value))
            || !draft.tags.is_empty()
            || !draft.custom_fields.is_empty()
    }

    pub fn to_record(&self, draft: &WizardDraft) -> NewRecord {
        (self.transform)(draft)
    }
}

/// Result of validating one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepValidation {
    pub valid: bool,
    pub errors: FieldErrors,
}

//! Record domain models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The business entities a pipeline can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Lead,
    Deal,
    Account,
    Contact,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Lead, Self::Deal, Self::Account, Self::Contact];

    /// Parse from a singular or plural name (`lead`, `leads`, ...).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lead" | "leads" => Some(Self::Lead),
            "deal" | "deals" => Some(Self::Deal),
            "account" | "accounts" => Some(Self::Account),
            "contact" | "contacts" => Some(Self::Contact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Deal => "deal",
            Self::Account => "account",
            Self::Contact => "contact",
        }
    }

    /// REST collection segment, as in `/api/<resource>`.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Lead => "leads",
            Self::Deal => "deals",
            Self::Account => "accounts",
            Self::Contact => "contacts",
        }
    }

    /// Draft slot name, before namespacing.
    pub fn draft_key(&self) -> String {
        format!("{}-draft", self.as_str())
    }

    /// JSON key that carries the pipeline stage on the wire.
    pub fn stage_field(&self) -> &'static str {
        match self {
            Self::Lead | Self::Deal => "stage",
            Self::Account => "accountType",
            Self::Contact => "status",
        }
    }

    /// Numeric field summed per board column.
    pub fn value_field(&self) -> &'static str {
        match self {
            Self::Lead => "estimatedValue",
            Self::Deal => "value",
            Self::Account => "annualRevenue",
            Self::Contact => "score",
        }
    }

    /// Ordered default stages for this kind.
    pub fn default_stages(&self) -> Vec<StageDef> {
        let defs: &[(&str, &str, Option<u8>)] = match self {
            Self::Lead => &[
                ("new", "New", Some(10)),
                ("contacted", "Contacted", Some(20)),
                ("qualified", "Qualified", Some(40)),
                ("proposal", "Proposal", Some(60)),
                ("won", "Won", Some(100)),
                ("lost", "Lost", Some(0)),
            ],
            Self::Deal => &[
                ("qualification", "Qualification", Some(10)),
                ("proposal", "Proposal", Some(50)),
                ("negotiation", "Negotiation", Some(75)),
                ("closed-won", "Closed Won", Some(100)),
                ("closed-lost", "Closed Lost", Some(0)),
            ],
            Self::Account => &[
                ("prospect", "Prospect", None),
                ("customer", "Customer", None),
                ("partner", "Partner", None),
                ("vendor", "Vendor", None),
                ("competitor", "Competitor", None),
            ],
            Self::Contact => &[
                ("active", "Active", None),
                ("inactive", "Inactive", None),
                ("bounced", "Bounced", None),
                ("unsubscribed", "Unsubscribed", None),
            ],
        };
        defs.iter()
            .map(|(id, name, probability)| StageDef {
                id: id.to_string(),
                name: name.to_string(),
                probability: *probability,
            })
            .collect()
    }

    pub fn first_stage(&self) -> String {
        self.default_stages()
            .into_iter()
            .next()
            .map(|s| s.id)
            .unwrap_or_default()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline stage as known to a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<u8>,
}

impl StageDef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            probability: None,
        }
    }
}

/// A typed field value; open-ended forms map field names to these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Whether a form would consider this field filled in.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Bool(_) => false,
        }
    }

    /// Whether this value counts as user content for draft auto-save.
    pub fn has_content(&self) -> bool {
        match self {
            Self::Text(s) => !s.trim().is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Number(n) => *n > 0.0,
            Self::Bool(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; numeric text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Display form used by search and exact filters.
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::List(items) => items.join(" "),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Field name → value.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A persisted business entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub kind: EntityKind,
    pub stage: String,
    pub fields: FieldMap,
    pub custom_fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Display name, falling back through the usual name-bearing fields.
    pub fn display_name(&self) -> String {
        for key in ["name", "title"] {
            if let Some(v) = self.fields.get(key) {
                if !v.is_blank() {
                    return v.display();
                }
            }
        }
        let first = self.fields.get("firstName").map(FieldValue::display);
        let last = self.fields.get("lastName").map(FieldValue::display);
        match (first, last) {
            (Some(f), Some(l)) => format!("{f} {l}").trim().to_string(),
            (Some(f), None) => f,
            (None, Some(l)) => l,
            (None, None) => self.id.clone(),
        }
    }

    /// Text of a field as search and filters see it.
    ///
    /// Resolves domain fields, `id`, the stage (under `stage` and the kind's
    /// stage key), `tags` and `customFields.<name>`.
    pub fn text(&self, field: &str) -> Option<String> {
        if field == "id" {
            return Some(self.id.clone());
        }
        if field == "stage" || field == self.kind.stage_field() {
            return Some(self.stage.clone());
        }
        if field == "tags" {
            return (!self.tags.is_empty()).then(|| self.tags.join(" "));
        }
        if let Some(name) = field.strip_prefix("customFields.") {
            return self.custom_fields.get(name).cloned();
        }
        self.fields.get(field).map(FieldValue::display)
    }

    /// Numeric value of a field, for column totals.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(FieldValue::as_number)
    }
}

/// Body of a create call.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub kind: EntityKind,
    pub stage: String,
    pub fields: FieldMap,
    pub custom_fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

impl NewRecord {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            stage: kind.first_stage(),
            fields: FieldMap::new(),
            custom_fields: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Partial update body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub stage: Option<String>,
    pub fields: FieldMap,
    /// Replaces the tag list when set.
    pub tags: Option<Vec<String>>,
    /// Replaces the custom field map when set.
    pub custom_fields: Option<BTreeMap<String, String>>,
}

impl RecordPatch {
    pub fn stage(stage: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage.is_none()
            && self.fields.is_empty()
            && self.tags.is_none()
            && self.custom_fields.is_none()
    }
}

//! Records and their wire shape.
//!
//! The external store speaks flat camelCase JSON objects. Everything entering
//! the crate goes through [`Record::from_json`], which validates the id and
//! coerces tags, custom fields and timestamps once, so the rest of the crate
//! never re-checks shapes.

pub mod model;

pub use model::{EntityKind, FieldMap, FieldValue, NewRecord, Record, RecordPatch, StageDef};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CrmError, CrmResult};

const RESERVED_KEYS: &[&str] = &["id", "customFields", "tags", "createdAt", "updatedAt"];

impl Record {
    /// Validate and coerce one wire object into a record.
    pub fn from_json(kind: EntityKind, value: &Value) -> CrmResult<Record> {
        let obj = value
            .as_object()
            .ok_or_else(|| CrmError::invalid_record(format!("{kind} payload is not an object")))?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(CrmError::invalid_record(format!("{kind} is missing an id"))),
        };

        let stage = read_stage(kind, obj).unwrap_or_else(|| kind.first_stage());

        let mut fields = FieldMap::new();
        for (key, raw) in obj {
            if is_reserved(kind, key) {
                continue;
            }
            if let Some(value) = field_value_from_json(raw) {
                fields.insert(key.clone(), value);
            }
        }

        Ok(Record {
            id,
            kind,
            stage,
            fields,
            custom_fields: custom_fields_from_json(obj.get("customFields")),
            tags: tags_from_json(obj.get("tags")),
            created_at: timestamp_from_json(obj.get("createdAt")),
            updated_at: timestamp_from_json(obj.get("updatedAt")),
        })
    }

    /// Coerce a JSON array of records, failing on the first bad element.
    pub fn many_from_json(kind: EntityKind, value: &Value) -> CrmResult<Vec<Record>> {
        let items = value
            .as_array()
            .ok_or_else(|| CrmError::invalid_record(format!("{kind} collection is not an array")))?;
        items.iter().map(|item| Record::from_json(kind, item)).collect()
    }

    /// Flat wire form of this record.
    pub fn to_json(&self) -> Value {
        let mut obj = fields_to_json(&self.fields);
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert(self.kind.stage_field().into(), Value::String(self.stage.clone()));
        obj.insert("customFields".into(), custom_fields_to_json(&self.custom_fields));
        obj.insert("tags".into(), tags_to_json(&self.tags));
        if let Some(ts) = self.created_at {
            obj.insert("createdAt".into(), Value::String(ts.to_rfc3339()));
        }
        if let Some(ts) = self.updated_at {
            obj.insert("updatedAt".into(), Value::String(ts.to_rfc3339()));
        }
        Value::Object(obj)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl NewRecord {
    /// Coerce a create body. Ids and timestamps in the body are ignored.
    pub fn from_json(kind: EntityKind, value: &Value) -> CrmResult<NewRecord> {
        let obj = value
            .as_object()
            .ok_or_else(|| CrmError::invalid_record(format!("{kind} payload is not an object")))?;

        let mut fields = FieldMap::new();
        for (key, raw) in obj {
            if is_reserved(kind, key) {
                continue;
            }
            if let Some(value) = field_value_from_json(raw) {
                fields.insert(key.clone(), value);
            }
        }

        Ok(NewRecord {
            kind,
            stage: read_stage(kind, obj).unwrap_or_else(|| kind.first_stage()),
            fields,
            custom_fields: custom_fields_from_json(obj.get("customFields")),
            tags: tags_from_json(obj.get("tags")),
        })
    }

    pub fn to_json(&self) -> Value {
        let mut obj = fields_to_json(&self.fields);
        obj.insert(self.kind.stage_field().into(), Value::String(self.stage.clone()));
        obj.insert("customFields".into(), custom_fields_to_json(&self.custom_fields));
        obj.insert("tags".into(), tags_to_json(&self.tags));
        Value::Object(obj)
    }
}

impl RecordPatch {
    pub fn from_json(kind: EntityKind, value: &Value) -> CrmResult<RecordPatch> {
        let obj = value
            .as_object()
            .ok_or_else(|| CrmError::invalid_record(format!("{kind} patch is not an object")))?;

        let mut fields = FieldMap::new();
        for (key, raw) in obj {
            if is_reserved(kind, key) {
                continue;
            }
            if let Some(value) = field_value_from_json(raw) {
                fields.insert(key.clone(), value);
            }
        }

        Ok(RecordPatch {
            stage: read_stage(kind, obj),
            fields,
            tags: obj.get("tags").map(|raw| tags_from_json(Some(raw))),
            custom_fields: obj
                .get("customFields")
                .map(|raw| custom_fields_from_json(Some(raw))),
        })
    }

    pub fn to_json(&self, kind: EntityKind) -> Value {
        let mut obj = fields_to_json(&self.fields);
        if let Some(stage) = &self.stage {
            obj.insert(kind.stage_field().into(), Value::String(stage.clone()));
        }
        if let Some(tags) = &self.tags {
            obj.insert("tags".into(), tags_to_json(tags));
        }
        if let Some(custom) = &self.custom_fields {
            obj.insert("customFields".into(), custom_fields_to_json(custom));
        }
        Value::Object(obj)
    }

    /// Apply this patch to a record in place.
    pub fn apply_to(&self, record: &mut Record) {
        if let Some(stage) = &self.stage {
            record.stage = stage.clone();
        }
        for (key, value) in &self.fields {
            record.fields.insert(key.clone(), value.clone());
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(custom) = &self.custom_fields {
            record.custom_fields = custom.clone();
        }
        record.updated_at = Some(Utc::now());
    }
}

fn is_reserved(kind: EntityKind, key: &str) -> bool {
    RESERVED_KEYS.contains(&key) || key == "stage" || key == kind.stage_field()
}

fn read_stage(kind: EntityKind, obj: &Map<String, Value>) -> Option<String> {
    [kind.stage_field(), "stage"]
        .into_iter()
        .filter_map(|key| obj.get(key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}

fn field_value_from_json(raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Array(items) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect();
            Some(match strings {
                Some(list) => FieldValue::List(list),
                None => FieldValue::Text(raw.to_string()),
            })
        }
        Value::Object(_) => {
            debug!("storing nested object field as JSON text");
            Some(FieldValue::Text(raw.to_string()))
        }
    }
}

fn custom_fields_from_json(raw: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(obj)) = raw else {
        return BTreeMap::new();
    };
    obj.iter()
        .filter_map(|(k, v)| {
            let text = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), text))
        })
        .collect()
}

fn tags_from_json(raw: Option<&Value>) -> Vec<String> {
    let pieces: Vec<String> = match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let tag = piece.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn timestamp_from_json(raw: Option<&Value>) -> Option<DateTime<Utc>> {
    raw.and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn fields_to_json(fields: &FieldMap) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|json| (k.clone(), json)))
        .collect()
}

fn custom_fields_to_json(fields: &BTreeMap<String, String>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn tags_to_json(tags: &[String]) -> Value {
    Value::Array(tags.iter().cloned().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_coerces_shapes() {
        let raw = json!({
            "id": 42,
            "name": "Acme renewal",
            "value": 1200.5,
            "stage": "proposal",
            "tags": "hot, enterprise ,hot,",
            "customFields": { "region": "EMEA", "seats": 40, "empty": null },
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "yesterday"
        });

        let record = Record::from_json(EntityKind::Deal, &raw).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.stage, "proposal");
        assert_eq!(record.tags, vec!["hot", "enterprise"]);
        assert_eq!(record.custom_fields.get("seats").map(String::as_str), Some("40"));
        assert!(!record.custom_fields.contains_key("empty"));
        assert!(record.created_at.is_some());
        assert!(record.updated_at.is_none());
        assert_eq!(record.number("value"), Some(1200.5));
        assert!(record.field("stage").is_none());
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = Record::from_json(EntityKind::Lead, &json!({ "name": "x" })).unwrap_err();
        assert!(matches!(err, CrmError::InvalidRecord(_)));
    }

    #[test]
    fn test_stage_key_per_kind() {
        let raw = json!({ "id": "a1", "name": "Globex", "accountType": "customer" });
        let record = Record::from_json(EntityKind::Account, &raw).unwrap();
        assert_eq!(record.stage, "customer");
        assert_eq!(record.text("accountType").as_deref(), Some("customer"));
        assert_eq!(record.to_json()["accountType"], "customer");
    }

    #[test]
    fn test_missing_stage_defaults_to_first() {
        let record = Record::from_json(EntityKind::Lead, &json!({ "id": "l1" })).unwrap();
        assert_eq!(record.stage, "new");
    }

    #[test]
    fn test_patch_applies_stage_and_fields() {
        let mut record = Record::from_json(EntityKind::Deal, &json!({ "id": "d1", "stage": "proposal" })).unwrap();
        let patch = RecordPatch::from_json(EntityKind::Deal, &json!({ "stage": "negotiation", "probability": 75 })).unwrap();
        patch.apply_to(&mut record);
        assert_eq!(record.stage, "negotiation");
        assert_eq!(record.number("probability"), Some(75.0));
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn test_text_lookup() {
        let raw = json!({
            "id": "c1",
            "firstName": "Sarah",
            "lastName": "Chen",
            "tags": ["vip", "board"],
            "customFields": { "team": "Platform" }
        });
        let record = Record::from_json(EntityKind::Contact, &raw).unwrap();
        assert_eq!(record.display_name(), "Sarah Chen");
        assert_eq!(record.text("tags").as_deref(), Some("vip board"));
        assert_eq!(record.text("customFields.team").as_deref(), Some("Platform"));
        assert_eq!(record.text("status").as_deref(), Some("active"));
    }
}

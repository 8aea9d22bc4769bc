//! Field format checks and tag/custom-field policy.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CrmError, CrmResult};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

// optional '+', 1-16 digits, no leading zero
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("valid phone regex"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Whitespace inside the number is ignored.
pub fn is_valid_phone(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    PHONE_RE.is_match(&compact)
}

/// Trim and check a tag against the existing list. Returns the tag to add.
pub fn check_tag(tags: &[String], tag: &str) -> CrmResult<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(CrmError::validation("tags", "Tag cannot be empty"));
    }
    if tags.iter().any(|t| t == tag) {
        return Err(CrmError::DuplicateTag(tag.to_string()));
    }
    Ok(tag.to_string())
}

/// Trim and check a custom field. Existing names are never overwritten.
pub fn check_custom_field(
    existing: &BTreeMap<String, String>,
    name: &str,
    value: &str,
) -> CrmResult<(String, String)> {
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() {
        return Err(CrmError::validation("customFields", "Field name is required"));
    }
    if value.is_empty() {
        return Err(CrmError::validation("customFields", "Field value is required"));
    }
    if existing.contains_key(name) {
        return Err(CrmError::DuplicateCustomField(name.to_string()));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("sarah.chen@acme.co.uk"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@c.com"));
    }

    #[test]
    fn test_phone() {
        assert!(is_valid_phone("+1 415 555 0100"));
        assert!(is_valid_phone("4155550100"));
        assert!(!is_valid_phone("0415550100"));
        assert!(!is_valid_phone("415-555-0100"));
        assert!(!is_valid_phone("+12345678901234567"));
    }

    #[test]
    fn test_tag_policy() {
        let tags = vec!["hot".to_string()];
        assert_eq!(check_tag(&tags, "  vip ").unwrap(), "vip");
        assert!(matches!(check_tag(&tags, "hot"), Err(CrmError::DuplicateTag(_))));
        // case-sensitive
        assert!(check_tag(&tags, "Hot").is_ok());
        assert!(matches!(check_tag(&tags, "   "), Err(CrmError::Validation(_))));
    }

    #[test]
    fn test_custom_field_policy() {
        let mut existing = BTreeMap::new();
        existing.insert("region".to_string(), "EMEA".to_string());
        assert!(matches!(
            check_custom_field(&existing, " region ", "APAC"),
            Err(CrmError::DuplicateCustomField(_))
        ));
        assert!(check_custom_field(&existing, "seats", " ").is_err());
        assert_eq!(
            check_custom_field(&existing, " seats ", " 40 ").unwrap(),
            ("seats".to_string(), "40".to_string())
        );
    }
}

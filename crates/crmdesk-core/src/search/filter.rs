//! Exact-match filters.

use std::collections::BTreeMap;

use crate::record::Record;

/// Field → required value. Values `""` and `all` mean "no filter".
pub type ExactFilters = BTreeMap<String, String>;

/// Whether a filter value is the "no filter" sentinel.
pub fn is_unset(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("all")
}

/// Whether any filter in the map actually constrains results.
pub fn has_active_filters(filters: &ExactFilters) -> bool {
    filters.values().any(|v| !is_unset(v))
}

/// Keep the records that satisfy every active filter, in input order.
pub fn apply_exact_filters<'a>(records: Vec<&'a Record>, filters: &ExactFilters) -> Vec<&'a Record> {
    let active: Vec<(&str, &str)> = filters
        .iter()
        .filter(|(_, value)| !is_unset(value))
        .map(|(field, value)| (field.as_str(), value.trim()))
        .collect();

    if active.is_empty() {
        return records;
    }

    records
        .into_iter()
        .filter(|record| {
            active.iter().all(|(field, expected)| {
                record
                    .text(field)
                    .is_some_and(|actual| actual == *expected)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntityKind;
    use serde_json::json;

    fn lead(id: &str, industry: &str, status: &str) -> Record {
        Record::from_json(
            EntityKind::Lead,
            &json!({ "id": id, "industry": industry, "status": status }),
        )
        .unwrap()
    }

    #[test]
    fn test_sentinels_are_noops() {
        let records = vec![lead("1", "Finance", "new"), lead("2", "Retail", "contacted")];
        let refs: Vec<&Record> = records.iter().collect();
        let mut filters = ExactFilters::new();
        filters.insert("industry".into(), "all".into());
        filters.insert("status".into(), "".into());
        let out = apply_exact_filters(refs.clone(), &filters);
        assert_eq!(out, refs);
        assert!(!has_active_filters(&filters));
    }

    #[test]
    fn test_filters_and_combine() {
        let records = vec![
            lead("1", "Finance", "new"),
            lead("2", "Finance", "contacted"),
            lead("3", "Retail", "new"),
        ];
        let mut filters = ExactFilters::new();
        filters.insert("industry".into(), "Finance".into());
        filters.insert("status".into(), "new".into());
        let out = apply_exact_filters(records.iter().collect(), &filters);
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_missing_field_excluded() {
        let records = vec![lead("1", "Finance", "new")];
        let mut filters = ExactFilters::new();
        filters.insert("source".into(), "Referral".into());
        assert!(apply_exact_filters(records.iter().collect(), &filters).is_empty());
    }
}

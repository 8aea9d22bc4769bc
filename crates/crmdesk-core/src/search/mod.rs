//! Fuzzy search and filter composition over a record snapshot.
//!
//! The index is rebuilt from scratch whenever the collection changes; at CRM
//! collection sizes there is nothing to gain from incremental updates.

pub mod filter;
pub mod fuzzy;

pub use filter::{apply_exact_filters, has_active_filters, is_unset, ExactFilters};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{EntityKind, Record};

/// Default match threshold; lower is stricter.
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Floor for exact-hit scores so weights still order multi-key matches.
const SCORE_EPSILON: f64 = 1e-3;

/// A searched field and its relative weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKey {
    pub field: String,
    pub weight: f64,
}

impl WeightedKey {
    pub fn new(field: impl Into<String>, weight: f64) -> Self {
        Self {
            field: field.into(),
            weight,
        }
    }
}

/// Default searched fields per entity kind.
pub fn default_keys(kind: EntityKind) -> Vec<WeightedKey> {
    let keys: &[(&str, f64)] = match kind {
        EntityKind::Lead => &[
            ("name", 0.4),
            ("email", 0.2),
            ("company", 0.2),
            ("title", 0.1),
            ("industry", 0.1),
        ],
        EntityKind::Deal => &[
            ("name", 0.4),
            ("title", 0.2),
            ("description", 0.2),
            ("stage", 0.1),
            ("notes", 0.1),
        ],
        EntityKind::Account => &[
            ("name", 1.0),
            ("industry", 1.0),
            ("domain", 1.0),
            ("accountType", 1.0),
            ("description", 1.0),
        ],
        EntityKind::Contact => &[
            ("firstName", 1.0),
            ("lastName", 1.0),
            ("email", 1.0),
            ("position", 1.0),
            ("department", 1.0),
            ("accountName", 1.0),
        ],
    };
    keys.iter().map(|(f, w)| WeightedKey::new(*f, *w)).collect()
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub record: &'a Record,
    pub score: f64,
}

/// Why a composed search came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The collection itself is empty.
    NoRecords,
    /// The free-text query matched nothing.
    NoSearchMatches,
    /// The query matched, but the exact filters removed everything.
    FilteredOut,
}

/// Result of [`SearchIndex::compose`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome<'a> {
    pub records: Vec<&'a Record>,
    pub empty_reason: Option<EmptyReason>,
}

/// Precomputed fuzzy index over one snapshot.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    snapshot: Arc<Vec<Record>>,
    keys: Vec<WeightedKey>,
    threshold: f64,
    // entries[record][key] = lowercased field text
    entries: Vec<Vec<Option<Vec<char>>>>,
}

impl SearchIndex {
    /// Build an index. Weights are normalised to sum to 1; non-positive
    /// weights fall back to equal weighting.
    pub fn build(snapshot: Arc<Vec<Record>>, keys: Vec<WeightedKey>, threshold: f64) -> Self {
        let keys = normalise_weights(keys);
        let entries = snapshot
            .iter()
            .map(|record| {
                keys.iter()
                    .map(|key| {
                        record
                            .text(&key.field)
                            .filter(|t| !t.trim().is_empty())
                            .map(|t| t.to_lowercase().chars().collect())
                    })
                    .collect()
            })
            .collect();

        debug!(records = snapshot.len(), keys = keys.len(), threshold, "Built search index");

        Self {
            snapshot,
            keys,
            threshold: threshold.clamp(0.0, 1.0),
            entries,
        }
    }

    pub fn with_defaults(kind: EntityKind, snapshot: Arc<Vec<Record>>) -> Self {
        Self::build(snapshot, default_keys(kind), DEFAULT_THRESHOLD)
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn keys(&self) -> &[WeightedKey] {
        &self.keys
    }

    /// Ranked matches with scores. An empty query returns every record in
    /// collection order with score 0.
    pub fn search_scored(&self, query: &str) -> Vec<SearchHit<'_>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self
                .snapshot
                .iter()
                .map(|record| SearchHit { record, score: 0.0 })
                .collect();
        }

        let pattern: Vec<char> = query.chars().collect();
        let mut hits: Vec<SearchHit<'_>> = self
            .snapshot
            .iter()
            .zip(&self.entries)
            .filter_map(|(record, texts)| {
                self.score_record(&pattern, texts)
                    .map(|score| SearchHit { record, score })
            })
            .collect();

        // sort_by is stable: equal scores keep collection order
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits
    }

    /// Ranked matching records, best first.
    pub fn search(&self, query: &str) -> Vec<&Record> {
        self.search_scored(query)
            .into_iter()
            .map(|hit| hit.record)
            .collect()
    }

    /// Search first, then narrow with exact filters.
    pub fn compose(&self, query: &str, filters: &ExactFilters) -> SearchOutcome<'_> {
        let matched = self.search(query);
        let matched_any = !matched.is_empty();
        let records = apply_exact_filters(matched, filters);

        let empty_reason = if !records.is_empty() {
            None
        } else if self.snapshot.is_empty() {
            Some(EmptyReason::NoRecords)
        } else if !matched_any {
            Some(EmptyReason::NoSearchMatches)
        } else {
            Some(EmptyReason::FilteredOut)
        };

        SearchOutcome {
            records,
            empty_reason,
        }
    }

    fn score_record(&self, pattern: &[char], texts: &[Option<Vec<char>>]) -> Option<f64> {
        let mut total = 1.0;
        let mut matched = false;
        for (key, text) in self.keys.iter().zip(texts) {
            let Some(text) = text else { continue };
            let score = fuzzy::match_score(pattern, text);
            if score <= self.threshold {
                matched = true;
                total *= score.max(SCORE_EPSILON).powf(key.weight);
            }
        }
        matched.then_some(total)
    }
}

fn normalise_weights(keys: Vec<WeightedKey>) -> Vec<WeightedKey> {
    let sum: f64 = keys.iter().map(|k| k.weight.max(0.0)).sum();
    let count = keys.len().max(1) as f64;
    keys.into_iter()
        .map(|k| {
            let weight = if sum > 0.0 {
                k.weight.max(0.0) / sum
            } else {
                1.0 / count
            };
            WeightedKey { weight, ..k }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leads(names: &[&str]) -> Arc<Vec<Record>> {
        Arc::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    Record::from_json(EntityKind::Lead, &json!({ "id": i.to_string(), "name": name }))
                        .unwrap()
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_query_returns_all_in_order() {
        let index = SearchIndex::with_defaults(EntityKind::Lead, leads(&["Zed", "Amy", "Bob"]));
        let names: Vec<String> = index.search("  ").iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["Zed", "Amy", "Bob"]);
    }

    #[test]
    fn test_exact_hit_ranks_before_typo() {
        let index = SearchIndex::with_defaults(EntityKind::Lead, leads(&["Sara Chem", "Sarah Chen"]));
        let names: Vec<String> = index.search("chen").iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["Sarah Chen", "Sara Chem"]);
    }

    #[test]
    fn test_ties_keep_collection_order() {
        let index = SearchIndex::with_defaults(EntityKind::Lead, leads(&["Chen B", "Chen A"]));
        let names: Vec<String> = index.search("chen").iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["Chen B", "Chen A"]);
    }

    #[test]
    fn test_threshold_controls_permissiveness() {
        let snapshot = leads(&["Jonathan"]);
        let strict = SearchIndex::build(snapshot.clone(), default_keys(EntityKind::Lead), 0.0);
        let loose = SearchIndex::build(snapshot, default_keys(EntityKind::Lead), 0.4);
        assert!(strict.search("jonatan").is_empty());
        assert_eq!(loose.search("jonatan").len(), 1);
    }

    #[test]
    fn test_compose_reports_empty_reason() {
        let snapshot = Arc::new(vec![Record::from_json(
            EntityKind::Lead,
            &json!({ "id": "1", "name": "Sarah Chen", "industry": "Finance" }),
        )
        .unwrap()]);
        let index = SearchIndex::with_defaults(EntityKind::Lead, snapshot);

        let mut filters = ExactFilters::new();
        filters.insert("industry".into(), "Retail".into());
        assert_eq!(
            index.compose("chen", &filters).empty_reason,
            Some(EmptyReason::FilteredOut)
        );
        assert_eq!(
            index.compose("qqqqqq", &ExactFilters::new()).empty_reason,
            Some(EmptyReason::NoSearchMatches)
        );

        let empty = SearchIndex::with_defaults(EntityKind::Lead, Arc::new(Vec::new()));
        assert_eq!(
            empty.compose("", &ExactFilters::new()).empty_reason,
            Some(EmptyReason::NoRecords)
        );
    }

    #[test]
    fn test_weights_normalised() {
        let keys = normalise_weights(vec![WeightedKey::new("a", 3.0), WeightedKey::new("b", 1.0)]);
        assert!((keys[0].weight - 0.75).abs() < 1e-9);
        let equal = normalise_weights(vec![WeightedKey::new("a", 0.0), WeightedKey::new("b", 0.0)]);
        assert!((equal[1].weight - 0.5).abs() < 1e-9);
    }
}

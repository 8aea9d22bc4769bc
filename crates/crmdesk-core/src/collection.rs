//! Cached record collection per entity kind.
//!
//! Views share one immutable snapshot (`Arc<Vec<Record>>`). A refresh swaps
//! the whole snapshot; the search index is rebuilt lazily on first use after
//! a swap.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::board::PipelineBoard;
use crate::error::FetchError;
use crate::record::{EntityKind, Record};
use crate::search::{default_keys, ExactFilters, SearchIndex, SearchOutcome, WeightedKey, DEFAULT_THRESHOLD};
use crate::store::RecordStore;

pub struct RecordCollection {
    kind: EntityKind,
    store: Arc<dyn RecordStore>,
    snapshot: Arc<Vec<Record>>,
    generation: u64,
    stale: bool,
    keys: Vec<WeightedKey>,
    threshold: f64,
    index: Option<(u64, SearchIndex)>,
}

impl RecordCollection {
    /// Empty, stale collection; call [`refresh`](Self::refresh) to load.
    pub fn new(kind: EntityKind, store: Arc<dyn RecordStore>) -> Self {
        Self {
            kind,
            store,
            snapshot: Arc::new(Vec::new()),
            generation: 0,
            stale: true,
            keys: default_keys(kind),
            threshold: DEFAULT_THRESHOLD,
            index: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self.index = None;
        self
    }

    pub fn with_keys(mut self, keys: Vec<WeightedKey>) -> Self {
        self.keys = keys;
        self.index = None;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn snapshot(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.snapshot)
    }

    /// Bumped on every successful refresh.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Mark the snapshot outdated, e.g. after a successful create.
    pub fn invalidate(&mut self) {
        debug!(kind = %self.kind, "Collection invalidated");
        self.stale = true;
    }

    /// Refetch the collection. On failure the previous snapshot is kept.
    pub async fn refresh(&mut self) -> Result<Arc<Vec<Record>>, FetchError> {
        let fetched = self
            .store
            .fetch_collection(self.kind)
            .await
            .map_err(|source| FetchError {
                kind: self.kind,
                source,
            })?;

        let records = dedup_by_id(self.kind, fetched);
        self.snapshot = Arc::new(records);
        self.generation += 1;
        self.stale = false;

        info!(kind = %self.kind, records = self.snapshot.len(), generation = self.generation, "Collection refreshed");
        Ok(self.snapshot())
    }

    /// Refresh only when stale.
    pub async fn ensure_fresh(&mut self) -> Result<Arc<Vec<Record>>, FetchError> {
        if self.stale {
            self.refresh().await
        } else {
            Ok(self.snapshot())
        }
    }

    /// Search index for the current snapshot.
    pub fn index(&mut self) -> &SearchIndex {
        let generation = self.generation;
        if !matches!(&self.index, Some((built, _)) if *built == generation) {
            self.index = None;
        }
        let (_, index) = self.index.get_or_insert_with(|| {
            debug!(generation, "Rebuilding search index");
            (
                generation,
                SearchIndex::build(Arc::clone(&self.snapshot), self.keys.clone(), self.threshold),
            )
        });
        index
    }

    pub fn search(&mut self, query: &str, filters: &ExactFilters) -> SearchOutcome<'_> {
        self.index().compose(query, filters)
    }

    /// Fresh board over the current snapshot with the kind's default stages.
    pub fn board(&self) -> PipelineBoard {
        PipelineBoard::with_default_stages(self.kind, self.snapshot())
    }
}

fn dedup_by_id(kind: EntityKind, records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    let before = records.len();
    let records: Vec<Record> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    if records.len() != before {
        warn!(kind = %kind, dropped = before - records.len(), "Dropped records with duplicate ids");
    }
    records
}

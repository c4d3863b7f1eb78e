//! In-memory rendered content, swapped atomically.
//!
//! # Architecture
//!
//! The whole store state lives behind `RwLock<Arc<StoreState>>`. Readers
//! take the read lock only long enough to clone the `Arc` and then work on
//! an immutable state, so a reader never sees half of a rebuild pass. The
//! orchestrator builds the next state off to the side and installs it with
//! a single pointer swap.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use folio_source::{ContentHash, PageId, ProjectSnapshot};

/// Rendered output of one page.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedEntry {
    pub id: PageId,
    pub content: String,
    /// Hash of the exact source text that produced `content`.
    pub source_hash_at_render: ContentHash,
    /// Seconds since Unix epoch.
    pub rendered_at: f64,
}

/// One consistent version of the store.
#[derive(Debug, Default)]
pub struct StoreState {
    pub entries: HashMap<PageId, Arc<RenderedEntry>>,
    /// Snapshot the entries were built from; `None` until the first pass.
    pub snapshot: Option<Arc<ProjectSnapshot>>,
    /// Pages whose most recent render attempt failed.
    pub failed: BTreeSet<PageId>,
}

impl StoreState {
    /// Entry for `id`, if the page has ever rendered successfully.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<RenderedEntry>> {
        self.entries.get(id)
    }
}

/// Thread-safe holder of the current [`StoreState`].
#[derive(Debug, Default)]
pub struct ContentStore {
    state: RwLock<Arc<StoreState>>,
}

impl ContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts from previously persisted state.
    #[must_use]
    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
        }
    }

    /// Current state. Stays valid and unchanged for as long as it is held.
    #[must_use]
    pub fn state(&self) -> Arc<StoreState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<RenderedEntry>> {
        self.state().get(id).cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<ProjectSnapshot>> {
        self.state().snapshot.clone()
    }

    /// Identifiers that currently have rendered output, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<PageId> {
        let mut ids: Vec<PageId> = self.state().entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Replace everything at once.
    pub fn swap(
        &self,
        entries: HashMap<PageId, Arc<RenderedEntry>>,
        snapshot: ProjectSnapshot,
        failed: BTreeSet<PageId>,
    ) {
        let next = Arc::new(StoreState {
            entries,
            snapshot: Some(Arc::new(snapshot)),
            failed,
        });
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Forget `id` entirely, snapshot record included, so the next pass sees
    /// the page as new and renders it again. Returns whether the store knew
    /// the page.
    ///
    /// Rebuild passes never call this; they install whole states through
    /// [`swap`](Self::swap). See [`RebuildOrchestrator::invalidate`].
    ///
    /// [`RebuildOrchestrator::invalidate`]: crate::RebuildOrchestrator::invalidate
    pub fn evict(&self, id: &str) -> bool {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let in_snapshot = guard.snapshot.as_ref().is_some_and(|s| s.contains(id));
        if !in_snapshot && !guard.entries.contains_key(id) {
            return false;
        }
        let mut entries = guard.entries.clone();
        entries.remove(id);
        let mut failed = guard.failed.clone();
        failed.remove(id);
        let snapshot = guard
            .snapshot
            .as_ref()
            .map(|s| Arc::new(s.retain(|record| record.id.as_str() != id)));
        *guard = Arc::new(StoreState {
            entries,
            snapshot,
            failed,
        });
        true
    }
}

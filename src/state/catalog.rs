//! Catalog container: the cached show list, its fetch lifecycle, and the
//! memoized sorted view.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{Podcast, SortMode};
use crate::state::status::{RequestSlot, RequestSnapshot};

// ============================================================================
// Catalog State
// ============================================================================

/// Cached catalog plus the bookkeeping for fetching and viewing it.
///
/// The raw `items` are kept exactly as the service returned them; ordering
/// preferences only ever affect the derived [`CatalogState::sorted_view`].
/// A failed refresh leaves the previous items in place so callers keep
/// rendering the last good data next to the recorded error.
#[derive(Debug)]
pub struct CatalogState {
    items: Arc<Vec<Podcast>>,
    /// Bumped on every successful replacement; keys the sorted-view memo
    generation: u64,
    sort_mode: SortMode,
    fetch: RequestSlot,
    sorted: Option<SortedView>,
}

/// Last computed view, reused while its inputs are unchanged.
#[derive(Debug)]
struct SortedView {
    mode: SortMode,
    generation: u64,
    view: Arc<Vec<Podcast>>,
}

/// Cheap point-in-time copy for readers outside the container lock.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub items: Arc<Vec<Podcast>>,
    pub sort_mode: SortMode,
    pub is_loading: bool,
    pub fetch: RequestSnapshot,
}

impl CatalogState {
    pub fn new(initial_sort: SortMode) -> Self {
        CatalogState {
            items: Arc::new(Vec::new()),
            generation: 0,
            sort_mode: initial_sort,
            fetch: RequestSlot::new("fetch_catalog"),
            sorted: None,
        }
    }

    pub fn items(&self) -> &[Podcast] {
        &self.items
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn is_loading(&self) -> bool {
        self.fetch.is_pending()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            items: Arc::clone(&self.items),
            sort_mode: self.sort_mode,
            is_loading: self.fetch.is_pending(),
            fetch: self.fetch.snapshot(),
        }
    }

    /// Start a catalog fetch.
    ///
    /// Without `forced`, a fetch that is already in flight is reused and
    /// `None` is returned. With `forced`, a fresh attempt always starts and
    /// any in-flight attempt is superseded.
    pub fn begin_fetch(&mut self, forced: bool) -> Option<u64> {
        if forced {
            Some(self.fetch.begin_superseding())
        } else {
            self.fetch.begin()
        }
    }

    /// Apply the outcome of the fetch stamped `stamp`.
    ///
    /// Outcomes of superseded attempts are dropped whole: neither the items
    /// nor the status change. On failure the previous items are retained and
    /// only the error is recorded.
    pub fn settle_fetch(&mut self, stamp: u64, outcome: Result<Vec<Podcast>, String>) {
        match outcome {
            Ok(items) => {
                if !self.fetch.settle(stamp, Ok(())) {
                    return;
                }
                let mut seen = HashSet::with_capacity(items.len());
                let duplicates = items.iter().filter(|p| !seen.insert(p.id.as_str())).count();
                if duplicates > 0 {
                    warn!(count = duplicates, "Catalog contains duplicate podcast ids");
                }
                self.generation += 1;
                self.items = Arc::new(items);
                info!(
                    count = self.items.len(),
                    generation = self.generation,
                    "Catalog replaced"
                );
            }
            Err(message) => {
                self.fetch.settle(stamp, Err(message));
            }
        }
    }

    /// Change the requested ordering. The raw items are untouched.
    pub fn set_sort_mode(&mut self, mode: SortMode) {
        if self.sort_mode != mode {
            debug!(from = %self.sort_mode, to = %mode, "Sort mode changed");
            self.sort_mode = mode;
        }
    }

    /// The catalog ordered by the current sort mode.
    ///
    /// The view is memoized on (items generation, sort mode): repeated calls
    /// with unchanged inputs return the same `Arc`, so readers can use
    /// pointer identity to skip re-rendering. The sort is stable, leaving
    /// items with equal keys in catalog order.
    pub fn sorted_view(&mut self) -> Arc<Vec<Podcast>> {
        if let Some(cached) = &self.sorted {
            if cached.mode == self.sort_mode && cached.generation == self.generation {
                return Arc::clone(&cached.view);
            }
        }

        let mut view: Vec<Podcast> = self.items.as_ref().clone();
        view.sort_by(|a, b| self.sort_mode.compare(a, b));
        let view = Arc::new(view);
        debug!(mode = %self.sort_mode, count = view.len(), "Rebuilt sorted catalog view");

        self.sorted = Some(SortedView {
            mode: self.sort_mode,
            generation: self.generation,
            view: Arc::clone(&view),
        });
        view
    }
}

impl Default for CatalogState {
    fn default() -> Self {
        CatalogState::new(SortMode::default())
    }
}

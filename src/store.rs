//! Application store: the shared state containers plus the async
//! operations that drive them.
//!
//! Operations follow one shape: lock the container just long enough to
//! stamp the attempt, release it for the network call, then lock again to
//! settle. No lock is ever held across an await of the network, so readers
//! stay responsive while requests are in flight and the containers alone
//! decide whether a completion still applies.
//!
//! Operations do not return errors. Every outcome, success or failure,
//! lands in the owning container's request slot where snapshots expose it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::{Podcast, SortMode};
use crate::remote::RemoteClient;
use crate::state::{CatalogSnapshot, CatalogState, UserDataSnapshot, UserDataState};

/// Shared handle to all application state. Clones address the same
/// containers.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    remote: RemoteClient,
    catalog: Mutex<CatalogState>,
    user_data: Mutex<UserDataState>,
}

impl Store {
    pub fn new(remote: RemoteClient) -> Self {
        Store::with_initial_sort(remote, SortMode::default())
    }

    pub fn with_initial_sort(remote: RemoteClient, initial_sort: SortMode) -> Self {
        Store {
            inner: Arc::new(StoreInner {
                remote,
                catalog: Mutex::new(CatalogState::new(initial_sort)),
                user_data: Mutex::new(UserDataState::new()),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    /// Fetch the catalog, reusing any fetch already in flight.
    pub async fn fetch_catalog(&self) {
        self.fetch_catalog_inner(false).await;
    }

    /// Fetch the catalog unconditionally, superseding any fetch in flight.
    pub async fn fetch_catalog_forced(&self) {
        self.fetch_catalog_inner(true).await;
    }

    async fn fetch_catalog_inner(&self, forced: bool) {
        let stamp = {
            let mut catalog = self.inner.catalog.lock().await;
            catalog.begin_fetch(forced)
        };
        let Some(stamp) = stamp else {
            return;
        };

        let outcome = self
            .inner
            .remote
            .fetch_catalog()
            .await
            .map_err(|e| e.to_string());
        self.inner.catalog.lock().await.settle_fetch(stamp, outcome);
    }

    /// Change the catalog ordering preference.
    pub async fn set_sort_mode(&self, mode: SortMode) {
        self.inner.catalog.lock().await.set_sort_mode(mode);
    }

    /// The catalog ordered by the current sort mode. Memoized; see
    /// [`CatalogState::sorted_view`].
    pub async fn sorted_view(&self) -> Arc<Vec<Podcast>> {
        self.inner.catalog.lock().await.sorted_view()
    }

    pub async fn catalog(&self) -> CatalogSnapshot {
        self.inner.catalog.lock().await.snapshot()
    }

    // ------------------------------------------------------------------------
    // User Data
    // ------------------------------------------------------------------------

    /// Fetch the preference record for `email`.
    pub async fn fetch_preference(&self, email: &str) {
        let stamp = {
            let mut user_data = self.inner.user_data.lock().await;
            user_data.begin_fetch(email)
        };
        let Some(stamp) = stamp else {
            return;
        };

        let outcome = self
            .inner
            .remote
            .fetch_preference(email)
            .await
            .map_err(|e| e.to_string());
        self.inner
            .user_data
            .lock()
            .await
            .settle_fetch(stamp, outcome);
    }

    /// Replace the liked set for `email`.
    pub async fn replace_liked(&self, email: &str, liked: BTreeSet<String>) {
        let stamp = {
            let mut user_data = self.inner.user_data.lock().await;
            user_data.begin_replace_liked(email, &liked)
        };
        let Some(stamp) = stamp else {
            return;
        };

        let outcome = self
            .inner
            .remote
            .upsert_liked(email, &liked)
            .await
            .map_err(|e| e.to_string());
        self.inner
            .user_data
            .lock()
            .await
            .settle_replace_liked(stamp, outcome);
    }

    /// Replace the last-listen pointer for `email`.
    pub async fn replace_last_listen(&self, email: &str, podcast_id: &str) {
        let stamp = {
            let mut user_data = self.inner.user_data.lock().await;
            user_data.begin_replace_last_listen(email, podcast_id)
        };
        let Some(stamp) = stamp else {
            return;
        };

        let outcome = self
            .inner
            .remote
            .upsert_last_listen(email, podcast_id)
            .await
            .map_err(|e| e.to_string());
        self.inner
            .user_data
            .lock()
            .await
            .settle_replace_last_listen(stamp, outcome);
    }

    pub async fn user_data(&self) -> UserDataSnapshot {
        self.inner.user_data.lock().await.snapshot()
    }
}

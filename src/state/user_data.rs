//! Per-user preference container: the cached preference record and the
//! lifecycle of the three operations that touch it.
//!
//! The fetch operation replaces the whole record. The two write operations
//! each own exactly one field (`liked`, `last_listen`) and merge only that
//! field into the local record when the backend acknowledges the upsert, so
//! concurrent writes to different fields never overwrite each other.

use std::collections::BTreeSet;

use tracing::info;

use crate::model::UserPreference;
use crate::state::status::{RequestSlot, RequestSnapshot};

// ============================================================================
// User Data State
// ============================================================================

/// Preference record plus one request slot per operation.
///
/// `pending_*` remember the parameters of the current attempt. They serve
/// two purposes: an identical re-issue coalesces onto the in-flight attempt,
/// and a successful write knows which values to merge without re-reading the
/// backend.
#[derive(Debug)]
pub struct UserDataState {
    record: Option<UserPreference>,
    fetch: RequestSlot,
    replace_liked: RequestSlot,
    replace_last_listen: RequestSlot,
    pending_fetch: Option<String>,
    pending_liked: Option<(String, BTreeSet<String>)>,
    pending_last_listen: Option<(String, String)>,
}

/// Cheap point-in-time copy for readers outside the container lock.
#[derive(Debug, Clone)]
pub struct UserDataSnapshot {
    pub record: Option<UserPreference>,
    pub is_loading: bool,
    pub fetch: RequestSnapshot,
    pub replace_liked: RequestSnapshot,
    pub replace_last_listen: RequestSnapshot,
}

impl UserDataState {
    pub fn new() -> Self {
        UserDataState {
            record: None,
            fetch: RequestSlot::new("fetch_preference"),
            replace_liked: RequestSlot::new("replace_liked"),
            replace_last_listen: RequestSlot::new("replace_last_listen"),
            pending_fetch: None,
            pending_liked: None,
            pending_last_listen: None,
        }
    }

    pub fn record(&self) -> Option<&UserPreference> {
        self.record.as_ref()
    }

    pub fn snapshot(&self) -> UserDataSnapshot {
        UserDataSnapshot {
            record: self.record.clone(),
            is_loading: self.fetch.is_pending(),
            fetch: self.fetch.snapshot(),
            replace_liked: self.replace_liked.snapshot(),
            replace_last_listen: self.replace_last_listen.snapshot(),
        }
    }

    // ------------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------------

    /// Start fetching the record for `email`.
    ///
    /// A fetch already in flight for the same email is reused (`None`); a
    /// fetch for a different email supersedes it.
    pub fn begin_fetch(&mut self, email: &str) -> Option<u64> {
        if self.fetch.is_pending() && self.pending_fetch.as_deref() == Some(email) {
            self.fetch.begin()
        } else {
            self.pending_fetch = Some(email.to_string());
            Some(self.fetch.begin_superseding())
        }
    }

    /// Apply the outcome of the fetch stamped `stamp`.
    ///
    /// Failures record an error but never clear a previously fetched record.
    pub fn settle_fetch(&mut self, stamp: u64, outcome: Result<UserPreference, String>) {
        match outcome {
            Ok(record) => {
                if self.fetch.settle(stamp, Ok(())) {
                    self.pending_fetch = None;
                    info!(email = %record.email, "User preferences loaded");
                    self.record = Some(record);
                }
            }
            Err(message) => {
                if self.fetch.settle(stamp, Err(message)) {
                    self.pending_fetch = None;
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Liked Set
    // ------------------------------------------------------------------------

    /// Start replacing the liked set for `email`.
    pub fn begin_replace_liked(&mut self, email: &str, liked: &BTreeSet<String>) -> Option<u64> {
        let same = self
            .pending_liked
            .as_ref()
            .is_some_and(|(e, l)| e == email && l == liked);
        if self.replace_liked.is_pending() && same {
            self.replace_liked.begin()
        } else {
            self.pending_liked = Some((email.to_string(), liked.clone()));
            Some(self.replace_liked.begin_superseding())
        }
    }

    /// Apply the outcome of the liked-set write stamped `stamp`.
    ///
    /// On success only the `liked` field of the local record changes; every
    /// other field keeps its fetched value.
    pub fn settle_replace_liked(&mut self, stamp: u64, outcome: Result<(), String>) {
        let succeeded = outcome.is_ok();
        if !self.replace_liked.settle(stamp, outcome) {
            return;
        }
        let Some((email, liked)) = self.pending_liked.take() else {
            return;
        };
        if succeeded {
            self.record_for(email).liked = liked;
        }
    }

    // ------------------------------------------------------------------------
    // Last Listen
    // ------------------------------------------------------------------------

    /// Start replacing the last-listen pointer for `email`.
    pub fn begin_replace_last_listen(&mut self, email: &str, podcast_id: &str) -> Option<u64> {
        let same = self
            .pending_last_listen
            .as_ref()
            .is_some_and(|(e, id)| e == email && id == podcast_id);
        if self.replace_last_listen.is_pending() && same {
            self.replace_last_listen.begin()
        } else {
            self.pending_last_listen = Some((email.to_string(), podcast_id.to_string()));
            Some(self.replace_last_listen.begin_superseding())
        }
    }

    /// Apply the outcome of the last-listen write stamped `stamp`.
    pub fn settle_replace_last_listen(&mut self, stamp: u64, outcome: Result<(), String>) {
        let succeeded = outcome.is_ok();
        if !self.replace_last_listen.settle(stamp, outcome) {
            return;
        }
        let Some((email, podcast_id)) = self.pending_last_listen.take() else {
            return;
        };
        if succeeded {
            self.record_for(email).last_listen = Some(podcast_id);
        }
    }

    /// The local record for `email`, creating a stub when none exists or the
    /// cached record belongs to a different identity.
    fn record_for(&mut self, email: String) -> &mut UserPreference {
        if !self.record.as_ref().is_some_and(|record| record.email == email) {
            info!(email = %email, "Started local preference record");
            self.record = None;
        }
        self.record.get_or_insert_with(|| UserPreference::stub(email))
    }
}

impl Default for UserDataState {
    fn default() -> Self {
        UserDataState::new()
    }
}

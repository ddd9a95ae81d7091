//! Core data shapes shared by the state containers, the remote client,
//! and the CLI.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Catalog Types
// ============================================================================

/// One show in the remote catalog.
///
/// Field names follow the catalog API payload exactly, so the struct
/// round-trips through serde without rename attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    /// Stable identifier assigned by the catalog service
    pub id: String,
    /// Display title
    pub title: String,
    /// Genre labels, already resolved to human-readable names upstream
    pub genres: Vec<String>,
    /// Number of published seasons
    pub seasons: u32,
    /// Cover image URL
    pub image: String,
    /// When the show last published new content
    pub updated: DateTime<Utc>,
    /// Long-form show description
    pub description: String,
}

// ============================================================================
// Sort Modes
// ============================================================================

/// Requested ordering for the catalog view.
///
/// The serde spellings are the wire/config spellings; [`SortMode::from_str`]
/// additionally accepts the `a-z` / `z-a` shorthands used on the command
/// line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    /// Most recently updated first
    Recent,
    /// Least recently updated first
    Oldest,
    /// Title ascending
    Alphabetic,
    /// Title descending
    RevAlphabetic,
}

/// A sort mode string was not one of the recognized spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown sort mode '{0}' (expected recent, oldest, alphabetic, or revAlphabetic)")]
pub struct ParseSortModeError(pub String);

impl SortMode {
    /// Every recognized mode, for exhaustive checks.
    pub const ALL: [SortMode; 4] = [
        SortMode::Recent,
        SortMode::Oldest,
        SortMode::Alphabetic,
        SortMode::RevAlphabetic,
    ];

    /// Total order this mode imposes on two podcasts.
    ///
    /// Ties compare equal, which lets callers rely on a stable sort to
    /// preserve the incoming relative order of tied items.
    pub fn compare(self, a: &Podcast, b: &Podcast) -> Ordering {
        match self {
            SortMode::Recent => b.updated.cmp(&a.updated),
            SortMode::Oldest => a.updated.cmp(&b.updated),
            SortMode::Alphabetic => a.title.cmp(&b.title),
            SortMode::RevAlphabetic => b.title.cmp(&a.title),
        }
    }

    /// The canonical wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Recent => "recent",
            SortMode::Oldest => "oldest",
            SortMode::Alphabetic => "alphabetic",
            SortMode::RevAlphabetic => "revAlphabetic",
        }
    }
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::Recent
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = ParseSortModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(SortMode::Recent),
            "oldest" => Ok(SortMode::Oldest),
            "alphabetic" | "a-z" => Ok(SortMode::Alphabetic),
            "revAlphabetic" | "z-a" => Ok(SortMode::RevAlphabetic),
            other => Err(ParseSortModeError(other.to_string())),
        }
    }
}

// ============================================================================
// User Preference Types
// ============================================================================

/// The per-user preference record, keyed by email.
///
/// Mirrors one row of the backend's `user_podcast_data` table. `liked` is a
/// set ordered by podcast id so that serialized payloads are deterministic;
/// `listen_time` is an append-only history the client reads but never
/// writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    /// Identity key for the record
    pub email: String,
    /// Set by the backend on first insert; absent on locally created stubs
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Listening-event timestamps, oldest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub listen_time: Vec<DateTime<Utc>>,
    /// Ids of shows the user has liked
    #[serde(default, deserialize_with = "null_as_default")]
    pub liked: BTreeSet<String>,
    /// Id of the last show the user listened to, if any
    #[serde(default)]
    pub last_listen: Option<String>,
}

/// Array columns the partial upserts never touched come back as JSON `null`
/// rather than `[]`; treat both as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl UserPreference {
    /// A minimal local record for a user the backend has not seen yet.
    pub fn stub(email: impl Into<String>) -> Self {
        UserPreference {
            email: email.into(),
            created_at: None,
            listen_time: Vec::new(),
            liked: BTreeSet::new(),
            last_listen: None,
        }
    }
}

//! Preference backend: a PostgREST-style table with one row per user.
//!
//! Reads use a filtered select (`?select=*&email=eq.<email>`). Writes are
//! merge upserts keyed on the email column, and each write sends only the
//! field it owns so concurrent writers cannot clobber each other's columns.

use std::collections::BTreeSet;

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::debug;

use super::{RemoteClient, RemoteError, UserDataEndpoint};
use crate::model::UserPreference;

/// Table holding one preference row per user.
const USER_DATA_TABLE: &str = "user_podcast_data";

/// Merge on the conflict key instead of failing, and skip the echo body.
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

/// Upsert row carrying only the liked set.
#[derive(Serialize)]
struct LikedRow<'a> {
    email: &'a str,
    liked: &'a BTreeSet<String>,
}

/// Upsert row carrying only the last-listen pointer.
#[derive(Serialize)]
struct LastListenRow<'a> {
    email: &'a str,
    last_listen: &'a str,
}

impl UserDataEndpoint {
    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, USER_DATA_TABLE)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key.expose_secret())
                .header("Authorization", format!("Bearer {}", key.expose_secret())),
            None => request,
        }
    }
}

impl RemoteClient {
    /// Fetch the preference record for `email`.
    ///
    /// Exactly one row must match. Zero rows maps to
    /// [`RemoteError::NotFound`] so callers can tell a new user apart from
    /// transport trouble; more than one row means the backend lost its
    /// uniqueness guarantee and is reported as [`RemoteError::Ambiguous`].
    pub async fn fetch_preference(&self, email: &str) -> Result<UserPreference, RemoteError> {
        let endpoint = self.user_data()?;
        debug!(email = %email, "Fetching preference record");

        let filter = format!("eq.{email}");
        let request = endpoint.authorize(
            self.http
                .get(endpoint.table_url())
                .query(&[("select", "*"), ("email", filter.as_str())]),
        );
        let bytes = self.fetch_bytes(request).await?;
        let mut rows: Vec<UserPreference> =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;

        match rows.len() {
            0 => Err(RemoteError::NotFound {
                email: email.to_string(),
            }),
            1 => Ok(rows.remove(0)),
            count => Err(RemoteError::Ambiguous {
                email: email.to_string(),
                count,
            }),
        }
    }

    /// Upsert the liked set for `email`, touching no other column.
    pub async fn upsert_liked(
        &self,
        email: &str,
        liked: &BTreeSet<String>,
    ) -> Result<(), RemoteError> {
        let endpoint = self.user_data()?;
        debug!(email = %email, count = liked.len(), "Upserting liked set");

        let request = endpoint
            .authorize(self.http.post(endpoint.table_url()))
            .query(&[("on_conflict", "email")])
            .header("Prefer", UPSERT_PREFER)
            .json(&[LikedRow { email, liked }]);
        self.execute(request).await?;
        Ok(())
    }

    /// Upsert the last-listen pointer for `email`, touching no other column.
    pub async fn upsert_last_listen(
        &self,
        email: &str,
        podcast_id: &str,
    ) -> Result<(), RemoteError> {
        let endpoint = self.user_data()?;
        debug!(email = %email, podcast_id = %podcast_id, "Upserting last listen");

        let request = endpoint
            .authorize(self.http.post(endpoint.table_url()))
            .query(&[("on_conflict", "email")])
            .header("Prefer", UPSERT_PREFER)
            .json(&[LastListenRow {
                email,
                last_listen: podcast_id,
            }]);
        self.execute(request).await?;
        Ok(())
    }
}

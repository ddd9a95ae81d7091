//! Catalog endpoint: one GET returning the full show list.

use tracing::debug;

use super::{RemoteClient, RemoteError};
use crate::model::Podcast;

impl RemoteClient {
    /// Fetch every show in the catalog.
    ///
    /// The endpoint has no paging; the whole list arrives as a single JSON
    /// array. Bodies over the response size cap are rejected rather than
    /// buffered.
    pub async fn fetch_catalog(&self) -> Result<Vec<Podcast>, RemoteError> {
        debug!(url = %self.catalog_url, "Fetching catalog");

        let bytes = self.fetch_bytes(self.http.get(&self.catalog_url)).await?;
        let items: Vec<Podcast> =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;

        debug!(count = items.len(), "Catalog fetched");
        Ok(items)
    }
}

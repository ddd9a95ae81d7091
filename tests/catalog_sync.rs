//! Integration tests for the catalog lifecycle: fetch, refresh, reorder.
//!
//! Each test runs its own mock catalog server and drives a fresh store
//! end-to-end, including the interleavings that matter: coalesced duplicate
//! fetches, forced refreshes overtaking slow ones, and failures arriving
//! after the data they would have replaced.

use std::sync::Arc;
use std::time::Duration;

use podshelf::model::SortMode;
use podshelf::remote::RemoteClient;
use podshelf::state::RequestStatus;
use podshelf::store::Store;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn podcast_json(id: &str, title: &str, updated: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "genres": ["Drama"],
        "seasons": 2,
        "image": format!("https://cdn.example.com/{id}.jpg"),
        "updated": updated,
        "description": "A show."
    })
}

fn catalog_store(server: &MockServer) -> Store {
    let remote = RemoteClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    Store::new(remote)
}

fn titles(view: &[podshelf::model::Podcast]) -> Vec<String> {
    view.iter().map(|p| p.title.clone()).collect()
}

// ============================================================================
// Fetch Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_populates_catalog() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            podcast_json("1", "Apple Hour", "2022-03-01T00:00:00Z"),
            podcast_json("2", "Banana Cast", "2022-01-01T00:00:00Z"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    store.fetch_catalog().await;

    let snapshot = store.catalog().await;
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.fetch.status, RequestStatus::Fulfilled);
    assert_eq!(snapshot.fetch.error, None);
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn test_failed_refresh_keeps_last_good_catalog() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            podcast_json("1", "Apple Hour", "2022-03-01T00:00:00Z"),
        ])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    store.fetch_catalog().await;
    store.fetch_catalog().await;

    // The failed refresh records its error but the items survive
    let snapshot = store.catalog().await;
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.fetch.status, RequestStatus::Rejected);
    assert_eq!(
        snapshot.fetch.error.as_deref(),
        Some("HTTP error: status 500")
    );

    // The stale items are still served through the sorted view
    assert_eq!(titles(&store.sorted_view().await), vec!["Apple Hour"]);
}

#[tokio::test]
async fn test_malformed_catalog_rejects() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    store.fetch_catalog().await;

    let snapshot = store.catalog().await;
    assert_eq!(snapshot.fetch.status, RequestStatus::Rejected);
    assert!(snapshot.fetch.error.unwrap().contains("Malformed response"));
    assert!(snapshot.items.is_empty());
}

// ============================================================================
// Sorted View Tests
// ============================================================================

#[tokio::test]
async fn test_sort_modes_reorder_the_view() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            podcast_json("1", "Banana Cast", "2022-01-01T00:00:00Z"),
            podcast_json("2", "Apple Hour", "2022-03-01T00:00:00Z"),
            podcast_json("3", "Cherry Talk", "2022-02-01T00:00:00Z"),
        ])))
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    store.fetch_catalog().await;

    // Default ordering is most recently updated first
    assert_eq!(
        titles(&store.sorted_view().await),
        vec!["Apple Hour", "Cherry Talk", "Banana Cast"]
    );

    store.set_sort_mode(SortMode::Oldest).await;
    assert_eq!(
        titles(&store.sorted_view().await),
        vec!["Banana Cast", "Cherry Talk", "Apple Hour"]
    );

    store.set_sort_mode(SortMode::Alphabetic).await;
    assert_eq!(
        titles(&store.sorted_view().await),
        vec!["Apple Hour", "Banana Cast", "Cherry Talk"]
    );

    store.set_sort_mode(SortMode::RevAlphabetic).await;
    assert_eq!(
        titles(&store.sorted_view().await),
        vec!["Cherry Talk", "Banana Cast", "Apple Hour"]
    );
}

#[tokio::test]
async fn test_sorted_view_is_stable_across_reads() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            podcast_json("1", "Apple Hour", "2022-03-01T00:00:00Z"),
            podcast_json("2", "Banana Cast", "2022-01-01T00:00:00Z"),
        ])))
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    store.fetch_catalog().await;

    // Unchanged inputs return the same allocation, so readers can use
    // pointer identity to skip re-rendering
    let first = store.sorted_view().await;
    let second = store.sorted_view().await;
    assert!(Arc::ptr_eq(&first, &second));

    store.set_sort_mode(SortMode::Alphabetic).await;
    let third = store.sorted_view().await;
    assert!(!Arc::ptr_eq(&first, &third));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_fetches_coalesce_into_one_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([podcast_json("1", "Apple Hour", "2022-03-01T00:00:00Z")]))
                .set_delay(Duration::from_millis(250)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    let background = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_catalog().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // While the first fetch is in flight a second one returns immediately
    // without issuing another request
    store.fetch_catalog().await;
    background.await.unwrap();

    let snapshot = store.catalog().await;
    assert_eq!(snapshot.fetch.status, RequestStatus::Fulfilled);
    assert_eq!(snapshot.items.len(), 1);
}

#[tokio::test]
async fn test_forced_refresh_supersedes_slow_fetch() {
    let mock_server = MockServer::start().await;
    // First request hangs and eventually returns the old payload
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([podcast_json("1", "Stale Show", "2020-01-01T00:00:00Z")]))
                .set_delay(Duration::from_millis(400)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    // The forced refresh lands quickly with the new payload
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            podcast_json("2", "Fresh Show", "2024-01-01T00:00:00Z"),
        ])))
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    let slow = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_catalog().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    store.fetch_catalog_forced().await;
    assert_eq!(titles(&store.sorted_view().await), vec!["Fresh Show"]);

    // The superseded fetch completes afterwards; its payload must not win
    slow.await.unwrap();
    let snapshot = store.catalog().await;
    assert_eq!(titles(&snapshot.items), vec!["Fresh Show"]);
    assert_eq!(snapshot.fetch.status, RequestStatus::Fulfilled);
}

#[tokio::test]
async fn test_slow_failure_does_not_mask_forced_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(400)))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            podcast_json("2", "Fresh Show", "2024-01-01T00:00:00Z"),
        ])))
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    let slow = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_catalog().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    store.fetch_catalog_forced().await;
    slow.await.unwrap();

    // The late failure belongs to a superseded attempt and is discarded
    let snapshot = store.catalog().await;
    assert_eq!(snapshot.fetch.status, RequestStatus::Fulfilled);
    assert_eq!(snapshot.fetch.error, None);
    assert_eq!(snapshot.items.len(), 1);
}

#[tokio::test]
async fn test_loading_flag_tracks_the_in_flight_fetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(250)),
        )
        .mount(&mock_server)
        .await;

    let store = catalog_store(&mock_server);
    let background = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_catalog().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = store.catalog().await;
    assert!(snapshot.is_loading);
    assert_eq!(snapshot.fetch.status, RequestStatus::Pending);

    background.await.unwrap();
    assert!(!store.catalog().await.is_loading);
}

//! End-to-end behavior of `Directory` against a scripted server and a
//! temporary cache directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use tablecache_core::{
    CacheHandle, Directory, DirectoryError, Endpoints, RemoteSource, Restaurant, Review,
    ReviewBatch,
};

// ============================================================================
// Fixtures
// ============================================================================

enum ReviewsReply {
    List(Vec<Review>),
    Null,
    Fail,
}

struct FakeServer {
    endpoints: Endpoints,
    restaurants: Option<Vec<Restaurant>>,
    reviews: ReviewsReply,
    restaurant_calls: AtomicUsize,
    review_calls: AtomicUsize,
    review_gate: Option<Arc<Notify>>,
}

impl FakeServer {
    fn new(restaurants: Option<Vec<Restaurant>>, reviews: ReviewsReply) -> Self {
        Self {
            endpoints: Endpoints::default(),
            restaurants,
            reviews,
            restaurant_calls: AtomicUsize::new(0),
            review_calls: AtomicUsize::new(0),
            review_gate: None,
        }
    }

    fn restaurant_calls(&self) -> usize {
        self.restaurant_calls.load(Ordering::SeqCst)
    }

    fn review_calls(&self) -> usize {
        self.review_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeServer {
    fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
        self.restaurant_calls.fetch_add(1, Ordering::SeqCst);
        self.restaurants
            .clone()
            .ok_or_else(|| anyhow!("connection refused"))
    }

    async fn fetch_reviews(&self, _restaurant_id: i64) -> Result<Option<Vec<Review>>> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.review_gate {
            gate.notified().await;
        }
        match &self.reviews {
            ReviewsReply::List(list) => Ok(Some(list.clone())),
            ReviewsReply::Null => Ok(None),
            ReviewsReply::Fail => Err(anyhow!("connection reset")),
        }
    }
}

fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Restaurant {
    serde_json::from_value(json!({
        "id": id,
        "name": format!("Restaurant {}", id),
        "cuisine_type": cuisine,
        "neighborhood": neighborhood,
        "latlng": {"lat": 40.7, "lng": -73.9},
        "photograph": id.to_string(),
    }))
    .expect("Failed to build restaurant")
}

fn review(id: Option<i64>, restaurant_id: i64, comments: &str) -> Review {
    serde_json::from_value(json!({
        "id": id,
        "restaurant_id": restaurant_id,
        "name": "Jordan",
        "rating": 4,
        "comments": comments,
    }))
    .expect("Failed to build review")
}

fn server_list() -> Vec<Restaurant> {
    vec![
        restaurant(1, "Asian", "Manhattan"),
        restaurant(2, "Italian", "Brooklyn"),
        restaurant(3, "Italian", "Manhattan"),
        restaurant(4, "American", "Queens"),
    ]
}

fn setup(server: FakeServer) -> (tempfile::TempDir, Arc<FakeServer>, Directory) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let server = Arc::new(server);
    let directory = Directory::new(
        CacheHandle::new(dir.path().join("cache")),
        server.clone() as Arc<dyn RemoteSource>,
    );
    (dir, server, directory)
}

fn ids(list: &[Restaurant]) -> Vec<i64> {
    list.iter().map(|r| r.id).collect()
}

fn review_ids(list: &[Review]) -> Vec<Option<i64>> {
    list.iter().map(|r| r.id).collect()
}

// ============================================================================
// Restaurants
// ============================================================================

#[tokio::test]
async fn test_empty_cache_populates_from_server() {
    let (_dir, server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));

    let list = directory.restaurants().await.unwrap().expect("cache is available");
    assert_eq!(ids(&list), vec![1, 2, 3, 4]);
    assert_eq!(server.restaurant_calls(), 1);

    directory.wait_for_writeback().await;
    let store = directory.store().await.expect("cache is available");
    assert_eq!(store.count_restaurants().unwrap(), 4);
    for id in 1..=4 {
        assert_eq!(store.restaurant(id).unwrap().map(|r| r.id), Some(id));
    }
}

#[tokio::test]
async fn test_populated_cache_never_calls_server() {
    let (_dir, server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));
    let store = directory.store().await.expect("cache is available");
    store
        .put_restaurants(&[restaurant(10, "Thai", "Queens"), restaurant(11, "Thai", "Bronx")])
        .unwrap();

    let list = directory.restaurants().await.unwrap().expect("cache is available");
    assert_eq!(ids(&list), vec![10, 11]);
    assert_eq!(server.restaurant_calls(), 0);
}

#[tokio::test]
async fn test_cached_list_goes_stale_until_cleared() {
    let (_dir, server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));

    directory.restaurants().await.unwrap();
    directory.wait_for_writeback().await;
    directory.restaurants().await.unwrap();
    assert_eq!(server.restaurant_calls(), 1);

    directory.clear_cache().await.unwrap();
    let list = directory.restaurants().await.unwrap().expect("cache is available");
    assert_eq!(list.len(), 4);
    assert_eq!(server.restaurant_calls(), 2);
}

#[tokio::test]
async fn test_population_failure_reports_and_leaves_cache_empty() {
    let (_dir, _server, directory) = setup(FakeServer::new(None, ReviewsReply::Null));

    let err = directory.restaurants().await.unwrap_err();
    assert_eq!(err, DirectoryError::RequestFailed("connection refused".to_string()));
    assert_eq!(err.to_string(), "Request failed. connection refused");

    directory.wait_for_writeback().await;
    let store = directory.store().await.expect("cache is available");
    assert_eq!(store.count_restaurants().unwrap(), 0);
}

#[tokio::test]
async fn test_no_cache_means_no_result() {
    let server = Arc::new(FakeServer::new(Some(server_list()), ReviewsReply::Null));
    let directory = Directory::new(CacheHandle::unavailable(), server.clone());

    assert_eq!(directory.restaurants().await, Ok(None));
    assert_eq!(directory.restaurant_by_id(1).await, Ok(None));
    assert_eq!(directory.neighborhoods().await, Ok(None));
    assert_eq!(server.restaurant_calls(), 0);

    directory.set_favorite(1, true).await;
    assert!(directory.cache_status().await.unwrap().is_none());

    let mut rx = directory.reviews(1);
    assert!(rx.recv().await.is_none());
    assert_eq!(server.review_calls(), 0);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_by_id_not_found_is_distinct_from_request_failure() {
    let (_dir, _server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));
    let found = directory.restaurant_by_id(3).await.unwrap().expect("cache is available");
    assert_eq!(found.id, 3);
    assert_eq!(directory.restaurant_by_id(99).await, Err(DirectoryError::NotFound));

    let (_dir, _server, offline) = setup(FakeServer::new(None, ReviewsReply::Null));
    assert!(matches!(
        offline.restaurant_by_id(3).await,
        Err(DirectoryError::RequestFailed(_))
    ));
}

#[tokio::test]
async fn test_cuisine_and_neighborhood_filters() {
    let (_dir, _server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));

    let all = directory
        .restaurants_by_cuisine_and_neighborhood("all", "all")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4]);

    let italian = directory
        .restaurants_by_cuisine_and_neighborhood("Italian", "all")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&italian), vec![2, 3]);

    let both = directory
        .restaurants_by_cuisine_and_neighborhood("Italian", "Manhattan")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&both), vec![3]);

    let by_cuisine = directory.restaurants_by_cuisine("Asian").await.unwrap().unwrap();
    assert_eq!(ids(&by_cuisine), vec![1]);

    let by_neighborhood = directory
        .restaurants_by_neighborhood("Manhattan")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&by_neighborhood), vec![1, 3]);
}

#[tokio::test]
async fn test_facet_lists_are_stable_unique() {
    let list = vec![
        restaurant(1, "Pizza", "A"),
        restaurant(2, "Thai", "B"),
        restaurant(3, "Pizza", "A"),
    ];
    let (_dir, _server, directory) = setup(FakeServer::new(Some(list), ReviewsReply::Null));

    assert_eq!(directory.neighborhoods().await.unwrap().unwrap(), vec!["A", "B"]);
    assert_eq!(directory.cuisines().await.unwrap().unwrap(), vec!["Pizza", "Thai"]);
}

#[tokio::test]
async fn test_filters_forward_request_failure() {
    let (_dir, _server, directory) = setup(FakeServer::new(None, ReviewsReply::Null));
    let expected = Err(DirectoryError::RequestFailed("connection refused".to_string()));

    assert_eq!(directory.restaurants_by_cuisine("Asian").await, expected);
    assert_eq!(directory.restaurants_by_neighborhood("Queens").await, expected);
    assert_eq!(
        directory.restaurants_by_cuisine_and_neighborhood("all", "all").await,
        expected
    );
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
async fn test_reviews_merge_pending_then_deliver_only_new() {
    let fetched = vec![review(Some(1), 7, "server copy"), review(Some(2), 7, "new")];
    let (_dir, server, directory) = setup(FakeServer::new(None, ReviewsReply::List(fetched)));
    let store = directory.store().await.expect("cache is available");
    let submit_url = server.endpoints().submit_review();

    store.put_reviews(&[review(Some(1), 7, "cached")]).unwrap();
    store.put_reviews(&[review(Some(9), 8, "other restaurant")]).unwrap();
    let queued = review(None, 7, "written offline");
    store.enqueue_request(&submit_url, "POST", queued.clone()).unwrap();
    store
        .enqueue_request("http://localhost:1337/restaurants/7/", "PUT", review(None, 7, "not a review"))
        .unwrap();

    let mut rx = directory.reviews(7);

    let local = rx.recv().await.expect("local batch");
    assert!(matches!(local, ReviewBatch::Local(_)));
    assert_eq!(review_ids(local.reviews()), vec![Some(1), None]);
    assert_eq!(local.reviews()[0].comments, "cached");
    assert_eq!(local.reviews()[1], queued);

    let remote = rx.recv().await.expect("remote batch");
    assert!(matches!(remote, ReviewBatch::Remote(_)));
    assert_eq!(review_ids(remote.reviews()), vec![Some(2)]);

    assert!(rx.recv().await.is_none());

    // Every fetched review is written back, including ones already known
    let cached = store.reviews_for(7).unwrap();
    assert_eq!(review_ids(&cached), vec![Some(1), Some(2)]);
    assert_eq!(cached[0].comments, "server copy");
    // The queue is only read
    assert_eq!(store.pending_for(7).unwrap().len(), 2);
}

#[tokio::test]
async fn test_queued_review_with_id_hides_server_copy() {
    let fetched = vec![review(Some(2), 7, "server copy"), review(Some(3), 7, "new")];
    let (_dir, server, directory) = setup(FakeServer::new(None, ReviewsReply::List(fetched)));
    let store = directory.store().await.expect("cache is available");
    let submit_url = server.endpoints().submit_review();
    store
        .enqueue_request(&submit_url, "POST", review(Some(2), 7, "queued"))
        .unwrap();

    let mut rx = directory.reviews(7);
    let local = rx.recv().await.expect("local batch");
    assert_eq!(review_ids(local.reviews()), vec![Some(2)]);

    let remote = rx.recv().await.expect("remote batch");
    assert_eq!(remote, ReviewBatch::Remote(vec![review(Some(3), 7, "new")]));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_server_reviews_without_id_are_dropped() {
    let fetched = vec![review(None, 7, "no id"), review(Some(4), 7, "ok")];
    let (_dir, _server, directory) = setup(FakeServer::new(None, ReviewsReply::List(fetched)));
    let store = directory.store().await.expect("cache is available");

    let mut rx = directory.reviews(7);
    assert_eq!(rx.recv().await, Some(ReviewBatch::Local(vec![])));
    let remote = rx.recv().await.expect("remote batch");
    assert_eq!(review_ids(remote.reviews()), vec![Some(4)]);
    assert!(rx.recv().await.is_none());
    assert_eq!(review_ids(&store.reviews_for(7).unwrap()), vec![Some(4)]);
}

#[tokio::test]
async fn test_writeback_wait_covers_review_refresh() {
    let fetched = vec![review(Some(1), 7, "a"), review(Some(2), 7, "b")];
    let (_dir, _server, directory) = setup(FakeServer::new(None, ReviewsReply::List(fetched)));
    let store = directory.store().await.expect("cache is available");

    // Nothing is received; the batches sit in the channel buffer
    let _rx = directory.reviews(7);
    directory.wait_for_writeback().await;
    assert_eq!(review_ids(&store.reviews_for(7).unwrap()), vec![Some(1), Some(2)]);
}

#[tokio::test]
async fn test_clear_is_not_undone_by_running_review_refresh() {
    let gate = Arc::new(Notify::new());
    let mut server = FakeServer::new(None, ReviewsReply::List(vec![review(Some(1), 7, "late")]));
    server.review_gate = Some(gate.clone());
    let (_dir, _server, directory) = setup(server);
    let store = directory.store().await.expect("cache is available");

    let mut rx = directory.reviews(7);
    assert_eq!(rx.recv().await, Some(ReviewBatch::Local(vec![])));

    let clearing = tokio::spawn({
        let directory = directory.clone();
        async move { directory.clear_cache().await }
    });
    gate.notify_one();
    clearing.await.expect("clear task panicked").unwrap();

    assert!(store.reviews_for(7).unwrap().is_empty());
    assert_eq!(
        review_ids(rx.recv().await.expect("remote batch").reviews()),
        vec![Some(1)]
    );
}

#[tokio::test]
async fn test_local_batch_does_not_wait_for_server() {
    let gate = Arc::new(Notify::new());
    let mut server = FakeServer::new(None, ReviewsReply::List(vec![review(Some(5), 3, "late")]));
    server.review_gate = Some(gate.clone());
    let (_dir, server, directory) = setup(server);

    let mut rx = directory.reviews(3);
    let local = rx.recv().await.expect("local batch");
    assert_eq!(local, ReviewBatch::Local(vec![]));

    gate.notify_one();
    let remote = rx.recv().await.expect("remote batch");
    assert_eq!(review_ids(remote.reviews()), vec![Some(5)]);
    assert_eq!(server.review_calls(), 1);
}

#[tokio::test]
async fn test_failed_refresh_is_silent() {
    let (_dir, server, directory) = setup(FakeServer::new(None, ReviewsReply::Fail));
    let store = directory.store().await.expect("cache is available");
    store.put_reviews(&[review(Some(1), 7, "cached")]).unwrap();

    let mut rx = directory.reviews(7);
    let local = rx.recv().await.expect("local batch");
    assert_eq!(review_ids(local.reviews()), vec![Some(1)]);
    assert!(rx.recv().await.is_none());
    assert_eq!(server.review_calls(), 1);
    assert_eq!(store.reviews_for(7).unwrap().len(), 1);
}

#[tokio::test]
async fn test_null_review_list_delivers_and_writes_nothing() {
    let (_dir, _server, directory) = setup(FakeServer::new(None, ReviewsReply::Null));

    let mut rx = directory.reviews(7);
    assert_eq!(rx.recv().await, Some(ReviewBatch::Local(vec![])));
    assert!(rx.recv().await.is_none());

    let status = directory.cache_status().await.unwrap().expect("cache is available");
    assert_eq!(status.reviews, 0);
}

#[tokio::test]
async fn test_nothing_new_still_sends_empty_remote_batch() {
    let (_dir, _server, directory) =
        setup(FakeServer::new(None, ReviewsReply::List(vec![review(Some(1), 7, "same")])));
    let store = directory.store().await.expect("cache is available");
    store.put_reviews(&[review(Some(1), 7, "same")]).unwrap();

    let mut rx = directory.reviews(7);
    assert!(matches!(rx.recv().await, Some(ReviewBatch::Local(_))));
    assert_eq!(rx.recv().await, Some(ReviewBatch::Remote(vec![])));
    assert!(rx.recv().await.is_none());
}

// ============================================================================
// Favorites and status
// ============================================================================

#[tokio::test]
async fn test_set_favorite() {
    let (_dir, _server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));
    directory.restaurants().await.unwrap();
    directory.wait_for_writeback().await;

    directory.set_favorite(42, true).await;
    let store = directory.store().await.expect("cache is available");
    assert_eq!(store.count_restaurants().unwrap(), 4);
    assert!(store.restaurant(42).unwrap().is_none());

    directory.set_favorite(2, true).await;
    let favorite = directory.restaurant_by_id(2).await.unwrap().unwrap();
    assert!(favorite.is_favorite);

    directory.set_favorite(2, false).await;
    assert!(!directory.restaurant_by_id(2).await.unwrap().unwrap().is_favorite);
}

#[tokio::test]
async fn test_favorite_on_empty_cache_is_noop() {
    let (_dir, server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));
    directory.set_favorite(1, true).await;

    let status = directory.cache_status().await.unwrap().expect("cache is available");
    assert_eq!(status.restaurants, 0);
    assert_eq!(server.restaurant_calls(), 0);
}

#[tokio::test]
async fn test_cache_status_after_population() {
    let (_dir, _server, directory) = setup(FakeServer::new(Some(server_list()), ReviewsReply::Null));
    assert_eq!(
        directory.cache_status().await.unwrap().unwrap().last_updated(),
        "never"
    );

    directory.restaurants().await.unwrap();
    directory.wait_for_writeback().await;

    let status = directory.cache_status().await.unwrap().unwrap();
    assert_eq!(status.restaurants, 4);
    assert_eq!(status.last_updated(), "just now");
}

//! Reconciliation between the local cache and the directory server.
//!
//! `Directory` owns the cache handle and the remote source and decides, per
//! collection, where data comes from:
//!
//! - Restaurants are cache-first. The server is only asked when the cache
//!   holds none, and the fetched list is written back after it has been
//!   returned to the caller. Cached restaurants are never refreshed
//!   automatically; `clear_cache` is the way to pick up server changes.
//! - Reviews are delivered in two batches over a channel: first whatever is
//!   known locally (confirmed reviews plus queued submissions), then only the
//!   reviews the server knows about that were not in the first batch.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::RemoteSource;
use crate::cache::{CacheHandle, CacheStatus, CacheStore};
use crate::error::DirectoryError;
use crate::models::{Restaurant, Review};
use crate::query;

// ============================================================================
// Constants
// ============================================================================

/// A review channel carries at most two batches.
const REVIEW_CHANNEL_BUFFER: usize = 2;

/// One delivery of `Directory::reviews`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewBatch {
    /// Cached confirmed reviews followed by queued, unconfirmed ones.
    Local(Vec<Review>),
    /// Server reviews missing from the `Local` batch.
    Remote(Vec<Review>),
}

impl ReviewBatch {
    pub fn reviews(&self) -> &[Review] {
        match self {
            ReviewBatch::Local(reviews) | ReviewBatch::Remote(reviews) => reviews,
        }
    }
}

/// Data access for the restaurant directory.
/// Clone is cheap and clones share the cache, the client and pending write-backs.
#[derive(Clone)]
pub struct Directory {
    cache: Arc<CacheHandle>,
    remote: Arc<dyn RemoteSource>,
    writebacks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Directory {
    pub fn new(cache: CacheHandle, remote: Arc<dyn RemoteSource>) -> Self {
        Self {
            cache: Arc::new(cache),
            remote,
            writebacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    // =========================================================================
    // Restaurants
    // =========================================================================

    /// The authoritative restaurant list.
    ///
    /// `Ok(None)` means there is no cache to serve from; the server is not
    /// used as a substitute.
    pub async fn restaurants(&self) -> Result<Option<Vec<Restaurant>>, DirectoryError> {
        let Some(store) = self.cache.get().await else {
            return Ok(None);
        };

        let count = match store.count_restaurants() {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to count cached restaurants");
                return Ok(None);
            }
        };

        if count > 0 {
            debug!(count, "Serving restaurants from cache");
            return match store.all_restaurants() {
                Ok(restaurants) => Ok(Some(restaurants)),
                Err(e) => {
                    warn!(error = %e, "Failed to read cached restaurants");
                    Ok(None)
                }
            };
        }

        let restaurants = self.remote.fetch_restaurants().await.map_err(|e| {
            error!(error = %e, "Restaurant fetch failed");
            DirectoryError::RequestFailed(format!("{:#}", e))
        })?;
        info!(count = restaurants.len(), "Populating restaurant cache from server");

        let to_store = restaurants.clone();
        self.spawn_writeback(move || {
            if let Err(e) = store.put_restaurants(&to_store) {
                warn!(error = %e, "Failed to cache restaurants");
            }
        });

        Ok(Some(restaurants))
    }

    /// Persist in the background so the caller is not held up by disk I/O.
    fn spawn_writeback(&self, write: impl FnOnce() + Send + 'static) {
        self.track(tokio::task::spawn_blocking(write));
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self
            .writebacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait until every write-back started so far has finished, including
    /// review refreshes that have not yet stored what they fetched.
    pub async fn wait_for_writeback(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self
                .writebacks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.drain(..).collect()
        };

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Cache write-back task failed");
            }
        }
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Reviews for a restaurant, as up to two batches.
    ///
    /// The `Local` batch is always sent before the server is contacted. A
    /// `Remote` batch follows only if the server answered with a list; a
    /// failed refresh is logged and otherwise invisible. The channel closes
    /// once fetched reviews have been written to the cache. With no cache,
    /// it closes without sending anything.
    pub fn reviews(&self, restaurant_id: i64) -> mpsc::Receiver<ReviewBatch> {
        let (tx, rx) = mpsc::channel(REVIEW_CHANNEL_BUFFER);
        let directory = self.clone();

        let handle = tokio::spawn(async move {
            directory.execute_reviews(tx, restaurant_id).await;
        });
        self.track(handle);

        rx
    }

    async fn send_batch(tx: &mpsc::Sender<ReviewBatch>, batch: ReviewBatch) {
        if tx.send(batch).await.is_err() {
            debug!("Review receiver dropped before delivery");
        }
    }

    async fn execute_reviews(&self, tx: mpsc::Sender<ReviewBatch>, restaurant_id: i64) {
        let Some(store) = self.cache.get().await else {
            return;
        };

        let known = match self.local_reviews(&store, restaurant_id) {
            Ok(known) => known,
            Err(e) => {
                warn!(restaurant_id, error = %e, "Failed to read cached reviews");
                return;
            }
        };
        Self::send_batch(&tx, ReviewBatch::Local(known.clone())).await;

        let mut fetched = match self.remote.fetch_reviews(restaurant_id).await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => {
                debug!(restaurant_id, "Server returned no review list");
                return;
            }
            Err(e) => {
                warn!(restaurant_id, error = %e, "Review refresh failed");
                return;
            }
        };

        // A server review without an id can be neither deduplicated nor cached
        let before = fetched.len();
        fetched.retain(Review::is_confirmed);
        if fetched.len() < before {
            warn!(
                restaurant_id,
                dropped = before - fetched.len(),
                "Server returned reviews without an id"
            );
        }

        let new_reviews = unseen_reviews(&fetched, &known);
        debug!(
            restaurant_id,
            fetched = fetched.len(),
            new = new_reviews.len(),
            "Review refresh complete"
        );
        Self::send_batch(&tx, ReviewBatch::Remote(new_reviews)).await;

        if let Err(e) = store.put_reviews(&fetched) {
            warn!(restaurant_id, error = %e, "Failed to cache reviews");
        }
    }

    /// Confirmed reviews, then bodies of queued submissions for the restaurant.
    fn local_reviews(&self, store: &CacheStore, restaurant_id: i64) -> anyhow::Result<Vec<Review>> {
        let mut reviews = store.reviews_for(restaurant_id)?;

        let submit_url = self.remote.endpoints().submit_review();
        let queued = store
            .pending_for(restaurant_id)?
            .into_iter()
            .filter(|req| req.targets(&submit_url))
            .map(|req| req.body);
        reviews.extend(queued);

        Ok(reviews)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn restaurant_by_id(&self, id: i64) -> Result<Option<Restaurant>, DirectoryError> {
        let Some(restaurants) = self.restaurants().await? else {
            return Ok(None);
        };
        query::find_by_id(&restaurants, id)
            .cloned()
            .map(Some)
            .ok_or(DirectoryError::NotFound)
    }

    pub async fn restaurants_by_cuisine(
        &self,
        cuisine: &str,
    ) -> Result<Option<Vec<Restaurant>>, DirectoryError> {
        Ok(self
            .restaurants()
            .await?
            .map(|list| query::filter_by_cuisine(&list, cuisine)))
    }

    pub async fn restaurants_by_neighborhood(
        &self,
        neighborhood: &str,
    ) -> Result<Option<Vec<Restaurant>>, DirectoryError> {
        Ok(self
            .restaurants()
            .await?
            .map(|list| query::filter_by_neighborhood(&list, neighborhood)))
    }

    /// Pass [`query::ALL`] for either argument to skip that filter.
    pub async fn restaurants_by_cuisine_and_neighborhood(
        &self,
        cuisine: &str,
        neighborhood: &str,
    ) -> Result<Option<Vec<Restaurant>>, DirectoryError> {
        Ok(self
            .restaurants()
            .await?
            .map(|list| query::filter_by_cuisine_and_neighborhood(&list, cuisine, neighborhood)))
    }

    pub async fn neighborhoods(&self) -> Result<Option<Vec<String>>, DirectoryError> {
        Ok(self
            .restaurants()
            .await?
            .map(|list| query::unique_neighborhoods(&list)))
    }

    pub async fn cuisines(&self) -> Result<Option<Vec<String>>, DirectoryError> {
        Ok(self
            .restaurants()
            .await?
            .map(|list| query::unique_cuisines(&list)))
    }

    // =========================================================================
    // Local writes and maintenance
    // =========================================================================

    /// Set the favorite flag on a cached restaurant. Local only; silently
    /// does nothing if the restaurant is not cached or there is no cache.
    pub async fn set_favorite(&self, id: i64, value: bool) {
        let Some(store) = self.cache.get().await else {
            return;
        };
        match store.update_restaurant(id, |r| r.is_favorite = value) {
            Ok(true) => debug!(id, value, "Favorite updated"),
            Ok(false) => debug!(id, "Favorite not updated, restaurant not cached"),
            Err(e) => warn!(id, error = %e, "Failed to update favorite"),
        }
    }

    /// Forget cached restaurants and reviews so the next read goes to the server.
    /// Queued writes are kept. In-flight write-backs and review refreshes are
    /// awaited first so none of them lands after the clear.
    pub async fn clear_cache(&self) -> anyhow::Result<()> {
        self.wait_for_writeback().await;
        if let Some(store) = self.cache.get().await {
            store.clear_remote_data()?;
            info!("Cleared cached restaurants and reviews");
        }
        Ok(())
    }

    /// `None` when there is no cache.
    pub async fn cache_status(&self) -> anyhow::Result<Option<CacheStatus>> {
        match self.cache.get().await {
            Some(store) => Ok(Some(store.status()?)),
            None => Ok(None),
        }
    }

    /// The cache store, for the offline write layer that feeds the queue.
    pub async fn store(&self) -> Option<Arc<CacheStore>> {
        self.cache.get().await
    }
}

/// Fetched reviews whose id matches nothing already known.
fn unseen_reviews(fetched: &[Review], known: &[Review]) -> Vec<Review> {
    fetched
        .iter()
        .filter(|rev| !known.iter().any(|k| k.same_as(rev)))
        .cloned()
        .collect()
}

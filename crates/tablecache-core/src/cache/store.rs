use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{PendingWriteRequest, Restaurant, Review};

/// Collection names double as file stems under the cache directory.
const RESTAURANTS: &str = "restaurants";
const REVIEWS: &str = "reviews";
const PENDING_WRITE_QUEUE: &str = "pending-write-queue";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Write queue file contents: entries plus the next local sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingQueue {
    next_id: i64,
    requests: BTreeMap<i64, PendingWriteRequest>,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self {
            next_id: 1,
            requests: BTreeMap::new(),
        }
    }
}

/// Durable store with three collections, one JSON file each.
///
/// Every public method is one transaction: the store lock is taken, one
/// collection file is loaded, possibly modified and saved, and the lock is
/// released before returning. Methods are synchronous, so no transaction can
/// span an `.await`.
pub struct CacheStore {
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl CacheStore {
    pub fn open(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;
        Ok(Self {
            cache_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    fn begin(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, cached: &CachedData<T>) -> Result<()> {
        let contents = serde_json::to_string_pretty(cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    fn read<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let _tx = self.begin();
        Ok(self.load(name)?.map(|c| c.data).unwrap_or_default())
    }

    /// Load-modify-save one collection. An existing file keeps its
    /// `cached_at`, so local edits do not make remote data look fresh.
    fn update<T, R>(&self, name: &str, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let _tx = self.begin();
        let mut cached = self
            .load(name)?
            .unwrap_or_else(|| CachedData::new(T::default()));
        let out = f(&mut cached.data);
        self.save(name, &cached)?;
        Ok(out)
    }

    // ===== Restaurants =====

    pub fn count_restaurants(&self) -> Result<usize> {
        Ok(self.read::<BTreeMap<i64, Restaurant>>(RESTAURANTS)?.len())
    }

    /// All cached restaurants in id order.
    pub fn all_restaurants(&self) -> Result<Vec<Restaurant>> {
        Ok(self
            .read::<BTreeMap<i64, Restaurant>>(RESTAURANTS)?
            .into_values()
            .collect())
    }

    pub fn restaurant(&self, id: i64) -> Result<Option<Restaurant>> {
        Ok(self.read::<BTreeMap<i64, Restaurant>>(RESTAURANTS)?.remove(&id))
    }

    /// Insert or overwrite by id. A fresh population stamps a new `cached_at`.
    pub fn put_restaurants(&self, restaurants: &[Restaurant]) -> Result<()> {
        let _tx = self.begin();
        let mut cached = match self.load::<BTreeMap<i64, Restaurant>>(RESTAURANTS)? {
            Some(existing) if !existing.data.is_empty() => existing,
            _ => CachedData::new(BTreeMap::new()),
        };
        for restaurant in restaurants {
            cached.data.insert(restaurant.id, restaurant.clone());
        }
        self.save(RESTAURANTS, &cached)?;
        debug!(count = restaurants.len(), "Restaurants written to cache");
        Ok(())
    }

    /// Apply `f` to the cached restaurant with `id`. Returns false if absent.
    pub fn update_restaurant(&self, id: i64, f: impl FnOnce(&mut Restaurant)) -> Result<bool> {
        self.update(RESTAURANTS, |all: &mut BTreeMap<i64, Restaurant>| {
            match all.get_mut(&id) {
                Some(restaurant) => {
                    f(restaurant);
                    true
                }
                None => false,
            }
        })
    }

    // ===== Reviews =====

    /// Confirmed reviews for one restaurant, in id order.
    pub fn reviews_for(&self, restaurant_id: i64) -> Result<Vec<Review>> {
        Ok(self
            .read::<BTreeMap<i64, Review>>(REVIEWS)?
            .into_values()
            .filter(|r| r.restaurant_id == restaurant_id)
            .collect())
    }

    /// Insert or overwrite by id. Reviews without an id cannot be keyed and are skipped.
    pub fn put_reviews(&self, reviews: &[Review]) -> Result<usize> {
        self.update(REVIEWS, |all: &mut BTreeMap<i64, Review>| {
            let mut written = 0;
            for review in reviews {
                match review.id {
                    Some(id) => {
                        all.insert(id, review.clone());
                        written += 1;
                    }
                    None => warn!(
                        restaurant_id = review.restaurant_id,
                        "Skipping review without id"
                    ),
                }
            }
            written
        })
    }

    // ===== Pending write queue =====

    /// Queued requests whose body targets `restaurant_id`, oldest first.
    pub fn pending_for(&self, restaurant_id: i64) -> Result<Vec<PendingWriteRequest>> {
        Ok(self
            .read::<PendingQueue>(PENDING_WRITE_QUEUE)?
            .requests
            .into_values()
            .filter(|r| r.body.restaurant_id == restaurant_id)
            .collect())
    }

    /// Append a request for later delivery. Entry point for the offline write
    /// layer; returns the assigned local id.
    pub fn enqueue_request(&self, url: &str, method: &str, body: Review) -> Result<i64> {
        self.update(PENDING_WRITE_QUEUE, |queue: &mut PendingQueue| {
            let id = queue.next_id;
            queue.next_id += 1;
            queue.requests.insert(
                id,
                PendingWriteRequest {
                    id,
                    url: url.to_string(),
                    method: method.to_string(),
                    body,
                },
            );
            id
        })
    }

    /// Drop a request after confirmed delivery. Entry point for the offline
    /// write layer; returns false if no such entry.
    pub fn remove_request(&self, id: i64) -> Result<bool> {
        self.update(PENDING_WRITE_QUEUE, |queue: &mut PendingQueue| {
            queue.requests.remove(&id).is_some()
        })
    }

    // ===== Maintenance =====

    /// Remove the server-sourced collections. The write queue is left alone.
    pub fn clear_remote_data(&self) -> Result<()> {
        let _tx = self.begin();
        for name in [RESTAURANTS, REVIEWS] {
            let path = self.cache_path(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache file: {}", name))?;
            }
        }
        Ok(())
    }

    pub fn status(&self) -> Result<CacheStatus> {
        let _tx = self.begin();
        let restaurants = self.load::<BTreeMap<i64, Restaurant>>(RESTAURANTS)?;
        let reviews = self.load::<BTreeMap<i64, Review>>(REVIEWS)?;
        let pending = self.load::<PendingQueue>(PENDING_WRITE_QUEUE)?;

        Ok(CacheStatus {
            restaurants: restaurants.as_ref().map_or(0, |c| c.data.len()),
            reviews: reviews.as_ref().map_or(0, |c| c.data.len()),
            pending: pending.as_ref().map_or(0, |c| c.data.requests.len()),
            restaurants_age: restaurants
                .filter(|c| !c.data.is_empty())
                .map(|c| c.age_display()),
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStatus {
    pub restaurants: usize,
    pub reviews: usize,
    pub pending: usize,
    pub restaurants_age: Option<String>,
}

impl CacheStatus {
    pub fn last_updated(&self) -> String {
        self.restaurants_age
            .clone()
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::CacheStore;

/// Lazily opened, shared access to the cache store.
///
/// The store is opened on first use and the outcome is remembered for the
/// life of the handle. If there is no cache location, or opening fails, the
/// handle resolves to `None` forever and every cache-dependent operation
/// becomes a no-op.
pub struct CacheHandle {
    location: Option<PathBuf>,
    store: OnceCell<Option<Arc<CacheStore>>>,
}

impl CacheHandle {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self::from_location(Some(cache_dir))
    }

    /// A handle for environments without persistent storage.
    pub fn unavailable() -> Self {
        Self::from_location(None)
    }

    pub fn from_location(location: Option<PathBuf>) -> Self {
        Self {
            location,
            store: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Option<Arc<CacheStore>> {
        self.store
            .get_or_init(|| async {
                let dir = match &self.location {
                    Some(dir) => dir.clone(),
                    None => {
                        debug!("No cache location, running without a cache");
                        return None;
                    }
                };
                match CacheStore::open(dir) {
                    Ok(store) => {
                        debug!(dir = %store.cache_dir().display(), "Cache store opened");
                        Some(Arc::new(store))
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to open cache store, running without a cache");
                        None
                    }
                }
            })
            .await
            .clone()
    }
}

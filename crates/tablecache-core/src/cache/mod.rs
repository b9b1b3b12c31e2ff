//! Local caching module for offline data access.
//!
//! `CacheStore` keeps three collections as JSON files in the cache directory:
//! - `restaurants`, keyed by restaurant id
//! - `reviews`, keyed by review id and looked up by restaurant
//! - `pending-write-queue`, keyed by a local sequence and looked up by
//!   the restaurant id in the request body
//!
//! `CacheHandle` opens the store lazily and degrades to "no cache" when it
//! cannot.

pub mod handle;
pub mod store;

pub use handle::CacheHandle;
pub use store::{CacheStatus, CacheStore, CachedData};

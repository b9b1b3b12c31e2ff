//! Data access and offline cache for a restaurant directory.
//!
//! - `Directory`: cache-first restaurant list, two-phase review delivery,
//!   query helpers and the local favorite toggle
//! - `CacheStore` / `CacheHandle`: the persistent cache and its lazy opener
//! - `ApiClient`: reads from the directory server
//! - `query` and `links`: pure helpers for presentation code

pub mod api;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod links;
pub mod models;
pub mod query;

pub use api::{ApiClient, Endpoints, RemoteSource};
pub use cache::{CacheHandle, CacheStatus, CacheStore};
pub use config::Config;
pub use directory::{Directory, ReviewBatch};
pub use error::DirectoryError;
pub use models::{LatLng, PendingWriteRequest, Restaurant, Review};

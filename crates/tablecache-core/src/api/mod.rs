//! REST API client module for the restaurant directory server.
//!
//! `ApiClient` performs the network reads; `RemoteSource` is the seam the
//! reconciliation engine talks to, so tests can substitute a scripted source.

pub mod client;
pub mod error;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Restaurant, Review};

pub use client::{ApiClient, Endpoints, DEFAULT_BASE_URL};
pub use error::ApiError;

/// Remote reads the directory depends on.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    fn endpoints(&self) -> &Endpoints;

    /// `GET {base}/restaurants`
    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>>;

    /// `GET {base}/reviews/?restaurant_id={id}`. `None` when the server answers `null`.
    async fn fetch_reviews(&self, restaurant_id: i64) -> Result<Option<Vec<Review>>>;
}

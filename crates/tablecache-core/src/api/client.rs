//! HTTP client for the restaurant directory REST API.
//!
//! This module provides `ApiClient` for the two read endpoints the directory
//! uses, plus `Endpoints`, which also names the submit endpoint that queued
//! review writes target.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::{Restaurant, Review};

use super::{ApiError, RemoteSource};

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the development server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1337";

/// URLs of the directory API, derived from one base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// All restaurants.
    pub fn restaurants(&self) -> String {
        format!("{}/restaurants", self.base)
    }

    /// Reviews for one restaurant.
    pub fn reviews_for(&self, restaurant_id: i64) -> String {
        format!("{}/reviews/?restaurant_id={}", self.base, restaurant_id)
    }

    /// Where new reviews are POSTed. Queued writes are matched against this.
    pub fn submit_review(&self) -> String {
        format!("{}/reviews/", self.base)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// API client for the directory server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
}

impl ApiClient {
    /// Create a new API client against the given endpoints.
    /// No request timeout is configured; a hung request simply never resolves.
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, endpoints })
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;

        let text = response
            .text()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to read response body from {}", url))?;

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }
}

#[async_trait]
impl RemoteSource for ApiClient {
    fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
        let restaurants: Vec<Restaurant> = self.get(&self.endpoints.restaurants()).await?;
        debug!(count = restaurants.len(), "Restaurants fetched");
        Ok(restaurants)
    }

    async fn fetch_reviews(&self, restaurant_id: i64) -> Result<Option<Vec<Review>>> {
        let reviews: Option<Vec<Review>> = self.get(&self.endpoints.reviews_for(restaurant_id)).await?;
        debug!(
            restaurant_id,
            count = ?reviews.as_ref().map(|r| r.len()),
            "Reviews fetched"
        );
        Ok(reviews)
    }
}

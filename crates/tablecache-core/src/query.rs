//! In-memory filters over the restaurant list.
//!
//! These are pure functions; `Directory` wraps each of them around the
//! reconciled list so callers get the same error contract everywhere.

use crate::models::Restaurant;

/// Filter value meaning "do not filter on this dimension".
pub const ALL: &str = "all";

pub fn find_by_id(restaurants: &[Restaurant], id: i64) -> Option<&Restaurant> {
    restaurants.iter().find(|r| r.id == id)
}

pub fn filter_by_cuisine(restaurants: &[Restaurant], cuisine: &str) -> Vec<Restaurant> {
    restaurants
        .iter()
        .filter(|r| r.cuisine_type == cuisine)
        .cloned()
        .collect()
}

pub fn filter_by_neighborhood(restaurants: &[Restaurant], neighborhood: &str) -> Vec<Restaurant> {
    restaurants
        .iter()
        .filter(|r| r.neighborhood == neighborhood)
        .cloned()
        .collect()
}

/// `ALL` on either side disables that filter, even if some restaurant's
/// cuisine or neighborhood is literally "all".
pub fn filter_by_cuisine_and_neighborhood(
    restaurants: &[Restaurant],
    cuisine: &str,
    neighborhood: &str,
) -> Vec<Restaurant> {
    restaurants
        .iter()
        .filter(|r| cuisine == ALL || r.cuisine_type == cuisine)
        .filter(|r| neighborhood == ALL || r.neighborhood == neighborhood)
        .cloned()
        .collect()
}

pub fn unique_neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
    stable_unique(restaurants.iter().map(|r| r.neighborhood.as_str()))
}

pub fn unique_cuisines(restaurants: &[Restaurant]) -> Vec<String> {
    stable_unique(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

/// Dedup keeping first-occurrence order.
fn stable_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

//! Presentation links derived from restaurant records.

use crate::models::Restaurant;

/// Restaurant detail page URL.
pub fn url_for_restaurant(restaurant: &Restaurant) -> String {
    format!("./restaurant.html?id={}", restaurant.id)
}

/// Restaurant image path, if the record has a photograph.
pub fn image_url_for_restaurant(restaurant: &Restaurant) -> Option<String> {
    restaurant
        .photograph
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| format!("/img/{}", p))
}

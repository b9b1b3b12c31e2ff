//! Plain-text rendering of directory data.

use tablecache_core::links::{image_url_for_restaurant, url_for_restaurant};
use tablecache_core::{CacheStatus, Restaurant, Review};

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn favorite_marker(restaurant: &Restaurant) -> &'static str {
    if restaurant.is_favorite {
        "*"
    } else {
        " "
    }
}

pub fn print_no_cache() {
    println!("No cache available; nothing to show.");
}

pub fn print_restaurant_list(restaurants: &[Restaurant]) {
    if restaurants.is_empty() {
        println!("No restaurants match.");
        return;
    }
    for r in restaurants {
        println!(
            "{} {:>3}  {:<32} {:<12} {}",
            favorite_marker(r),
            r.id,
            r.name,
            r.cuisine_type,
            r.neighborhood
        );
    }
}

pub fn print_restaurant(r: &Restaurant) {
    println!("{} {}", favorite_marker(r), r.name);
    println!("  Cuisine:      {}", r.cuisine_type);
    println!("  Neighborhood: {}", r.neighborhood);
    if let Some(address) = &r.address {
        println!("  Address:      {}", address);
    }
    println!("  Location:     {:.6}, {:.6}", r.latlng.lat, r.latlng.lng);
    println!("  Page:         {}", url_for_restaurant(r));
    if let Some(image) = image_url_for_restaurant(r) {
        println!("  Image:        {}", image);
    }
    let hours: Vec<_> = WEEKDAYS
        .iter()
        .filter_map(|day| r.hours_for(day).map(|h| (day, h)))
        .collect();
    if !hours.is_empty() {
        println!("  Hours:");
        for (day, h) in hours {
            println!("    {:<10} {}", day, h);
        }
    }
}

pub fn print_favorite(r: &Restaurant) {
    if r.is_favorite {
        println!("{} is a favorite.", r.name);
    } else {
        println!("{} is no longer a favorite.", r.name);
    }
}

pub fn print_reviews(heading: &str, reviews: &[Review]) {
    println!("{} ({})", heading, reviews.len());
    for review in reviews {
        println!(
            "  [{}/5] {} - {}",
            review.rating,
            review.name,
            review.date_display()
        );
        if !review.comments.is_empty() {
            println!("    {}", review.comments);
        }
    }
}

pub fn print_values(values: &[String]) {
    for value in values {
        println!("{}", value);
    }
}

pub fn print_status(status: &CacheStatus) {
    println!("Restaurants:    {} (updated {})", status.restaurants, status.last_updated());
    println!("Reviews:        {}", status.reviews);
    println!("Queued writes:  {}", status.pending);
}

//! Data models for the restaurant directory.
//!
//! - `Restaurant`, `LatLng`: directory entries with a locally mutable favorite flag
//! - `Review`: confirmed or still-queued reviews for a restaurant
//! - `PendingWriteRequest`: entries of the offline write queue

pub(crate) mod de;
pub mod pending;
pub mod restaurant;
pub mod review;

pub use pending::PendingWriteRequest;
pub use restaurant::{LatLng, Restaurant};
pub use review::Review;

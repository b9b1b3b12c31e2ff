use serde::{Deserialize, Serialize};

use super::Review;

/// A write the client attempted but the server has not confirmed yet.
///
/// The queue is owned by the offline-write layer: it appends entries and
/// removes them on confirmed delivery. The directory only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWriteRequest {
    /// Local auto-increment sequence, unrelated to server ids.
    pub id: i64,
    pub url: String,
    pub method: String,
    pub body: Review,
}

impl PendingWriteRequest {
    pub fn targets(&self, url: &str) -> bool {
        self.url == url
    }
}

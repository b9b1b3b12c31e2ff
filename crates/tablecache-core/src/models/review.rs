use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::de;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Server-assigned id. Reviews still sitting in the write queue have none.
    #[serde(default, deserialize_with = "de::opt_int", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "de::int")]
    pub restaurant_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "de::int")]
    pub rating: i64,
    #[serde(default)]
    pub comments: String,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "de::opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "updatedAt",
        default,
        deserialize_with = "de::opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Review {
    /// True once the server has confirmed the review and assigned an id.
    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }

    /// Same logical review, by server id. Unconfirmed reviews never match.
    pub fn same_as(&self, other: &Review) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn date_display(&self) -> String {
        match self.created_at {
            Some(at) => at.format("%b %d, %Y").to_string(),
            None => "Pending".to_string(),
        }
    }
}

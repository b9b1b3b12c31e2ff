use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::de;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(deserialize_with = "de::int")]
    pub id: i64,
    pub name: String,
    pub cuisine_type: String,
    pub neighborhood: String,
    pub latlng: LatLng,
    #[serde(default)]
    pub photograph: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub operating_hours: BTreeMap<String, String>,
    /// Locally mutable; the server value is only used on first population.
    #[serde(default, deserialize_with = "de::flag")]
    pub is_favorite: bool,
}

impl Restaurant {
    /// Hours for a given day, e.g. "Monday".
    pub fn hours_for(&self, day: &str) -> Option<&str> {
        self.operating_hours.get(day).map(|s| s.as_str())
    }
}

//! Venue model.

use serde::{Deserialize, Serialize};

/// A physical location activities happen at.
///
/// Venues are unique by (name, city, state). The address is captured from
/// the first record that mentions the venue and never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
}

impl Venue {
    /// Dedup key used when reconciling extracted rows against stored venues.
    pub fn dedup_key(&self) -> (String, Option<String>, Option<String>) {
        (self.name.clone(), self.city.clone(), self.state.clone())
    }
}

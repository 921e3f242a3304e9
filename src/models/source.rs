//! Listing source model.

use serde::{Deserialize, Serialize};

/// A website we crawl activity listings from.
///
/// Sources are created lazily the first time an activity from their host is
/// ingested, and resolved afterwards by the longest stored `base_url` that
/// prefixes the activity's source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i32,
    pub name: String,
    pub base_url: String,
    /// Adapter flavor that produced records for this source, e.g.
    /// `static_html` or `rendered_html`.
    pub adapter_type: String,
    /// Advisory crawl cadence, e.g. `daily`.
    pub crawl_frequency: String,
    pub active: bool,
}

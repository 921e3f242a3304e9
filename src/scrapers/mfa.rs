//! MFA Boston programs listing.
//!
//! The MFA paginates its programs calendar; pages 0 through 4 cover the
//! rolling window we care about. Extraction tries embedded JSON payloads
//! first, then two DOM heuristics: calendar rows read as text lines
//! (title, date, time in consecutive lines), and finally the nearest-block
//! anchor-container scan. Guided tours and "tickets no longer available"
//! rows are excluded everywhere.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::client::{FetchError, PageFetcher};
use super::{resolve_url, SourceAdapter, EASTERN_TIMEZONE};
use crate::config::Settings;
use crate::extract::age::{parse_age_range, Audience};
use crate::extract::filters::is_irrelevant_title;
use crate::extract::lines::text_lines;
use crate::extract::payload::{self, EventShape};
use crate::extract::{first_yield, normalize_space, temporal, ExtractedActivity, TextSignals};

const MFA_PROGRAMS_URL: &str = "https://www.mfa.org/programs";
const MFA_REFERER: &str = "https://www.mfa.org/programs";
const MFA_PAGE_START: u32 = 0;
const MFA_PAGE_END: u32 = 4;
const MFA_VENUE_NAME: &str = "Museum of Fine Arts, Boston";
const MFA_CITY: &str = "Boston";
const MFA_STATE: &str = "MA";
const MFA_DEFAULT_LOCATION: &str = "Boston, MA";

static MFA_EVENT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:event|programs)/[^\s?#]+").unwrap());

static GUIDED_TOUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bguided\s+tou?rs?\b").unwrap());

static UNAVAILABLE_TICKETS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btickets?\s+no\s+longer\s+available\b").unwrap());

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

const EVENT_SHAPE: EventShape = EventShape {
    url_markers: &["/event/", "/programs/"],
};

/// Calendar chrome lines that must not be mistaken for descriptions.
const GENERIC_MARKERS: [&str; 8] = [
    "In Person",
    "Tickets",
    "Sold Out",
    "Course",
    "Film",
    "Music",
    "Special Event",
    "Lecture",
];

pub struct MfaProgramsAdapter {
    url: String,
}

impl MfaProgramsAdapter {
    pub fn new() -> Self {
        Self {
            url: MFA_PROGRAMS_URL.to_string(),
        }
    }

    fn page_urls(&self) -> Vec<String> {
        (MFA_PAGE_START..=MFA_PAGE_END)
            .map(|page| format!("{}?page={page}", self.url))
            .collect()
    }
}

impl Default for MfaProgramsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for MfaProgramsAdapter {
    fn id(&self) -> &'static str {
        "mfa"
    }

    fn display_name(&self) -> &'static str {
        "MFA Boston (programs)"
    }

    fn list_url(&self) -> &str {
        &self.url
    }

    async fn fetch_pages(
        &self,
        fetcher: &PageFetcher,
        _settings: &Settings,
    ) -> Result<Vec<String>, FetchError> {
        let mut pages = Vec::new();
        for url in self.page_urls() {
            pages.push(fetcher.fetch(&url, MFA_REFERER).await?);
        }
        Ok(pages)
    }

    fn extract(&self, html: &str) -> Vec<ExtractedActivity> {
        parse_mfa_events_html(html, &self.url)
    }
}

pub fn parse_mfa_events_html(html: &str, list_url: &str) -> Vec<ExtractedActivity> {
    let doc = Html::parse_document(html);
    first_yield(&[
        &|| parse_json_payloads(&doc, list_url),
        &|| parse_dom_fallback(&doc, list_url),
    ])
}

fn parse_json_payloads(doc: &Html, list_url: &str) -> Vec<ExtractedActivity> {
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();
    for obj in payload::event_nodes(doc, &EVENT_SHAPE) {
        let Some(row) = build_row_from_event(&obj, list_url) else {
            continue;
        };
        if seen.insert(row.identity_key()) {
            rows.push(row);
        }
    }
    rows
}

fn build_row_from_event(
    obj: &serde_json::Map<String, serde_json::Value>,
    list_url: &str,
) -> Option<ExtractedActivity> {
    let title = payload::title_of(obj)?;
    if is_irrelevant_title(&title) {
        return None;
    }

    let source_url = resolve_url(
        list_url,
        &payload::url_of(obj).unwrap_or_else(|| list_url.to_string()),
    );
    if !source_url.contains("/event/") && !source_url.contains("/programs/") {
        return None;
    }

    let start_at = payload::start_of(obj)?;
    let end_at = payload::end_of(obj);

    let mut description_parts = Vec::new();
    if let Some(description) =
        payload::first_text(obj, &["description", "summary", "excerpt", "dek"])
    {
        description_parts.push(description);
    }
    if let Some(location) = obj.get("location").and_then(payload::location_name) {
        description_parts.push(format!("Location: {location}"));
    }
    let category = payload::first_text(obj, &["category", "keywords"]);
    if let Some(category) = &category {
        description_parts.push(format!("Category: {category}"));
    }
    let description = (!description_parts.is_empty()).then(|| description_parts.join(" | "));

    if should_exclude(&title, description.as_deref(), category.as_deref()) {
        return None;
    }

    let text_blob = format!(
        "{} {} {}",
        title,
        description.as_deref().unwrap_or(""),
        category.as_deref().unwrap_or("")
    );
    let signals = TextSignals::from_blob(&text_blob);
    let (age_min, age_max) = parse_age_range(&title, description.as_deref(), Audience::General);

    Some(ExtractedActivity {
        source_url,
        title,
        description,
        venue_name: Some(MFA_VENUE_NAME.to_string()),
        location_text: Some(MFA_DEFAULT_LOCATION.to_string()),
        city: Some(MFA_CITY.to_string()),
        state: Some(MFA_STATE.to_string()),
        activity_type: Some("workshop".to_string()),
        age_min,
        age_max,
        drop_in: Some(signals.drop_in),
        registration_required: Some(signals.registration_required),
        start_at,
        end_at,
        timezone: EASTERN_TIMEZONE.to_string(),
        free_verification_status: signals.free_status(),
    })
}

fn parse_dom_fallback(doc: &Html, list_url: &str) -> Vec<ExtractedActivity> {
    let mut title_to_links: HashMap<String, Vec<String>> = HashMap::new();
    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if !MFA_EVENT_PATH_RE.is_match(href) {
            continue;
        }
        let title = normalize_space(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() {
            continue;
        }
        title_to_links
            .entry(title)
            .or_default()
            .push(resolve_url(list_url, href));
    }

    if !title_to_links.is_empty() {
        let line_rows = parse_calendar_lines(doc, title_to_links.clone());
        if !line_rows.is_empty() {
            return line_rows;
        }
    }

    parse_anchor_containers(doc, list_url)
}

/// Calendar rows read as text lines: the title line is followed by a date
/// line and a time line, with the category line just before it.
fn parse_calendar_lines(
    doc: &Html,
    mut title_to_links: HashMap<String, Vec<String>>,
) -> Vec<ExtractedActivity> {
    let lines = text_lines(doc);
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();

    for i in 0..lines.len() {
        let title = &lines[i];
        if !title_to_links.contains_key(title) {
            continue;
        }

        let date_line = lines.get(i + 1).map(String::as_str).unwrap_or("");
        let time_line = lines.get(i + 2).map(String::as_str).unwrap_or("");
        let Some(start_at) =
            temporal::parse_datetime_text(format!("{date_line} {time_line}").trim())
        else {
            continue;
        };

        let category_line = if i > 0 { lines[i - 1].as_str() } else { "" };
        let description = lines.get(i + 3).and_then(|candidate| {
            let keep = !candidate.is_empty()
                && !GENERIC_MARKERS.contains(&candidate.as_str())
                && !title_to_links.contains_key(candidate)
                && temporal::parse_datetime_text(candidate).is_none();
            keep.then(|| candidate.clone())
        });

        if should_exclude(title, description.as_deref(), Some(category_line)) {
            continue;
        }

        // Repeated titles consume their links in document order.
        let Some(links) = title_to_links.get_mut(title) else {
            continue;
        };
        let source_url = links.remove(0);
        let title = title.clone();
        if links.is_empty() {
            title_to_links.remove(&title);
        }

        let key = (source_url.clone(), title.clone(), start_at);
        if !seen.insert(key) {
            continue;
        }

        let (age_min, age_max) = parse_age_range(&title, description.as_deref(), Audience::General);
        let text_blob = format!(
            "{category_line} {title} {}",
            description.as_deref().unwrap_or("")
        );
        let signals = TextSignals::from_blob(&text_blob);

        rows.push(ExtractedActivity {
            source_url,
            title,
            description,
            venue_name: Some(MFA_VENUE_NAME.to_string()),
            location_text: Some(MFA_DEFAULT_LOCATION.to_string()),
            city: Some(MFA_CITY.to_string()),
            state: Some(MFA_STATE.to_string()),
            activity_type: Some("workshop".to_string()),
            age_min,
            age_max,
            drop_in: Some(signals.drop_in),
            registration_required: Some(signals.registration_required),
            start_at,
            end_at: None,
            timezone: EASTERN_TIMEZONE.to_string(),
            free_verification_status: signals.free_status(),
        });
    }

    rows
}

/// Last resort: each event anchor's nearest block ancestor is treated as
/// the description blob, which must contain a parseable timestamp.
fn parse_anchor_containers(doc: &Html, list_url: &str) -> Vec<ExtractedActivity> {
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();

    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if !MFA_EVENT_PATH_RE.is_match(href) {
            continue;
        }

        let source_url = resolve_url(list_url, href);
        let title = normalize_space(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() || is_irrelevant_title(&title) {
            continue;
        }

        let blob = container_text(&anchor);
        if blob.is_empty() || should_exclude(&title, Some(&blob), None) {
            continue;
        }
        let Some(start_at) = temporal::parse_datetime_text(&blob) else {
            continue;
        };

        let key = (source_url.clone(), title.clone(), start_at);
        if !seen.insert(key) {
            continue;
        }

        let (age_min, age_max) = parse_age_range(&title, Some(&blob), Audience::General);
        let description = (blob != title).then(|| blob.clone());
        let signals = TextSignals::from_blob(&format!("{title} {blob}"));

        rows.push(ExtractedActivity {
            source_url,
            title,
            description,
            venue_name: Some(MFA_VENUE_NAME.to_string()),
            location_text: Some(MFA_DEFAULT_LOCATION.to_string()),
            city: Some(MFA_CITY.to_string()),
            state: Some(MFA_STATE.to_string()),
            activity_type: Some("workshop".to_string()),
            age_min,
            age_max,
            drop_in: Some(signals.drop_in),
            registration_required: Some(signals.registration_required),
            start_at,
            end_at: None,
            timezone: EASTERN_TIMEZONE.to_string(),
            free_verification_status: signals.free_status(),
        });
    }

    rows
}

/// Nearest block ancestor's text, falling back to the anchor's own.
pub(crate) fn container_text(anchor: &ElementRef<'_>) -> String {
    let container = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "article" | "li" | "section" | "div"));
    let text = match container {
        Some(el) => el.text().collect::<Vec<_>>().join(" "),
        None => anchor.text().collect::<Vec<_>>().join(" "),
    };
    normalize_space(&text)
}

fn should_exclude(title: &str, description: Option<&str>, category: Option<&str>) -> bool {
    let blob = format!(
        "{} {} {}",
        title,
        description.unwrap_or(""),
        category.unwrap_or("")
    );
    GUIDED_TOUR_RE.is_match(&blob) || UNAVAILABLE_TICKETS_RE.is_match(&blob)
}

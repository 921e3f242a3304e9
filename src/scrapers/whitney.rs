//! Whitney teen workshops listing.
//!
//! The listing is filtered server side to teen courses and workshops, so
//! every row defaults to teen ages unless the text states otherwise.
//! Extraction tries embedded JSON payloads first, then the anchor-container
//! scan over `/events/` links.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{Html, Selector};

use super::client::{FetchError, PageFetcher};
use super::{resolve_url, SourceAdapter, EASTERN_TIMEZONE};
use crate::config::Settings;
use crate::extract::age::{parse_age_range, Audience};
use crate::extract::filters::is_irrelevant_title;
use crate::extract::payload::{self, EventShape};
use crate::extract::{first_yield, normalize_space, temporal, ExtractedActivity, TextSignals};

const WHITNEY_TEEN_WORKSHOPS_URL: &str =
    "https://whitney.org/events?tags[]=courses_and_workshops&tags[]=teen_events";
const WHITNEY_REFERER: &str = "https://whitney.org/events";
const WHITNEY_VENUE_NAME: &str = "Whitney Museum of American Art";
const WHITNEY_CITY: &str = "New York";
const WHITNEY_STATE: &str = "NY";
const WHITNEY_DEFAULT_LOCATION: &str = "New York, NY";

static WHITNEY_EVENT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/events/[^\s?#]+").unwrap());

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

const EVENT_SHAPE: EventShape = EventShape {
    url_markers: &["/events/"],
};

pub struct WhitneyEventsAdapter {
    url: String,
}

impl WhitneyEventsAdapter {
    pub fn new() -> Self {
        Self {
            url: WHITNEY_TEEN_WORKSHOPS_URL.to_string(),
        }
    }
}

impl Default for WhitneyEventsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for WhitneyEventsAdapter {
    fn id(&self) -> &'static str {
        "whitney"
    }

    fn display_name(&self) -> &'static str {
        "Whitney (teen workshops)"
    }

    fn list_url(&self) -> &str {
        &self.url
    }

    async fn fetch_pages(
        &self,
        fetcher: &PageFetcher,
        _settings: &Settings,
    ) -> Result<Vec<String>, FetchError> {
        Ok(vec![fetcher.fetch(&self.url, WHITNEY_REFERER).await?])
    }

    fn extract(&self, html: &str) -> Vec<ExtractedActivity> {
        parse_whitney_events_html(html, &self.url)
    }
}

pub fn parse_whitney_events_html(html: &str, list_url: &str) -> Vec<ExtractedActivity> {
    let doc = Html::parse_document(html);
    first_yield(&[
        &|| parse_json_payloads(&doc, list_url),
        &|| parse_anchor_containers(&doc, list_url),
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
    if !source_url.contains("/events/") {
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
    if let Some(category) = payload::first_text(obj, &["category", "keywords"]) {
        description_parts.push(format!("Category: {category}"));
    }
    let description = (!description_parts.is_empty()).then(|| description_parts.join(" | "));

    let signals = TextSignals::from_blob(&format!(
        "{} {}",
        title,
        description.as_deref().unwrap_or("")
    ));
    let (age_min, age_max) = parse_age_range(&title, description.as_deref(), Audience::Teens);

    Some(ExtractedActivity {
        source_url,
        title,
        description,
        venue_name: Some(WHITNEY_VENUE_NAME.to_string()),
        location_text: Some(WHITNEY_DEFAULT_LOCATION.to_string()),
        city: Some(WHITNEY_CITY.to_string()),
        state: Some(WHITNEY_STATE.to_string()),
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

/// Each event anchor's nearest block ancestor is read as the description
/// blob, which must contain a parseable timestamp.
fn parse_anchor_containers(doc: &Html, list_url: &str) -> Vec<ExtractedActivity> {
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();

    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if !WHITNEY_EVENT_PATH_RE.is_match(href) {
            continue;
        }

        let source_url = resolve_url(list_url, href);
        let title = normalize_space(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() || is_irrelevant_title(&title) {
            continue;
        }

        let blob = super::mfa::container_text(&anchor);
        if blob.is_empty() {
            continue;
        }
        let Some(start_at) = temporal::parse_datetime_text(&blob) else {
            continue;
        };

        let key = (source_url.clone(), title.clone(), start_at);
        if !seen.insert(key) {
            continue;
        }

        let (age_min, age_max) = parse_age_range(&title, Some(&blob), Audience::Teens);
        let description = (blob != title).then(|| blob.clone());
        let signals = TextSignals::from_blob(&format!("{title} {blob}"));

        rows.push(ExtractedActivity {
            source_url,
            title,
            description,
            venue_name: Some(WHITNEY_VENUE_NAME.to_string()),
            location_text: Some(WHITNEY_DEFAULT_LOCATION.to_string()),
            city: Some(WHITNEY_CITY.to_string()),
            state: Some(WHITNEY_STATE.to_string()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::models::FreeVerificationStatus;

    const LIST_URL: &str = WHITNEY_TEEN_WORKSHOPS_URL;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_json_payload_teen_defaults() {
        let html = r#"<script type="application/ld+json">
            {"@type": "Event", "name": "Open Studio for Teens",
             "url": "https://whitney.org/events/open-studio-teens",
             "startDate": "2025-06-06T16:00:00", "endDate": "2025-06-06T18:00:00",
             "description": "Free art-making with teaching artists."}
        </script>"#;
        let rows = parse_whitney_events_html(html, LIST_URL);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!((row.age_min, row.age_max), (Some(13), Some(17)));
        assert_eq!(row.start_at, at(2025, 6, 6, 16, 0));
        assert_eq!(row.end_at, Some(at(2025, 6, 6, 18, 0)));
        assert_eq!(
            row.free_verification_status,
            FreeVerificationStatus::Confirmed
        );
    }

    #[test]
    fn test_json_payload_requires_events_path() {
        let html = r#"<script type="application/ld+json">
            {"@type": "Event", "name": "Member Preview",
             "url": "/exhibitions/preview", "startDate": "2025-06-06T10:00:00"}
        </script>"#;
        assert!(parse_whitney_events_html(html, LIST_URL).is_empty());
    }

    #[test]
    fn test_explicit_ages_override_teen_default() {
        let html = r#"<script type="application/ld+json">
            {"@type": "Event", "name": "Youth Insights Lab",
             "url": "/events/youth-insights", "startDate": "2025-06-07T11:00:00",
             "description": "For ages 15 to 18. Registration required."}
        </script>"#;
        let rows = parse_whitney_events_html(html, LIST_URL);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].age_min, rows[0].age_max), (Some(15), Some(18)));
        assert_eq!(rows[0].registration_required, Some(true));
        assert_eq!(
            rows[0].free_verification_status,
            FreeVerificationStatus::Inferred
        );
    }

    #[test]
    fn test_anchor_container_fallback() {
        let html = r#"<html><body>
            <article>
                <a href="/events/teen-printmaking">Teen Printmaking Workshop</a>
                <p>Friday, June 6, 2025, 4:00 pm. Free, drop-in.</p>
            </article>
            <article>
                <a href="/events/undated-workshop">Undated Workshop</a>
                <p>Schedule to be announced.</p>
            </article>
        </body></html>"#;
        let rows = parse_whitney_events_html(html, LIST_URL);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.title, "Teen Printmaking Workshop");
        assert_eq!(
            row.source_url,
            "https://whitney.org/events/teen-printmaking"
        );
        assert_eq!(row.start_at, at(2025, 6, 6, 16, 0));
        assert_eq!(row.drop_in, Some(true));
        assert_eq!((row.age_min, row.age_max), (Some(13), Some(17)));
    }
}

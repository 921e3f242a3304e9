//! MoMA calendar, filtered per audience.
//!
//! The same calendar page is fetched twice with different audience filters
//! (teens and kids), so one adapter type backs two source ids. Extraction
//! tries embedded JSON payloads first, then walks h2 date headings and
//! event anchors in document order, carrying the current day across
//! anchors. The calendar never states prices, so free status is always
//! inferred here.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::client::{FetchError, PageFetcher};
use super::{resolve_url, SourceAdapter, EASTERN_TIMEZONE};
use crate::config::Settings;
use crate::extract::age::{parse_age_range, Audience};
use crate::extract::filters::is_irrelevant_title;
use crate::extract::payload::{self, EventShape};
use crate::extract::{first_yield, normalize_space, temporal, ExtractedActivity, TextSignals};
use crate::models::FreeVerificationStatus;

const MOMA_TEENS_CALENDAR_URL: &str = "https://www.moma.org/calendar/?happening_filter=For+teens";
const MOMA_KIDS_CALENDAR_URL: &str = "https://www.moma.org/calendar/?happening_filter=For+kids";
const MOMA_REFERER: &str = "https://www.moma.org/calendar/";
const MOMA_VENUE_NAME: &str = "MoMA";
const MOMA_CITY: &str = "New York";
const MOMA_STATE: &str = "NY";
const MOMA_DEFAULT_LOCATION: &str = "New York, NY";

static MOMA_EVENT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/calendar/events/\d+").unwrap());

/// Calendar times always carry minutes; a bare "3 PM" in running text is
/// more likely a title fragment than a start time.
static TIME_WITH_MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d{1,2}:\d{2}\s*(?:a\.?m\.?|p\.?m\.?)").unwrap());

static HEADING_AND_ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, a[href]").unwrap());

static PARAGRAPH_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").unwrap());

const EVENT_SHAPE: EventShape = EventShape {
    url_markers: &["/calendar/events/"],
};

pub struct MomaCalendarAdapter {
    id: &'static str,
    name: &'static str,
    url: String,
    audience: Audience,
}

impl MomaCalendarAdapter {
    pub fn teens() -> Self {
        Self {
            id: "moma-teens",
            name: "MoMA (teen calendar)",
            url: MOMA_TEENS_CALENDAR_URL.to_string(),
            audience: Audience::Teens,
        }
    }

    pub fn kids() -> Self {
        Self {
            id: "moma-kids",
            name: "MoMA (kids calendar)",
            url: MOMA_KIDS_CALENDAR_URL.to_string(),
            audience: Audience::Kids,
        }
    }
}

#[async_trait]
impl SourceAdapter for MomaCalendarAdapter {
    fn id(&self) -> &'static str {
        self.id
    }

    fn display_name(&self) -> &'static str {
        self.name
    }

    fn list_url(&self) -> &str {
        &self.url
    }

    async fn fetch_pages(
        &self,
        fetcher: &PageFetcher,
        _settings: &Settings,
    ) -> Result<Vec<String>, FetchError> {
        Ok(vec![fetcher.fetch(&self.url, MOMA_REFERER).await?])
    }

    fn extract(&self, html: &str) -> Vec<ExtractedActivity> {
        parse_moma_events_html(
            html,
            self.audience,
            &self.url,
            chrono::Local::now().naive_local(),
        )
    }
}

pub fn parse_moma_events_html(
    html: &str,
    audience: Audience,
    list_url: &str,
    now: NaiveDateTime,
) -> Vec<ExtractedActivity> {
    let doc = Html::parse_document(html);
    first_yield(&[
        &|| parse_json_payloads(&doc, audience, list_url),
        &|| parse_dom_fallback(&doc, audience, list_url, now),
    ])
}

fn parse_json_payloads(
    doc: &Html,
    audience: Audience,
    list_url: &str,
) -> Vec<ExtractedActivity> {
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();
    for obj in payload::event_nodes(doc, &EVENT_SHAPE) {
        let Some(row) = build_row_from_event(&obj, audience, list_url) else {
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
    audience: Audience,
    list_url: &str,
) -> Option<ExtractedActivity> {
    let title = payload::first_string(obj, &["name", "title"])?;
    if is_irrelevant_title(&title) {
        return None;
    }

    let source_url = resolve_url(
        list_url,
        &payload::first_string(obj, &["url", "@id"]).unwrap_or_else(|| list_url.to_string()),
    );

    let start_at = ["startDate", "start_date"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(payload::datetime_of))?;
    let end_at = ["endDate", "end_date"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(payload::datetime_of));

    let mut description_parts = Vec::new();
    if let Some(description) = obj.get("description").and_then(payload::normalize_text) {
        description_parts.push(description);
    }
    if let Some(location) = obj.get("location").and_then(payload::location_name) {
        description_parts.push(format!("Location: {location}"));
    }
    if let Some(audience_blob) = obj.get("audience").and_then(payload::normalize_text) {
        description_parts.push(format!("Audience: {audience_blob}"));
    }
    let description = (!description_parts.is_empty()).then(|| description_parts.join(" | "));

    let text_blob = format!(
        "{} {} {} {}",
        title,
        description.as_deref().unwrap_or(""),
        obj.get("eventAttendanceMode")
            .and_then(payload::normalize_text)
            .unwrap_or_default(),
        obj.get("offers")
            .and_then(payload::normalize_text)
            .unwrap_or_default()
    );
    let signals = TextSignals::from_blob(&text_blob);
    let (age_min, age_max) = parse_age_range(&title, description.as_deref(), audience);

    Some(ExtractedActivity {
        source_url,
        title,
        description,
        venue_name: Some(MOMA_VENUE_NAME.to_string()),
        location_text: Some(MOMA_DEFAULT_LOCATION.to_string()),
        city: Some(MOMA_CITY.to_string()),
        state: Some(MOMA_STATE.to_string()),
        activity_type: Some("workshop".to_string()),
        age_min,
        age_max,
        drop_in: Some(signals.drop_in),
        registration_required: Some(signals.registration_required),
        start_at,
        end_at,
        timezone: EASTERN_TIMEZONE.to_string(),
        free_verification_status: FreeVerificationStatus::Inferred,
    })
}

/// Walk h2 date headings and event anchors in document order. Each heading
/// moves the current day; anchors inherit it until the next heading.
fn parse_dom_fallback(
    doc: &Html,
    audience: Audience,
    list_url: &str,
    now: NaiveDateTime,
) -> Vec<ExtractedActivity> {
    let default_day = base_day_from_url(list_url, now);
    let mut current_day = default_day;
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();

    for node in doc.select(&HEADING_AND_ANCHOR_SELECTOR) {
        if node.value().name() == "h2" {
            let heading = normalize_space(&node.text().collect::<Vec<_>>().join(" "));
            if let Some(day) = temporal::parse_heading_day(&heading, default_day) {
                current_day = day;
            }
            continue;
        }

        let href = node.value().attr("href").unwrap_or("");
        if !MOMA_EVENT_PATH_RE.is_match(href) {
            continue;
        }

        let source_url = resolve_url(list_url, href);
        let (title, details) = anchor_text_parts(&node);
        if title.is_empty() || is_irrelevant_title(&title) {
            continue;
        }

        let description = (!details.is_empty()).then(|| details.join(" | "));
        let start_at = std::iter::once(title.as_str())
            .chain(details.iter().map(String::as_str))
            .find_map(|text| time_parts_with_minutes(text))
            .and_then(|(hour, minute)| {
                current_day
                    .date()
                    .and_hms_opt(hour, minute, 0)
            })
            .unwrap_or(current_day);

        let key = (source_url.clone(), title.clone(), start_at);
        if !seen.insert(key) {
            continue;
        }

        let (age_min, age_max) = parse_age_range(&title, description.as_deref(), audience);
        let signals =
            TextSignals::from_blob(&format!("{title} {}", description.as_deref().unwrap_or("")));

        rows.push(ExtractedActivity {
            source_url,
            title,
            description,
            venue_name: Some(MOMA_VENUE_NAME.to_string()),
            location_text: Some(MOMA_DEFAULT_LOCATION.to_string()),
            city: Some(MOMA_CITY.to_string()),
            state: Some(MOMA_STATE.to_string()),
            activity_type: Some("workshop".to_string()),
            age_min,
            age_max,
            drop_in: Some(signals.drop_in),
            registration_required: Some(signals.registration_required),
            start_at,
            end_at: None,
            timezone: EASTERN_TIMEZONE.to_string(),
            free_verification_status: FreeVerificationStatus::Inferred,
        });
    }

    rows
}

/// The calendar URL may pin the page to a day via a `date=YYYY-MM-DD`
/// query parameter; otherwise today at midnight anchors the headings.
fn base_day_from_url(list_url: &str, now: NaiveDateTime) -> NaiveDateTime {
    url::Url::parse(list_url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "date")
                .and_then(|(_, value)| value.parse::<chrono::NaiveDate>().ok())
        })
        .map(|date| date.and_time(NaiveTime::MIN))
        .unwrap_or_else(|| now.date().and_time(NaiveTime::MIN))
}

/// Flatten an event anchor into a title line plus detail lines, preferring
/// its `<p>` children over raw text nodes.
fn anchor_text_parts(anchor: &ElementRef<'_>) -> (String, Vec<String>) {
    let mut lines: Vec<String> = anchor
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| normalize_space(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        lines = anchor
            .text()
            .map(normalize_space)
            .filter(|line| !line.is_empty())
            .collect();
    }

    let Some(title) = lines.first().cloned() else {
        return (String::new(), Vec::new());
    };
    let details = lines
        .into_iter()
        .skip(1)
        .filter(|line| line != &title)
        .collect();
    (title, details)
}

fn time_parts_with_minutes(text: &str) -> Option<(u32, u32)> {
    if TIME_WITH_MINUTES_RE.is_match(text) {
        temporal::parse_time_parts(text)
    } else {
        None
    }
}

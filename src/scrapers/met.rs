//! The Met's teen workshops listing.
//!
//! The Met renders its events page client side, but the server response
//! embeds the search index's event records as escaped JSON
//! (`\"_source\":{...}`). That payload is the primary strategy; a
//! line-cursor scan over the rendered text covers static snapshots where
//! the payload is absent. This is the one source where a plain fetch can
//! legitimately fail on the empty shell, so it gets the headless-browser
//! rendered fallback.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use super::browser::BrowserRenderer;
use super::client::{FetchError, PageFetcher};
use super::{EASTERN_TIMEZONE, SourceAdapter};
use crate::config::Settings;
use crate::extract::age::{parse_age_range, Audience};
use crate::extract::filters::is_irrelevant_title;
use crate::extract::lines::{text_lines, LineScanner};
use crate::extract::{first_yield, normalize_space, payload, temporal, ExtractedActivity};
use crate::models::FreeVerificationStatus;

pub const MET_TEENS_FREE_WORKSHOPS_URL: &str =
    "https://www.metmuseum.org/events?audience=teens&price=free&type=workshopsClasses";
const MET_REFERER: &str = "https://www.metmuseum.org/events";
const MET_VENUE_NAME: &str = "The Metropolitan Museum of Art";
const MET_CITY: &str = "New York";
const MET_STATE: &str = "NY";
const MET_DEFAULT_LOCATION: &str = "New York, NY";

static EMBEDDED_SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\\"_source\\":(\{.*?\})\\,\\"highlight\\""#).unwrap()
});

/// Exact-match date headings, e.g. `Saturday, March 8`.
static DATE_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),\s+([A-Za-z]+\s+\d{1,2})$",
    )
    .unwrap()
});

static TIME_LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2}:\d{2}\s*[AP]M)\s*(.*)$").unwrap());

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

pub struct MetEventsAdapter {
    url: String,
}

impl MetEventsAdapter {
    pub fn new() -> Self {
        Self {
            url: MET_TEENS_FREE_WORKSHOPS_URL.to_string(),
        }
    }
}

impl Default for MetEventsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for MetEventsAdapter {
    fn id(&self) -> &'static str {
        "met"
    }

    fn display_name(&self) -> &'static str {
        "The Met (teen workshops)"
    }

    fn list_url(&self) -> &str {
        &self.url
    }

    fn adapter_type(&self) -> &'static str {
        "rendered_html"
    }

    async fn fetch_pages(
        &self,
        fetcher: &PageFetcher,
        settings: &Settings,
    ) -> Result<Vec<String>, FetchError> {
        match fetcher.fetch(&self.url, MET_REFERER).await {
            Ok(html) => Ok(vec![html]),
            Err(err) if settings.use_browser_fallback => {
                match BrowserRenderer::new(settings).render(&self.url).await {
                    Ok(html) => Ok(vec![html]),
                    Err(render) => Err(FetchError::RenderFallback {
                        render: render.to_string(),
                        source: Box::new(err),
                    }),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn extract(&self, html: &str) -> Vec<ExtractedActivity> {
        parse_met_events_html(html, Local::now().naive_local())
    }
}

pub fn parse_met_events_html(html: &str, now: NaiveDateTime) -> Vec<ExtractedActivity> {
    first_yield(&[
        &|| parse_embedded_sources(html),
        &|| parse_text_lines(html, now),
    ])
}

/// Primary strategy: the escaped search-index records in the page script.
fn parse_embedded_sources(html: &str) -> Vec<ExtractedActivity> {
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();

    for caps in EMBEDDED_SOURCE_RE.captures_iter(html) {
        let unescaped = caps[1].replace("\\\"", "\"").replace("\\/", "/");
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&unescaped) else {
            continue;
        };

        // Free-only records whose audience includes teens.
        let paid = match obj.get("paid") {
            Some(Value::String(s)) => s.to_lowercase(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if truthy(obj.get("isPaid")) || (!paid.is_empty() && paid != "free") {
            continue;
        }
        let has_teen_audience = obj
            .get("audiences")
            .and_then(Value::as_array)
            .is_some_and(|items| {
                items.iter().any(|v| {
                    payload::normalize_text(v).is_some_and(|t| t.to_lowercase().contains("teen"))
                })
            });
        if !has_teen_audience {
            continue;
        }

        let Some(url) = string_field(&obj, "url") else {
            continue;
        };
        let Some(title) = string_field(&obj, "title") else {
            continue;
        };
        if is_irrelevant_title(&title) {
            continue;
        }
        let Some(start_at) = obj
            .get("startDate")
            .and_then(Value::as_str)
            .and_then(temporal::parse_datetime_text)
        else {
            continue;
        };
        let end_at = obj
            .get("endDate")
            .and_then(Value::as_str)
            .and_then(temporal::parse_datetime_text);

        let mut description_parts = Vec::new();
        let teaser = strip_html_fragment(obj.get("teaserText").and_then(Value::as_str).unwrap_or(""));
        if !teaser.is_empty() {
            description_parts.push(teaser);
        }
        let location = strip_html_fragment(obj.get("location").and_then(Value::as_str).unwrap_or(""));
        if !location.is_empty() {
            description_parts.push(format!("Location: {location}"));
        }
        if let Some(programs) = obj.get("programs").and_then(Value::as_array) {
            if !programs.is_empty() {
                let joined: Vec<String> =
                    programs.iter().filter_map(payload::normalize_text).collect();
                description_parts.push(format!("Programs: {}", joined.join(", ")));
            }
        }
        let description = (!description_parts.is_empty()).then(|| description_parts.join(" | "));

        let (age_min, age_max) =
            parse_age_range(&title, description.as_deref(), Audience::General);
        let category_blob: Vec<String> = obj
            .get("searchCategories")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(payload::normalize_text).collect())
            .unwrap_or_default();
        let text_blob = format!(
            "{} {} {}",
            title,
            description.as_deref().unwrap_or(""),
            category_blob.join(" ")
        )
        .to_lowercase();

        let key = (url.clone(), title.clone(), start_at);
        if !seen.insert(key) {
            continue;
        }

        rows.push(ExtractedActivity {
            source_url: url,
            title,
            description,
            venue_name: Some(MET_VENUE_NAME.to_string()),
            location_text: Some(MET_DEFAULT_LOCATION.to_string()),
            city: Some(MET_CITY.to_string()),
            state: Some(MET_STATE.to_string()),
            activity_type: Some("workshop".to_string()),
            age_min,
            age_max,
            drop_in: Some(text_blob.contains("drop-in") || text_blob.contains("drop in")),
            registration_required: Some(truthy(obj.get("ticketRequired"))),
            start_at,
            end_at,
            timezone: EASTERN_TIMEZONE.to_string(),
            free_verification_status: FreeVerificationStatus::Confirmed,
        });
    }

    rows
}

/// Fallback strategy for static snapshots: scan the rendered text lines.
fn parse_text_lines(html: &str, now: NaiveDateTime) -> Vec<ExtractedActivity> {
    let doc = Html::parse_document(html);

    // Event-detail links in document order, keyed by their anchor text.
    let mut title_to_links: HashMap<String, Vec<String>> = HashMap::new();
    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        let text = normalize_space(&anchor.text().collect::<Vec<_>>().join(" "));
        if text.is_empty() || !href.contains("engage.metmuseum.org") {
            continue;
        }
        title_to_links.entry(text).or_default().push(href.to_string());
    }

    let lines = text_lines(&doc);
    let parse_heading = |line: &str| {
        DATE_HEADING_RE
            .captures(line)
            .and_then(|caps| temporal::parse_date_heading(&caps[2], now))
    };
    let is_title = |line: &str| title_to_links.contains_key(line);
    let is_time = |line: &str| TIME_LOCATION_RE.is_match(line);
    let is_price = |line: &str| looks_like_price(line);
    let scanner = LineScanner {
        parse_heading: &parse_heading,
        is_title: &is_title,
        is_time: &is_time,
        is_price: &is_price,
    };

    let mut rows = Vec::new();
    for block in scanner.scan(&lines) {
        if is_irrelevant_title(&block.title) {
            continue;
        }
        // Free-only rule: a price line without "free" is non-free noise.
        if let Some(price) = &block.price_line {
            if !price.to_lowercase().contains("free") {
                continue;
            }
        }
        let Some(source_url) = title_to_links
            .get(&block.title)
            .and_then(|links| links.first())
            .cloned()
        else {
            continue;
        };

        let day = block.date.unwrap_or(now);
        let time = block.time_line.as_deref().and_then(temporal::parse_time_parts);
        let Some(start_at) = day
            .date()
            .and_hms_opt(time.map_or(0, |(h, _)| h), time.map_or(0, |(_, m)| m), 0)
        else {
            continue;
        };

        let (age_min, age_max) =
            parse_age_range(&block.title, block.description.as_deref(), Audience::General);

        let mut description_parts = Vec::new();
        if let Some(desc) = &block.description {
            description_parts.push(desc.clone());
        }
        if let Some(time_line) = &block.time_line {
            description_parts.push(time_line.clone());
        }
        if let Some(price_line) = &block.price_line {
            description_parts.push(price_line.clone());
        }
        let description = (!description_parts.is_empty()).then(|| description_parts.join(" | "));

        let blob = format!(
            "{} {}",
            block.title,
            block.description.as_deref().unwrap_or("")
        )
        .to_lowercase();

        rows.push(ExtractedActivity {
            source_url,
            title: block.title,
            description,
            venue_name: Some(MET_VENUE_NAME.to_string()),
            location_text: Some(MET_DEFAULT_LOCATION.to_string()),
            city: Some(MET_CITY.to_string()),
            state: Some(MET_STATE.to_string()),
            activity_type: Some("workshop".to_string()),
            age_min,
            age_max,
            drop_in: Some(blob.contains("drop-in") || blob.contains("drop in")),
            registration_required: Some(blob.contains("registration required")),
            start_at,
            end_at: None,
            timezone: EASTERN_TIMEZONE.to_string(),
            free_verification_status: if block.price_line.is_some() {
                FreeVerificationStatus::Confirmed
            } else {
                FreeVerificationStatus::Inferred
            },
        });
    }

    rows
}

fn looks_like_price(text: &str) -> bool {
    let low = text.to_lowercase();
    low.contains("free") || text.contains('$') || low.contains("member") || low.contains("ticket")
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// JSON truthiness: false/null/empty are false, everything else true.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Unescape and strip an HTML fragment (teaser text carries markup).
fn strip_html_fragment(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(value);
    normalize_space(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn embedded(source: &str) -> String {
        format!(r#"<html><script>{{"hits":"\"_source\":{source}\,\"highlight\":..."}}</script></html>"#)
    }

    const TEEN_FREE: &str = r#"{\"title\":\"Teen Studio: Printmaking\",\"url\":\"https://www.metmuseum.org/events/teen-studio\",\"startDate\":\"2025-03-07T15:00:00\",\"endDate\":\"2025-03-07T17:00:00\",\"audiences\":[\"Teens\"],\"paid\":\"Free\",\"teaserText\":\"Drop-in printmaking for teens.\",\"location\":\"Education Center\",\"programs\":[\"Teen Programs\"],\"ticketRequired\":false}"#;

    #[test]
    fn test_embedded_row() {
        let html = embedded(TEEN_FREE);
        let rows = parse_met_events_html(&html, now());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.title, "Teen Studio: Printmaking");
        assert_eq!(row.source_url, "https://www.metmuseum.org/events/teen-studio");
        assert_eq!(
            row.start_at,
            NaiveDate::from_ymd_opt(2025, 3, 7)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap()
        );
        assert!(row.end_at.is_some());
        assert_eq!(row.drop_in, Some(true));
        assert_eq!(row.registration_required, Some(false));
        assert_eq!(
            row.description.as_deref(),
            Some("Drop-in printmaking for teens. | Location: Education Center | Programs: Teen Programs")
        );
        assert_eq!(
            row.free_verification_status,
            FreeVerificationStatus::Confirmed
        );
    }

    #[test]
    fn test_embedded_paid_and_non_teen_skipped() {
        let paid = r#"{\"title\":\"Gala\",\"url\":\"https://www.metmuseum.org/events/gala\",\"startDate\":\"2025-03-07T19:00:00\",\"audiences\":[\"Teens\"],\"isPaid\":true}"#;
        assert!(parse_met_events_html(&embedded(paid), now()).is_empty());

        let adults = r#"{\"title\":\"Evening Tour\",\"url\":\"https://www.metmuseum.org/events/tour\",\"startDate\":\"2025-03-07T19:00:00\",\"audiences\":[\"Adults\"],\"paid\":\"Free\"}"#;
        assert!(parse_met_events_html(&embedded(adults), now()).is_empty());
    }

    #[test]
    fn test_structured_payload_wins_over_dom() {
        // Both the embedded payload and a line-parseable body are present;
        // only the payload row comes back.
        let html = format!(
            r#"{}<body>
                <p>Saturday, March 8</p>
                <p><a href="https://engage.metmuseum.org/events/dom-only">DOM Only Event</a></p>
                <p>3:00 PM</p>
            </body>"#,
            embedded(TEEN_FREE)
        );
        let rows = parse_met_events_html(&html, now());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Teen Studio: Printmaking");
    }

    #[test]
    fn test_line_cursor_fallback() {
        let html = r#"<html><body>
            <div>
                <p>Saturday, March 8</p>
                <p><a href="https://engage.metmuseum.org/events/drawing">Drop-in Drawing</a></p>
                <p>Sketching in the galleries. Ages 13-17.</p>
                <p>3:00 PM Gallery 135</p>
                <p>Free</p>
                <p><a href="https://engage.metmuseum.org/events/paid-thing">Paid Workshop</a></p>
                <p>5:00 PM Studio</p>
                <p>$12</p>
            </div>
        </body></html>"#;
        let rows = parse_met_events_html(html, now());
        // The $12 block is dropped by the free-only rule.
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.title, "Drop-in Drawing");
        assert_eq!(
            row.start_at,
            NaiveDate::from_ymd_opt(2025, 3, 8)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap()
        );
        assert_eq!((row.age_min, row.age_max), (Some(13), Some(17)));
        assert_eq!(row.drop_in, Some(true));
        assert_eq!(
            row.free_verification_status,
            FreeVerificationStatus::Confirmed
        );
    }

    #[test]
    fn test_line_cursor_without_heading_uses_today() {
        let html = r#"<html><body>
            <p><a href="https://engage.metmuseum.org/events/x">Teen Workshop</a></p>
        </body></html>"#;
        let rows = parse_met_events_html(html, now());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_at, now().date().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(
            rows[0].free_verification_status,
            FreeVerificationStatus::Inferred
        );
    }

    #[test]
    fn test_strip_html_fragment() {
        assert_eq!(
            strip_html_fragment("<p>Drop-in &amp; draw</p>"),
            "Drop-in & draw"
        );
        assert_eq!(strip_html_fragment(""), "");
    }
}

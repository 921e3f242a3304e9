//! Structured-payload extraction.
//!
//! Listing pages embed event data in inline scripts three ways: schema.org
//! `application/ld+json` blocks, Next.js `__NEXT_DATA__` state, and ad-hoc
//! scripts that assign a JSON object to a variable. The first two are taken
//! verbatim; anything else contributes its first balanced `{...}` span. A
//! recursive walker then yields every node that is `@type`-tagged as an
//! Event or that structurally looks like one.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::{normalize_space, temporal};

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").unwrap());

const TITLE_KEYS: [&str; 3] = ["name", "title", "headline"];
const START_KEYS: [&str; 5] = ["startDate", "start_date", "start", "date", "dateTime"];
const END_KEYS: [&str; 3] = ["endDate", "end_date", "end"];
const URL_KEYS: [&str; 3] = ["url", "@id", "path"];

/// Per-source shape hints for the event walker.
pub struct EventShape {
    /// URL fragments that mark a detail-page link for this source, e.g.
    /// `"/calendar/events/"`.
    pub url_markers: &'static [&'static str],
}

impl EventShape {
    /// Structural check: a node with a title-ish key, a start-ish key, and
    /// a non-empty URL-ish value is treated as an event candidate.
    pub fn looks_like_event(&self, obj: &Map<String, Value>) -> bool {
        let has_title = TITLE_KEYS
            .iter()
            .any(|key| scalar_string(obj.get(*key)).is_some());
        let has_start = START_KEYS
            .iter()
            .any(|key| obj.get(*key).is_some_and(|v| !v.is_null()));
        if !has_title || !has_start {
            return false;
        }
        match URL_KEYS.iter().find_map(|key| scalar_string(obj.get(*key))) {
            Some(url) => {
                self.url_markers.iter().any(|marker| url.contains(marker)) || !url.is_empty()
            }
            None => false,
        }
    }
}

/// Collect candidate JSON payload strings from inline scripts.
pub fn script_payloads(doc: &Html) -> Vec<String> {
    let mut payloads = Vec::new();
    for element in doc.select(&SCRIPT_SELECTOR) {
        let raw: String = element.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let kind = element.value().attr("type").unwrap_or("");
        let id = element.value().attr("id").unwrap_or("");
        if kind.eq_ignore_ascii_case("application/ld+json") || id == "__NEXT_DATA__" {
            payloads.push(raw.to_string());
        } else if let Some(object) = first_json_object(raw) {
            payloads.push(object.to_string());
        }
    }
    payloads
}

/// Extract the first balanced `{...}` span from script text.
///
/// Brace matching respects JSON strings and escapes, so braces inside
/// string literals never unbalance the scan. Returns `None` when no object
/// opens, or the one that opens never closes.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in text.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse every script payload and yield all event-shaped nodes.
///
/// Payloads that fail to parse as JSON are silently skipped.
pub fn event_nodes(doc: &Html, shape: &EventShape) -> Vec<Map<String, Value>> {
    let mut nodes = Vec::new();
    for payload in script_payloads(doc) {
        let Ok(value) = serde_json::from_str::<Value>(&payload) else {
            continue;
        };
        walk_events(&value, shape, &mut |obj| nodes.push(obj.clone()));
    }
    nodes
}

/// Depth-first walk yielding `@type` Event nodes and structural matches.
pub fn walk_events(
    value: &Value,
    shape: &EventShape,
    out: &mut dyn FnMut(&Map<String, Value>),
) {
    match value {
        Value::Object(obj) => {
            if obj.get("@type").is_some_and(is_event_type) || shape.looks_like_event(obj) {
                out(obj);
            }
            for child in obj.values() {
                walk_events(child, shape, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_events(item, shape, out);
            }
        }
        _ => {}
    }
}

/// True for `@type` values that are (or contain) an Event type, including
/// subtypes like `"TheaterEvent"` and type lists.
fn is_event_type(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("Event"),
        Value::Array(items) => items.iter().any(is_event_type),
        _ => false,
    }
}

/// First key whose value stringifies to non-empty text.
pub fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| scalar_string(obj.get(*key)))
}

/// Title of an event node.
pub fn title_of(obj: &Map<String, Value>) -> Option<String> {
    first_string(obj, &TITLE_KEYS)
}

/// URL-ish value of an event node, unresolved.
pub fn url_of(obj: &Map<String, Value>) -> Option<String> {
    first_string(obj, &URL_KEYS)
}

/// Start datetime of an event node, trying the start-ish keys in order.
pub fn start_of(obj: &Map<String, Value>) -> Option<NaiveDateTime> {
    START_KEYS.iter().find_map(|key| obj.get(*key).and_then(datetime_of))
}

/// End datetime of an event node, if any.
pub fn end_of(obj: &Map<String, Value>) -> Option<NaiveDateTime> {
    END_KEYS.iter().find_map(|key| obj.get(*key).and_then(datetime_of))
}

/// First key whose value flattens to non-empty display text.
///
/// Unlike [`first_string`] this accepts arrays and objects, joining their
/// parts, so it suits description and keyword fields.
pub fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(normalize_text))
}

/// Flatten any JSON value to display text.
///
/// Strings are whitespace-normalized; arrays and objects are joined with
/// `", "`; scalars are rendered with `to_string`.
pub fn normalize_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => normalize_space(s),
        Value::Array(items) => items
            .iter()
            .filter_map(normalize_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(obj) => obj
            .values()
            .filter_map(normalize_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Pull a human-readable location name out of a schema.org location value,
/// which may be a string, a Place object, or a list of either.
pub fn location_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = normalize_space(s);
            (!s.is_empty()).then_some(s)
        }
        Value::Object(obj) => obj
            .get("name")
            .and_then(normalize_text)
            .or_else(|| obj.get("address").and_then(normalize_text)),
        Value::Array(items) => items.iter().find_map(location_name),
        _ => None,
    }
}

/// Coerce a JSON value to a datetime: strings go through the temporal
/// parser, objects through their nested start keys, lists to the first
/// member that parses.
pub fn datetime_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => temporal::parse_datetime_text(s),
        Value::Object(obj) => START_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(datetime_of)),
        Value::Array(items) => items.iter().find_map(datetime_of),
        _ => None,
    }
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => normalize_space(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_json_object_balanced() {
        let script = r#"window.__STATE__ = {"a": {"b": "}"}, "c": 1}; doSomething();"#;
        let object = first_json_object(script).unwrap();
        assert_eq!(object, r#"{"a": {"b": "}"}, "c": 1}"#);
        let parsed: Value = serde_json::from_str(object).unwrap();
        assert_eq!(parsed["c"], 1);
    }

    #[test]
    fn test_first_json_object_escaped_quote() {
        let script = r#"var x = {"quote": "she said \"hi\" {"};"#;
        let parsed: Value = serde_json::from_str(first_json_object(script).unwrap()).unwrap();
        assert_eq!(parsed["quote"], "she said \"hi\" {");
    }

    #[test]
    fn test_first_json_object_unbalanced() {
        assert_eq!(first_json_object("var x = {\"open\": true"), None);
        assert_eq!(first_json_object("no braces here"), None);
    }

    #[test]
    fn test_script_payloads_kinds() {
        let html = Html::parse_document(
            r#"<html><head>
                <script type="application/ld+json">{"@type": "Event", "name": "A"}</script>
                <script id="__NEXT_DATA__" type="application/json">{"props": {}}</script>
                <script>window.data = {"inline": true}; init();</script>
                <script></script>
            </head></html>"#,
        );
        let payloads = script_payloads(&html);
        assert_eq!(payloads.len(), 3);
        assert!(payloads[0].contains("@type"));
        assert!(payloads[1].contains("props"));
        assert_eq!(payloads[2], r#"{"inline": true}"#);
    }

    #[test]
    fn test_walker_finds_nested_events() {
        let shape = EventShape {
            url_markers: &["/events/"],
        };
        let html = Html::parse_document(
            r#"<script type="application/ld+json">
                {"@graph": [
                    {"@type": "TheaterEvent", "name": "Play Night",
                     "startDate": "2025-03-07T19:00:00", "url": "/events/play-night"},
                    {"@type": "Organization", "name": "The Museum"}
                ]}
            </script>"#,
        );
        let nodes = event_nodes(&html, &shape);
        assert_eq!(nodes.len(), 1);
        assert_eq!(title_of(&nodes[0]).as_deref(), Some("Play Night"));
        assert!(start_of(&nodes[0]).is_some());
    }

    #[test]
    fn test_looks_like_event_requires_url() {
        let shape = EventShape { url_markers: &[] };
        let with_url: Map<String, Value> = serde_json::from_str(
            r#"{"title": "Teen Night", "date": "2025-03-07", "path": "/e/1"}"#,
        )
        .unwrap();
        assert!(shape.looks_like_event(&with_url));

        let without_url: Map<String, Value> =
            serde_json::from_str(r#"{"title": "Teen Night", "date": "2025-03-07"}"#).unwrap();
        assert!(!shape.looks_like_event(&without_url));
    }

    #[test]
    fn test_datetime_of_shapes() {
        assert!(datetime_of(&Value::String("2025-03-07T15:00:00Z".into())).is_some());
        let nested: Value =
            serde_json::from_str(r#"{"start": {"dateTime": "2025-03-07T15:00:00"}}"#).unwrap();
        assert!(datetime_of(&nested).is_some());
        let list: Value = serde_json::from_str(r#"["garbage", "2025-03-07"]"#).unwrap();
        assert!(datetime_of(&list).is_some());
    }

    #[test]
    fn test_key_precedence_helpers() {
        let obj: Map<String, Value> = serde_json::from_str(
            r#"{"title": "Fallback", "name": "Teen Night",
                "endDate": "2025-03-07T17:00:00",
                "keywords": ["Art", "Teens"]}"#,
        )
        .unwrap();
        assert_eq!(title_of(&obj).as_deref(), Some("Teen Night"));
        assert_eq!(first_string(&obj, &["missing", "title"]).as_deref(), Some("Fallback"));
        assert!(end_of(&obj).is_some());
        assert_eq!(
            first_text(&obj, &["missing", "keywords"]).as_deref(),
            Some("Art, Teens")
        );
    }

    #[test]
    fn test_normalize_text_joins() {
        let value: Value = serde_json::from_str(r#"["Art", " Music ", null]"#).unwrap();
        assert_eq!(normalize_text(&value).as_deref(), Some("Art, Music"));
    }

    #[test]
    fn test_location_name_place_object() {
        let place: Value = serde_json::from_str(
            r#"{"@type": "Place", "name": "Education Center", "address": "1000 Fifth Ave"}"#,
        )
        .unwrap();
        assert_eq!(location_name(&place).as_deref(), Some("Education Center"));
    }
}

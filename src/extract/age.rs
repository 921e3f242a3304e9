//! Age-range parsing for activity titles and descriptions.

use std::sync::LazyLock;

use regex::Regex;

/// Audience a source (or listing section) is aimed at, used when the text
/// itself does not state an age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Teens,
    Kids,
    General,
}

impl Audience {
    /// Default (min, max) age bounds for the audience.
    pub fn default_ages(&self) -> (Option<i32>, Option<i32>) {
        match self {
            Audience::Teens => (Some(13), Some(17)),
            Audience::Kids => (None, Some(12)),
            Audience::General => (None, None),
        }
    }
}

static AGE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bages?\s*(\d{1,2})\s*(?:-|\u{2013}|to)\s*(\d{1,2})\b").unwrap()
});

static AGE_PLUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bages?\s*(\d{1,2})\s*\+").unwrap());

/// Parse an age range out of title/description text.
///
/// Precedence: explicit `ages N-M` ranges, then open-ended `ages N+`, then
/// the audience default.
pub fn parse_age_range(
    title: &str,
    description: Option<&str>,
    audience: Audience,
) -> (Option<i32>, Option<i32>) {
    let combined = match description {
        Some(desc) => format!("{title} {desc}"),
        None => title.to_string(),
    };

    if let Some(caps) = AGE_RANGE_RE.captures(&combined) {
        let min = caps[1].parse().ok();
        let max = caps[2].parse().ok();
        return (min, max);
    }
    if let Some(caps) = AGE_PLUS_RE.captures(&combined) {
        return (caps[1].parse().ok(), None);
    }
    audience.default_ages()
}

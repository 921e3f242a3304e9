//! Temporal parsing for listing text.
//!
//! Listing pages mix ISO timestamps in structured payloads with prose forms
//! like `"March 7, 2025 3:00 PM"`, bare `"Month Day"` headings, and time
//! ranges whose first half omits the meridiem. Everything resolves to naive
//! wall-clock datetimes; the venue timezone is carried separately.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

static MONTH_DAY_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([A-Za-z]{3,9})\.?\s+(\d{1,2}),\s*(\d{4})\b").unwrap());

static MONTH_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Za-z]{3,9})\.?\s+(\d{1,2})$").unwrap());

static HEADING_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+([A-Za-z]{3,9})\.?\s+(\d{1,2})\b",
    )
    .unwrap()
});

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)?\s*(?:-|\u{2013}|\u{2014}|to)\s*(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)",
    )
    .unwrap()
});

static TIME_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)").unwrap()
});

/// Parse a datetime out of arbitrary text.
///
/// Accepts ISO-8601 (a trailing `Z` is normalized to `+00:00`; any offset is
/// dropped after preserving the wall clock), bare ISO dates, and
/// `"<Month> <Day>, <Year>"` prose with an optional time anywhere in the
/// text. Returns `None` when nothing date-like is present.
pub fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let iso: Cow<'_, str> = if text.ends_with('Z') || text.ends_with('z') {
        Cow::Owned(format!("{}+00:00", &text[..text.len() - 1]))
    } else {
        Cow::Borrowed(text)
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = iso.parse::<NaiveDateTime>() {
        return Some(dt);
    }
    if let Ok(date) = iso.parse::<NaiveDate>() {
        return date.and_hms_opt(0, 0, 0);
    }

    let caps = MONTH_DAY_YEAR_RE.captures(text)?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let (hour, minute) = parse_time_parts(text).unwrap_or((0, 0));
    date.and_hms_opt(hour, minute, 0)
}

/// Parse a start time out of text containing a single time or a time range.
///
/// Ranges like `"6-8 PM"` apply the trailing meridiem to the leading half
/// when the leading half has none. Dotted meridiems (`a.m.`) are accepted.
pub fn parse_time_parts(text: &str) -> Option<(u32, u32)> {
    if let Some(caps) = TIME_RANGE_RE.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let meridiem = caps
            .get(3)
            .or_else(|| caps.get(6))
            .map(|m| m.as_str().to_string())?;
        return to_24h(hour, minute, &meridiem);
    }
    let caps = TIME_SINGLE_RE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
    to_24h(hour, minute, &caps[3])
}

/// Resolve a year-less `"Month Day"` heading against the current date.
///
/// The current year is assumed; if that lands more than ~300 days in the
/// past the heading is a December page read in January, so roll forward a
/// year.
pub fn parse_date_heading(month_day: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = MONTH_DAY_RE.captures(month_day.trim())?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;

    let mut date = NaiveDate::from_ymd_opt(now.year(), month, day)?;
    if (date - now.date()).num_days() < -300 {
        date = NaiveDate::from_ymd_opt(now.year() + 1, month, day)?;
    }
    date.and_hms_opt(0, 0, 0)
}

/// Resolve a weekday-prefixed `"Wed, Jan 5"` heading against a base day.
///
/// The base day's year is assumed, with a ±180-day window: a resolved date
/// more than 180 days after the base belongs to the previous year, more
/// than 180 days before it to the next.
pub fn parse_heading_day(text: &str, base_day: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = HEADING_DAY_RE.captures(text.trim())?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;

    let mut date = NaiveDate::from_ymd_opt(base_day.year(), month, day)?;
    let delta = (date - base_day.date()).num_days();
    if delta > 180 {
        date = NaiveDate::from_ymd_opt(base_day.year() - 1, month, day)?;
    } else if delta < -180 {
        date = NaiveDate::from_ymd_opt(base_day.year() + 1, month, day)?;
    }
    date.and_hms_opt(0, 0, 0)
}

/// Convert a 12-hour clock reading to 24-hour (hour, minute).
fn to_24h(hour: u32, minute: u32, meridiem: &str) -> Option<(u32, u32)> {
    if !(1..=12).contains(&hour) || minute >= 60 {
        return None;
    }
    let pm = meridiem.to_lowercase().starts_with('p');
    let hour = match (pm, hour) {
        (false, 12) => 0,
        (false, h) => h,
        (true, 12) => 12,
        (true, h) => h + 12,
    };
    Some((hour, minute))
}

/// Match a full or abbreviated English month name.
fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    MONTHS.iter().position(|m| {
        // Accept "sep"/"sept" style abbreviations of at least three letters
        lower.len() >= 3 && m.starts_with(&lower)
    })
    .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_iso_with_zulu() {
        assert_eq!(
            parse_datetime_text("2025-03-07T15:00:00Z"),
            Some(at(2025, 3, 7, 15, 0))
        );
    }

    #[test]
    fn test_iso_with_offset_keeps_wall_clock() {
        assert_eq!(
            parse_datetime_text("2025-03-07T15:00:00-05:00"),
            Some(at(2025, 3, 7, 15, 0))
        );
    }

    #[test]
    fn test_naive_iso_and_bare_date() {
        assert_eq!(
            parse_datetime_text("2025-03-07T15:00:00"),
            Some(at(2025, 3, 7, 15, 0))
        );
        assert_eq!(parse_datetime_text("2025-03-07"), Some(at(2025, 3, 7, 0, 0)));
    }

    #[test]
    fn test_prose_date_with_time() {
        assert_eq!(
            parse_datetime_text("Friday, March 7, 2025 at 3:00 PM"),
            Some(at(2025, 3, 7, 15, 0))
        );
        assert_eq!(
            parse_datetime_text("Mar 7, 2025"),
            Some(at(2025, 3, 7, 0, 0))
        );
    }

    #[test]
    fn test_nothing_datelike() {
        assert_eq!(parse_datetime_text(""), None);
        assert_eq!(parse_datetime_text("Teen Studio: Printmaking"), None);
    }

    #[test]
    fn test_meridiem_conversion() {
        assert_eq!(parse_time_parts("12:00 AM"), Some((0, 0)));
        assert_eq!(parse_time_parts("12:00 PM"), Some((12, 0)));
        assert_eq!(parse_time_parts("2:30 PM"), Some((14, 30)));
        assert_eq!(parse_time_parts("11:15 a.m."), Some((11, 15)));
    }

    #[test]
    fn test_range_prefers_trailing_meridiem() {
        assert_eq!(parse_time_parts("6-8 PM"), Some((18, 0)));
        assert_eq!(parse_time_parts("10-11:30 AM"), Some((10, 0)));
        assert_eq!(parse_time_parts("11 AM to 1 PM"), Some((11, 0)));
    }

    #[test]
    fn test_no_time() {
        assert_eq!(parse_time_parts("All day event"), None);
    }

    #[test]
    fn test_date_heading_same_year() {
        let now = at(2025, 1, 3, 12, 0);
        assert_eq!(
            parse_date_heading("December 28", now),
            Some(at(2025, 12, 28, 0, 0))
        );
    }

    #[test]
    fn test_date_heading_year_rollover() {
        // A January heading read in late December belongs to next year.
        let now = at(2025, 12, 30, 12, 0);
        assert_eq!(
            parse_date_heading("January 2", now),
            Some(at(2026, 1, 2, 0, 0))
        );
    }

    #[test]
    fn test_heading_day_window() {
        let base = at(2025, 12, 30, 0, 0);
        // A nearby January day rolls forward a year.
        assert_eq!(
            parse_heading_day("Fri, Jan 2", base),
            Some(at(2026, 1, 2, 0, 0))
        );
        // A December day read against an early-January base rolls back.
        let base = at(2026, 1, 3, 0, 0);
        assert_eq!(
            parse_heading_day("Tuesday, December 30", base),
            Some(at(2025, 12, 30, 0, 0))
        );
        // In-window days keep the base year.
        assert_eq!(
            parse_heading_day("Sat, Feb 14", base),
            Some(at(2026, 2, 14, 0, 0))
        );
    }

    #[test]
    fn test_heading_day_rejects_non_headings() {
        let base = at(2025, 6, 1, 0, 0);
        assert_eq!(parse_heading_day("Teen Night", base), None);
    }

    #[test]
    fn test_month_abbreviations() {
        assert_eq!(month_number("Sept"), Some(9));
        assert_eq!(month_number("mar"), Some(3));
        assert_eq!(month_number("Sunday"), None);
    }
}

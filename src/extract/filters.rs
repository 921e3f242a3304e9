//! Relevance filtering for candidate titles.

/// Navigation/commerce phrases that show up as anchor text on listing pages
/// but are never activities.
const IRRELEVANT_KEYWORDS: [&str; 6] =
    ["ticket", "tickets", "donate", "membership", "member", "shop"];

/// True when a candidate title is navigation chrome rather than an event.
///
/// Empty or whitespace-only text is irrelevant. A keyword matches the whole
/// title exactly or as a `keyword + space` prefix, case-insensitively.
pub fn is_irrelevant_title(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    IRRELEVANT_KEYWORDS.iter().any(|keyword| {
        lower == *keyword || lower.starts_with(&format!("{keyword} "))
    })
}

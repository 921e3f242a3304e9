//! Extraction types and shared normalization helpers.
//!
//! Source adapters turn raw listing HTML into [`ExtractedActivity`] rows.
//! Each adapter holds an ordered list of strategies; the first strategy that
//! yields any rows wins and later strategies are never run.

pub mod age;
pub mod filters;
pub mod lines;
pub mod llm;
pub mod payload;
pub mod temporal;

use chrono::NaiveDateTime;

use crate::models::FreeVerificationStatus;

/// A normalized activity as produced by an extractor, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedActivity {
    /// Canonical detail-page URL; part of the identity key.
    pub source_url: String,
    pub title: String,
    pub description: Option<String>,
    pub venue_name: Option<String>,
    pub location_text: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub activity_type: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub drop_in: Option<bool>,
    pub registration_required: Option<bool>,
    /// Naive wall-clock start in the venue timezone; part of the identity key.
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    /// IANA timezone the wall-clock times are local to.
    pub timezone: String,
    pub free_verification_status: FreeVerificationStatus,
}

impl ExtractedActivity {
    /// Identity key used for within-batch dedup and upsert matching.
    pub fn identity_key(&self) -> (String, String, NaiveDateTime) {
        (self.source_url.clone(), self.title.clone(), self.start_at)
    }
}

/// Signals inferred from a free-text blob about an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextSignals {
    pub drop_in: bool,
    pub registration_required: bool,
    pub mentions_free: bool,
}

impl TextSignals {
    /// Scan a description blob for drop-in / registration / free wording.
    pub fn from_blob(text: &str) -> Self {
        let lower = text.to_lowercase();
        Self {
            drop_in: lower.contains("drop-in") || lower.contains("drop in"),
            registration_required: lower.contains("registration")
                && !lower.contains("not required"),
            mentions_free: lower.contains("free"),
        }
    }

    /// Free-verification status implied by the blob.
    pub fn free_status(&self) -> FreeVerificationStatus {
        if self.mentions_free {
            FreeVerificationStatus::Confirmed
        } else {
            FreeVerificationStatus::Inferred
        }
    }
}

/// Run strategies in order, returning the first non-empty row set.
pub fn first_yield(
    strategies: &[&dyn Fn() -> Vec<ExtractedActivity>],
) -> Vec<ExtractedActivity> {
    for strategy in strategies {
        let rows = strategy();
        if !rows.is_empty() {
            return rows;
        }
    }
    Vec::new()
}

/// Collapse runs of whitespace (including non-breaking spaces) to single
/// spaces and trim.
pub fn normalize_space(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_space() {
        assert_eq!(normalize_space("  a \n\t b\u{a0}c  "), "a b c");
        assert_eq!(normalize_space(""), "");
    }

    #[test]
    fn test_signals_drop_in() {
        let s = TextSignals::from_blob("Drop-in art making. Registration required.");
        assert!(s.drop_in);
        assert!(s.registration_required);
    }

    #[test]
    fn test_signals_registration_not_required() {
        let s = TextSignals::from_blob("Registration is not required");
        assert!(!s.registration_required);
        assert!(!TextSignals::from_blob("Just a program").registration_required);
    }

    #[test]
    fn test_signals_free() {
        assert!(TextSignals::from_blob("Free with admission").mentions_free);
        assert_eq!(
            TextSignals::from_blob("Free!").free_status(),
            crate::models::FreeVerificationStatus::Confirmed
        );
        assert_eq!(
            TextSignals::from_blob("An evening program").free_status(),
            crate::models::FreeVerificationStatus::Inferred
        );
    }

    #[test]
    fn test_first_yield_ordering() {
        let empty = || Vec::new();
        let row = ExtractedActivity {
            source_url: "https://example.org/events/1".to_string(),
            title: "Teen Night".to_string(),
            description: None,
            venue_name: None,
            location_text: None,
            city: None,
            state: None,
            activity_type: None,
            age_min: None,
            age_max: None,
            drop_in: None,
            registration_required: None,
            start_at: chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
            end_at: None,
            timezone: "America/New_York".to_string(),
            free_verification_status: FreeVerificationStatus::Inferred,
        };
        let hit = {
            let row = row.clone();
            move || vec![row.clone()]
        };
        let rows = first_yield(&[&empty, &hit]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Teen Night");
    }
}

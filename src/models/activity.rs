//! Activity model and its status enums.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How confident we are that an activity is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreeVerificationStatus {
    /// The page explicitly said "free" (or equivalent).
    Confirmed,
    /// No price information was found; assumed free.
    Inferred,
    /// Conflicting or unclear price information.
    Uncertain,
}

impl FreeVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreeVerificationStatus::Confirmed => "confirmed",
            FreeVerificationStatus::Inferred => "inferred",
            FreeVerificationStatus::Uncertain => "uncertain",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(FreeVerificationStatus::Confirmed),
            "inferred" => Some(FreeVerificationStatus::Inferred),
            "uncertain" => Some(FreeVerificationStatus::Uncertain),
            _ => None,
        }
    }
}

/// Lifecycle status of a stored activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Active,
    Cancelled,
    Expired,
    NeedsReview,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Cancelled => "cancelled",
            ActivityStatus::Expired => "expired",
            ActivityStatus::NeedsReview => "needs_review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ActivityStatus::Active),
            "cancelled" => Some(ActivityStatus::Cancelled),
            "expired" => Some(ActivityStatus::Expired),
            "needs_review" => Some(ActivityStatus::NeedsReview),
            _ => None,
        }
    }
}

/// Which extraction pathway produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Source-specific hardcoded extractor (payload or DOM heuristics).
    Hardcoded,
    /// LLM-assisted extraction (not yet implemented).
    Llm,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Hardcoded => "hardcoded",
            ExtractionMethod::Llm => "llm",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "hardcoded" => Some(ExtractionMethod::Hardcoded),
            "llm" => Some(ExtractionMethod::Llm),
            _ => None,
        }
    }
}

/// A stored activity record.
///
/// Identity is (source_id, source_url, title, start_at); those fields never
/// change once the row exists. Everything else is refreshed when the same
/// activity is seen again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i32,
    pub source_id: i32,
    pub source_url: String,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub is_free: bool,
    pub free_verification_status: FreeVerificationStatus,
    pub drop_in: Option<bool>,
    pub registration_required: Option<bool>,
    /// Naive wall-clock time in the venue's timezone.
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    /// IANA timezone name the wall-clock times are local to.
    pub timezone: String,
    pub location_text: Option<String>,
    pub venue_id: Option<i32>,
    pub extraction_method: ExtractionMethod,
    pub status: ActivityStatus,
    pub confidence_score: f64,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ActivityStatus::Active,
            ActivityStatus::Cancelled,
            ActivityStatus::Expired,
            ActivityStatus::NeedsReview,
        ] {
            assert_eq!(ActivityStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ActivityStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_free_status_round_trip() {
        for status in [
            FreeVerificationStatus::Confirmed,
            FreeVerificationStatus::Inferred,
            FreeVerificationStatus::Uncertain,
        ] {
            assert_eq!(
                FreeVerificationStatus::from_str(status.as_str()),
                Some(status)
            );
        }
    }
}

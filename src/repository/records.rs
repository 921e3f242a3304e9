//! Diesel row structs and their domain-model conversions.
//!
//! Datetimes live in the database as ISO-8601 text; the conversions here go
//! through the shared parse/format helpers. Update structs carry only the
//! mutable fields, so identity columns can never be rewritten.

use diesel::prelude::*;

use super::{format_datetime, parse_datetime, parse_datetime_opt};
use crate::models::{
    Activity, ActivityStatus, ExtractionMethod, FreeVerificationStatus, Source, Venue,
};
use crate::schema::{activities, sources, venues};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sources)]
pub struct SourceRecord {
    pub id: i32,
    pub name: String,
    pub base_url: String,
    pub adapter_type: String,
    pub crawl_frequency: String,
    pub active: bool,
}

impl From<SourceRecord> for Source {
    fn from(record: SourceRecord) -> Self {
        Source {
            id: record.id,
            name: record.name,
            base_url: record.base_url,
            adapter_type: record.adapter_type,
            crawl_frequency: record.crawl_frequency,
            active: record.active,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sources)]
pub struct NewSource {
    pub name: String,
    pub base_url: String,
    pub adapter_type: String,
    pub crawl_frequency: String,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = venues)]
pub struct VenueRecord {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
}

impl From<VenueRecord> for Venue {
    fn from(record: VenueRecord) -> Self {
        Venue {
            id: record.id,
            name: record.name,
            address: record.address,
            city: record.city,
            state: record.state,
            website: record.website,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = venues)]
pub struct NewVenue {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = activities)]
pub struct ActivityRecord {
    pub id: i32,
    pub source_id: i32,
    pub source_url: String,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub is_free: bool,
    pub free_verification_status: String,
    pub drop_in: Option<bool>,
    pub registration_required: Option<bool>,
    pub start_at: String,
    pub end_at: Option<String>,
    pub timezone: String,
    pub location_text: Option<String>,
    pub venue_id: Option<i32>,
    pub extraction_method: String,
    pub status: String,
    pub confidence_score: f64,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub updated_at: String,
}

impl From<ActivityRecord> for Activity {
    fn from(record: ActivityRecord) -> Self {
        Activity {
            id: record.id,
            source_id: record.source_id,
            source_url: record.source_url,
            title: record.title,
            description: record.description,
            activity_type: record.activity_type,
            age_min: record.age_min,
            age_max: record.age_max,
            is_free: record.is_free,
            free_verification_status: FreeVerificationStatus::from_str(
                &record.free_verification_status,
            )
            .unwrap_or(FreeVerificationStatus::Inferred),
            drop_in: record.drop_in,
            registration_required: record.registration_required,
            start_at: parse_datetime(&record.start_at),
            end_at: parse_datetime_opt(record.end_at),
            timezone: record.timezone,
            location_text: record.location_text,
            venue_id: record.venue_id,
            extraction_method: ExtractionMethod::from_str(&record.extraction_method)
                .unwrap_or(ExtractionMethod::Hardcoded),
            status: ActivityStatus::from_str(&record.status).unwrap_or(ActivityStatus::Active),
            confidence_score: record.confidence_score,
            first_seen_at: parse_datetime(&record.first_seen_at),
            last_seen_at: parse_datetime(&record.last_seen_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activities)]
pub struct NewActivity {
    pub source_id: i32,
    pub source_url: String,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub is_free: bool,
    pub free_verification_status: String,
    pub drop_in: Option<bool>,
    pub registration_required: Option<bool>,
    pub start_at: String,
    pub end_at: Option<String>,
    pub timezone: String,
    pub location_text: Option<String>,
    pub venue_id: Option<i32>,
    pub extraction_method: String,
    pub status: String,
    pub confidence_score: f64,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub updated_at: String,
}

/// Mutable fields refreshed on re-ingestion. `None` clears the column.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = activities, treat_none_as_null = true)]
pub struct ActivityChanges {
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub free_verification_status: String,
    pub drop_in: Option<bool>,
    pub registration_required: Option<bool>,
    pub end_at: Option<String>,
    pub timezone: String,
    pub location_text: Option<String>,
    pub venue_id: Option<i32>,
    pub last_seen_at: String,
    pub updated_at: String,
}

impl NewActivity {
    /// Build an insert row from an extracted activity with bookkeeping
    /// defaults (free, active, hardcoded extraction, 0.8 confidence).
    pub fn from_extracted(
        source_id: i32,
        item: &crate::extract::ExtractedActivity,
        venue_id: Option<i32>,
        now: chrono::NaiveDateTime,
    ) -> Self {
        let stamp = format_datetime(now);
        Self {
            source_id,
            source_url: item.source_url.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            activity_type: item.activity_type.clone(),
            age_min: item.age_min,
            age_max: item.age_max,
            is_free: true,
            free_verification_status: item.free_verification_status.as_str().to_string(),
            drop_in: item.drop_in,
            registration_required: item.registration_required,
            start_at: format_datetime(item.start_at),
            end_at: item.end_at.map(format_datetime),
            timezone: item.timezone.clone(),
            location_text: item.location_text.clone(),
            venue_id,
            extraction_method: ExtractionMethod::Hardcoded.as_str().to_string(),
            status: ActivityStatus::Active.as_str().to_string(),
            confidence_score: 0.8,
            first_seen_at: stamp.clone(),
            last_seen_at: stamp.clone(),
            updated_at: stamp,
        }
    }
}

impl ActivityChanges {
    /// Build an update set from a re-extracted activity.
    pub fn from_extracted(
        item: &crate::extract::ExtractedActivity,
        venue_id: Option<i32>,
        now: chrono::NaiveDateTime,
    ) -> Self {
        let stamp = format_datetime(now);
        Self {
            description: item.description.clone(),
            activity_type: item.activity_type.clone(),
            age_min: item.age_min,
            age_max: item.age_max,
            free_verification_status: item.free_verification_status.as_str().to_string(),
            drop_in: item.drop_in,
            registration_required: item.registration_required,
            end_at: item.end_at.map(format_datetime),
            timezone: item.timezone.clone(),
            location_text: item.location_text.clone(),
            venue_id,
            last_seen_at: stamp.clone(),
            updated_at: stamp,
        }
    }
}

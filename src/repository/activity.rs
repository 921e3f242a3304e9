//! Activity queries.
//!
//! Stored identity is (source_id, source_url, title, start_at); lookups for
//! an ingest batch fetch a superset via chunked IN clauses and the caller
//! matches exact keys in memory. The text datetime format sorts
//! lexicographically, so range filters compare formatted strings directly.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::format_datetime;
use super::pool::{AsyncSqliteConnection, DieselError};
use super::records::{ActivityChanges, ActivityRecord, NewActivity, VenueRecord};
use crate::models::{Activity, Venue};
use crate::schema::{activities, sources, venues};

const LOOKUP_CHUNK: usize = 100;

/// Optional filters for the read API.
#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub age: Option<i32>,
    pub drop_in: Option<bool>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub date_from: Option<NaiveDateTime>,
    pub date_to: Option<NaiveDateTime>,
}

/// Load stored activities that could match any of the given identity keys.
///
/// The IN-clause lookup over the url/title/start sets can return rows that
/// mix fields from different keys; callers match exact keys themselves.
pub async fn find_by_keys(
    conn: &mut AsyncSqliteConnection,
    source_id: i32,
    keys: &[(String, String, NaiveDateTime)],
) -> Result<Vec<Activity>, DieselError> {
    let mut out = Vec::new();
    for chunk in keys.chunks(LOOKUP_CHUNK) {
        let urls: Vec<&str> = chunk.iter().map(|(url, _, _)| url.as_str()).collect();
        let titles: Vec<&str> = chunk.iter().map(|(_, title, _)| title.as_str()).collect();
        let starts: Vec<String> = chunk
            .iter()
            .map(|(_, _, start)| format_datetime(*start))
            .collect();

        let records = activities::table
            .filter(activities::source_id.eq(source_id))
            .filter(activities::source_url.eq_any(urls))
            .filter(activities::title.eq_any(titles))
            .filter(activities::start_at.eq_any(starts))
            .load::<ActivityRecord>(conn)
            .await?;
        out.extend(records.into_iter().map(Activity::from));
    }
    Ok(out)
}

/// Insert a new activity row.
pub async fn insert(
    conn: &mut AsyncSqliteConnection,
    row: &NewActivity,
) -> Result<(), DieselError> {
    diesel::insert_into(activities::table)
        .values(row)
        .execute(conn)
        .await?;
    Ok(())
}

/// Update the mutable fields of an existing activity.
pub async fn update(
    conn: &mut AsyncSqliteConnection,
    id: i32,
    changes: &ActivityChanges,
) -> Result<(), DieselError> {
    diesel::update(activities::table.find(id))
        .set(changes)
        .execute(conn)
        .await?;
    Ok(())
}

/// Free activities in active or needs_review status, filtered and ordered by
/// start time, joined with their venue. Capped at 200 rows.
pub async fn list_filtered(
    conn: &mut AsyncSqliteConnection,
    filter: &ActivityFilter,
) -> Result<Vec<(Activity, Option<Venue>)>, DieselError> {
    let mut query = activities::table
        .left_join(venues::table)
        .filter(activities::is_free.eq(true))
        .filter(activities::status.eq_any(["active", "needs_review"]))
        .select(<(ActivityRecord, Option<VenueRecord>)>::as_select())
        .into_boxed();

    if let Some(age) = filter.age {
        query = query.filter(
            activities::age_min
                .is_null()
                .or(activities::age_min.le(age)),
        );
        query = query.filter(
            activities::age_max
                .is_null()
                .or(activities::age_max.ge(age)),
        );
    }
    if let Some(drop_in) = filter.drop_in {
        query = query.filter(activities::drop_in.eq(drop_in));
    }
    if let Some(venue) = &filter.venue {
        query = query.filter(venues::name.like(format!("%{venue}%")));
    }
    if let Some(city) = &filter.city {
        query = query.filter(venues::city.like(format!("%{city}%")));
    }
    if let Some(state) = &filter.state {
        // LIKE without wildcards gives a case-insensitive exact match.
        query = query.filter(venues::state.like(state.clone()));
    }
    if let Some(from) = filter.date_from {
        query = query.filter(activities::start_at.ge(format_datetime(from)));
    }
    if let Some(to) = filter.date_to {
        query = query.filter(activities::start_at.le(format_datetime(to)));
    }

    let rows: Vec<(ActivityRecord, Option<VenueRecord>)> = query
        .order(activities::start_at.asc())
        .limit(200)
        .load(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(activity, venue)| (Activity::from(activity), venue.map(Venue::from)))
        .collect())
}

/// Total row counts for the status display: (sources, venues, activities).
pub async fn table_counts(
    conn: &mut AsyncSqliteConnection,
) -> Result<(i64, i64, i64), DieselError> {
    let sources: i64 = sources::table.count().get_result(conn).await?;
    let venues: i64 = venues::table.count().get_result(conn).await?;
    let activities: i64 = activities::table.count().get_result(conn).await?;
    Ok((sources, venues, activities))
}

/// Activity counts grouped by source name.
pub async fn counts_by_source(
    conn: &mut AsyncSqliteConnection,
) -> Result<Vec<(String, i64)>, DieselError> {
    activities::table
        .inner_join(sources::table)
        .group_by(sources::name)
        .select((sources::name, diesel::dsl::count_star()))
        .order(sources::name.asc())
        .load::<(String, i64)>(conn)
        .await
}

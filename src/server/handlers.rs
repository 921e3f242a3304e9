//! Request handlers for the read API.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::AppState;
use crate::models::{Activity, Venue};
use crate::repository::activity::{self, ActivityFilter};
use crate::repository::{venue as venue_repo, DieselError};

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub age: Option<i32>,
    pub drop_in: Option<bool>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub date_from: Option<NaiveDateTime>,
    pub date_to: Option<NaiveDateTime>,
}

/// Wire shape for one activity row, venue fields flattened in.
#[derive(Debug, Serialize)]
pub struct ActivityRead {
    pub id: i32,
    pub title: String,
    pub source_url: String,
    pub venue_name: Option<String>,
    pub location_text: Option<String>,
    pub venue_city: Option<String>,
    pub venue_state: Option<String>,
    pub activity_type: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub drop_in: Option<bool>,
    pub registration_required: Option<bool>,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    pub timezone: String,
    pub free_verification_status: String,
    pub extraction_method: String,
    pub status: String,
    pub confidence_score: f64,
}

impl ActivityRead {
    fn from_row(activity: Activity, venue: Option<Venue>) -> Self {
        Self {
            id: activity.id,
            title: activity.title,
            source_url: activity.source_url,
            venue_name: venue.as_ref().map(|v| v.name.clone()),
            location_text: activity.location_text,
            venue_city: venue.as_ref().and_then(|v| v.city.clone()),
            venue_state: venue.as_ref().and_then(|v| v.state.clone()),
            activity_type: activity.activity_type,
            age_min: activity.age_min,
            age_max: activity.age_max,
            drop_in: activity.drop_in,
            registration_required: activity.registration_required,
            start_at: activity.start_at,
            end_at: activity.end_at,
            timezone: activity.timezone,
            free_verification_status: activity.free_verification_status.as_str().to_string(),
            extraction_method: activity.extraction_method.as_str().to_string(),
            status: activity.status.as_str().to_string(),
            confidence_score: activity.confidence_score,
        }
    }
}

/// GET /activities
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityRead>>, StatusCode> {
    if query.age.is_some_and(|age| !(0..=120).contains(&age)) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if query.state.as_ref().is_some_and(|s| s.len() != 2) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let filter = ActivityFilter {
        age: query.age,
        drop_in: query.drop_in,
        venue: query.venue,
        city: query.city,
        state: query.state,
        date_from: query.date_from,
        date_to: query.date_to,
    };

    let mut conn = state.pool.get().await.map_err(internal)?;
    let rows = activity::list_filtered(&mut conn, &filter)
        .await
        .map_err(internal)?;
    Ok(Json(
        rows.into_iter()
            .map(|(activity, venue)| ActivityRead::from_row(activity, venue))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    pub field: String,
    pub q: String,
    pub limit: Option<usize>,
}

/// GET /activities/suggestions
pub async fn activity_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<Vec<String>>, StatusCode> {
    if query.q.trim().is_empty() || query.q.len() > 100 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let limit = query.limit.unwrap_or(10).clamp(1, 20);

    let mut conn = state.pool.get().await.map_err(internal)?;
    let values = match query.field.as_str() {
        "venue" => venue_repo::name_suggestions(&mut conn, &query.q, limit).await,
        "city" => venue_repo::city_suggestions(&mut conn, &query.q, limit).await,
        "state" => venue_repo::state_suggestions(&mut conn, &query.q, limit).await,
        _ => return Err(StatusCode::BAD_REQUEST),
    }
    .map_err(internal)?;
    Ok(Json(values))
}

fn internal(err: DieselError) -> StatusCode {
    error!("database error: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

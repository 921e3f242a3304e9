//! Read API for browsing stored activities.
//!
//! A thin axum surface over the repository: list free activities with
//! filters, plus small suggestion lists for filter autocomplete. The server
//! never writes; ingestion happens through the CLI.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;

use crate::repository::AsyncSqlitePool;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pool: AsyncSqlitePool,
}

/// Start the web server.
pub async fn serve(pool: AsyncSqlitePool, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState { pool });

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::extract::ExtractedActivity;
    use crate::models::FreeVerificationStatus;
    use crate::repository::migrations::run_migrations;
    use crate::services::IngestRunner;

    fn extracted(title: &str, day: u32, venue: &str) -> ExtractedActivity {
        ExtractedActivity {
            source_url: format!("https://example.org/events/{}", title.to_lowercase()),
            title: title.to_string(),
            description: Some("Free drop-in studio".to_string()),
            venue_name: Some(venue.to_string()),
            location_text: Some("New York, NY".to_string()),
            city: Some("New York".to_string()),
            state: Some("NY".to_string()),
            activity_type: Some("workshop".to_string()),
            age_min: Some(13),
            age_max: Some(17),
            drop_in: Some(true),
            registration_required: None,
            start_at: NaiveDate::from_ymd_opt(2025, 4, day)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
            end_at: None,
            timezone: "America/New_York".to_string(),
            free_verification_status: FreeVerificationStatus::Confirmed,
        }
    }

    async fn setup_test_app() -> (axum::Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
        let mut conn = pool.get().await.unwrap();
        run_migrations(&mut conn).await.unwrap();

        let runner = IngestRunner::new(pool.clone());
        runner
            .upsert_extracted(
                "https://example.org/events",
                vec![
                    extracted("Teen Night", 12, "The Example Museum"),
                    extracted("Teen Studio", 14, "Other Hall"),
                ],
                "static_html",
            )
            .await
            .unwrap();

        (create_router(AppState { pool }), dir)
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_activities_listing() {
        let (app, _dir) = setup_test_app().await;
        let (status, json) = get_json(app, "/activities").await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        // Ordered by start time.
        assert_eq!(rows[0]["title"], "Teen Night");
        assert_eq!(rows[0]["venue_name"], "The Example Museum");
        assert_eq!(rows[0]["free_verification_status"], "confirmed");
        assert_eq!(rows[0]["status"], "active");
    }

    #[tokio::test]
    async fn test_activities_filters() {
        let (app, _dir) = setup_test_app().await;
        let (status, json) =
            get_json(app.clone(), "/activities?age=15&state=ny&date_from=2025-04-13T00:00:00")
                .await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Teen Studio");

        let (status, json) = get_json(app, "/activities?age=40").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_suggestions() {
        let (app, _dir) = setup_test_app().await;
        let (status, json) = get_json(app.clone(), "/activities/suggestions?field=venue&q=ex").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0], "The Example Museum");

        let (status, json) = get_json(app.clone(), "/activities/suggestions?field=city&q=new").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0], "New York");

        let (status, _) = get_json(app, "/activities/suggestions?field=bogus&q=x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

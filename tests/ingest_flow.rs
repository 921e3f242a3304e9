//! End-to-end ingest behavior against a real on-disk database.

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use fieldtrip::extract::ExtractedActivity;
use fieldtrip::models::FreeVerificationStatus;
use fieldtrip::repository::migrations::run_migrations;
use fieldtrip::repository::{activity, source, venue, AsyncSqlitePool};
use fieldtrip::services::IngestRunner;

const LIST_URL: &str = "https://example.org/events?audience=teens";

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 4, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn extracted(title: &str, start: NaiveDateTime) -> ExtractedActivity {
    ExtractedActivity {
        source_url: format!(
            "https://example.org/events/{}",
            title.to_lowercase().replace(' ', "-")
        ),
        title: title.to_string(),
        description: Some("Free drop-in studio session".to_string()),
        venue_name: Some("Example Museum".to_string()),
        location_text: Some("11 W 53rd St, New York, NY".to_string()),
        city: Some("New York".to_string()),
        state: Some("NY".to_string()),
        activity_type: Some("workshop".to_string()),
        age_min: Some(13),
        age_max: Some(17),
        drop_in: Some(true),
        registration_required: Some(false),
        start_at: start,
        end_at: None,
        timezone: "America/New_York".to_string(),
        free_verification_status: FreeVerificationStatus::Confirmed,
    }
}

async fn setup() -> (AsyncSqlitePool, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
    let mut conn = pool.get().await.unwrap();
    run_migrations(&mut conn).await.unwrap();
    (pool, dir)
}

#[tokio::test]
async fn test_reingest_updates_instead_of_duplicating() {
    let (pool, _dir) = setup().await;
    let runner = IngestRunner::new(pool.clone());

    let first = runner
        .upsert_extracted(
            LIST_URL,
            vec![
                extracted("Teen Night", at(12, 18)),
                extracted("Open Studio", at(14, 15)),
            ],
            "static_html",
        )
        .await
        .unwrap();
    assert_eq!((first.inserted, first.updated), (2, 0));

    // A second crawl of the same listing refreshes rows in place.
    let mut changed = extracted("Teen Night", at(12, 18));
    changed.description = Some("Now with live music".to_string());
    let second = runner
        .upsert_extracted(
            LIST_URL,
            vec![changed, extracted("Open Studio", at(14, 15))],
            "static_html",
        )
        .await
        .unwrap();
    assert_eq!((second.inserted, second.updated), (0, 2));

    let mut conn = pool.get().await.unwrap();
    let (n_sources, n_venues, n_activities) = activity::table_counts(&mut conn).await.unwrap();
    assert_eq!((n_sources, n_venues, n_activities), (1, 1, 2));

    let src = source::all(&mut conn).await.unwrap().remove(0);
    let rows = activity::find_by_keys(
        &mut conn,
        src.id,
        &[(
            "https://example.org/events/teen-night".to_string(),
            "Teen Night".to_string(),
            at(12, 18),
        )],
    )
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].description.as_deref(), Some("Now with live music"));
    // Identity survives the refresh; the last-seen stamp moves forward.
    assert_eq!(rows[0].start_at, at(12, 18));
    assert!(rows[0].last_seen_at >= rows[0].first_seen_at);
}

#[tokio::test]
async fn test_identity_key_keeps_distinct_sessions() {
    let (pool, _dir) = setup().await;
    let runner = IngestRunner::new(pool.clone());

    // Same title and url, two different start times: two separate rows.
    let outcome = runner
        .upsert_extracted(
            LIST_URL,
            vec![
                extracted("Teen Night", at(12, 18)),
                extracted("Teen Night", at(19, 18)),
            ],
            "static_html",
        )
        .await
        .unwrap();
    assert_eq!(outcome.deduped.len(), 2);
    assert_eq!((outcome.inserted, outcome.updated), (2, 0));
}

#[tokio::test]
async fn test_source_created_from_listing_host() {
    let (pool, _dir) = setup().await;
    let runner = IngestRunner::new(pool.clone());

    runner
        .upsert_extracted(LIST_URL, vec![extracted("Teen Night", at(12, 18))], "static_html")
        .await
        .unwrap();

    let mut conn = pool.get().await.unwrap();
    let sources = source::all(&mut conn).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "example.org");
    assert_eq!(sources[0].base_url, "https://example.org");

    // A later batch from a deeper URL on the same host reuses the source.
    runner
        .upsert_extracted(
            "https://example.org/calendar/teens",
            vec![extracted("Open Studio", at(14, 15))],
            "static_html",
        )
        .await
        .unwrap();
    assert_eq!(source::all(&mut conn).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_source_batches_all_commit() {
    let (pool, _dir) = setup().await;
    let runner = IngestRunner::new(pool.clone());

    // Sources crawl concurrently against the same database file; every
    // batch must land rather than fail on the write lock.
    let hosts = ["met.example", "mfa.example", "moma.example", "whitney.example"];
    let mut tasks = Vec::new();
    for (i, host) in hosts.iter().enumerate() {
        let runner = runner.clone();
        let list_url = format!("https://{host}/events");
        tasks.push(tokio::spawn(async move {
            runner
                .upsert_extracted(
                    &list_url,
                    vec![extracted("Teen Night", at(12, 10 + i as u32))],
                    "static_html",
                )
                .await
        }));
    }
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!((outcome.inserted, outcome.updated), (1, 0));
    }

    let mut conn = pool.get().await.unwrap();
    let (n_sources, _, n_activities) = activity::table_counts(&mut conn).await.unwrap();
    assert_eq!((n_sources, n_activities), (4, 4));
}

#[tokio::test]
async fn test_venue_first_address_wins() {
    let (pool, _dir) = setup().await;
    let runner = IngestRunner::new(pool.clone());

    let mut first = extracted("Teen Night", at(12, 18));
    first.location_text = Some("Original address".to_string());
    let mut second = extracted("Open Studio", at(14, 15));
    second.location_text = Some("Different address".to_string());

    runner
        .upsert_extracted(LIST_URL, vec![first, second], "static_html")
        .await
        .unwrap();

    let mut conn = pool.get().await.unwrap();
    let venues = venue::find_by_names(&mut conn, &["Example Museum".to_string()])
        .await
        .unwrap();
    assert_eq!(venues.len(), 1);
    assert_eq!(venues[0].address.as_deref(), Some("Original address"));
}

//! Database schema creation.
//!
//! The schema is small enough to ship as plain DDL. Statements are
//! idempotent so `init` can run against an existing database.

use diesel_async::SimpleAsyncConnection;

use super::pool::{AsyncSqliteConnection, DieselError};

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    base_url TEXT NOT NULL,
    adapter_type TEXT NOT NULL,
    crawl_frequency TEXT NOT NULL DEFAULT 'daily',
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS venues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    address TEXT,
    city TEXT,
    state TEXT,
    website TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_venues_identity
    ON venues (name, city, state);

CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources (id),
    source_url TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    activity_type TEXT,
    age_min INTEGER,
    age_max INTEGER,
    is_free INTEGER NOT NULL DEFAULT 1,
    free_verification_status TEXT NOT NULL DEFAULT 'inferred',
    drop_in INTEGER,
    registration_required INTEGER,
    start_at TEXT NOT NULL,
    end_at TEXT,
    timezone TEXT NOT NULL,
    location_text TEXT,
    venue_id INTEGER REFERENCES venues (id),
    extraction_method TEXT NOT NULL DEFAULT 'hardcoded',
    status TEXT NOT NULL DEFAULT 'active',
    confidence_score REAL NOT NULL DEFAULT 0.8,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_activities_identity
    ON activities (source_id, source_url, title, start_at);

CREATE INDEX IF NOT EXISTS idx_activities_start_at
    ON activities (start_at);
"#;

/// Create all tables and indexes if they do not exist yet.
pub async fn run_migrations(conn: &mut AsyncSqliteConnection) -> Result<(), DieselError> {
    conn.batch_execute(SCHEMA_DDL).await
}

//! Repository layer for database persistence.
//!
//! All database access goes through Diesel with compile-time query checking,
//! over SQLite via diesel-async's SyncConnectionWrapper. Query functions take
//! a connection rather than a pool so a whole ingest batch can run inside one
//! transaction.

pub mod activity;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod source;
pub mod util;
pub mod venue;

pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};

use chrono::{DateTime, NaiveDateTime};

/// Storage format for all datetime text columns.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format a datetime for storage.
pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a datetime string from the database, defaulting to the Unix epoch
/// on error.
pub fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .unwrap_or_else(|_| DateTime::UNIX_EPOCH.naive_utc())
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<NaiveDateTime> {
    s.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok())
}

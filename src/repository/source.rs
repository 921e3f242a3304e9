//! Source queries.
//!
//! Sources are created lazily the first time a listing URL is ingested. A
//! URL is attributed to the stored source with the longest matching base-url
//! prefix, so `https://www.moma.org/calendar/` wins over
//! `https://www.moma.org/` when both exist.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqliteConnection, DieselError};
use super::records::{NewSource, SourceRecord};
use super::util::last_insert_rowid;
use crate::models::Source;
use crate::schema::sources;

/// Resolve the source owning a URL by longest base-url prefix match.
pub async fn find_by_url_prefix(
    conn: &mut AsyncSqliteConnection,
    url: &str,
) -> Result<Option<Source>, DieselError> {
    // The sources table stays tiny, so the prefix scan happens in memory.
    let records = sources::table.load::<SourceRecord>(conn).await?;
    Ok(records
        .into_iter()
        .filter(|record| url.starts_with(&record.base_url))
        .max_by_key(|record| record.base_url.len())
        .map(Source::from))
}

/// Insert a source and return it with its assigned id.
pub async fn create(
    conn: &mut AsyncSqliteConnection,
    name: &str,
    base_url: &str,
    adapter_type: &str,
) -> Result<Source, DieselError> {
    diesel::insert_into(sources::table)
        .values(NewSource {
            name: name.to_string(),
            base_url: base_url.to_string(),
            adapter_type: adapter_type.to_string(),
            crawl_frequency: "daily".to_string(),
            active: true,
        })
        .execute(conn)
        .await?;

    let id: i64 = diesel::select(last_insert_rowid()).get_result(conn).await?;
    let record = sources::table
        .find(id as i32)
        .first::<SourceRecord>(conn)
        .await?;
    Ok(Source::from(record))
}

/// Find the source a URL belongs to, creating one from its scheme and host
/// when no stored base-url prefix matches.
pub async fn resolve_or_create(
    conn: &mut AsyncSqliteConnection,
    source_url: &str,
    adapter_type: &str,
) -> Result<Source, DieselError> {
    if let Some(existing) = find_by_url_prefix(conn, source_url).await? {
        return Ok(existing);
    }

    let (name, base_url) = match url::Url::parse(source_url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => (
                host.to_string(),
                format!("{}://{host}", parsed.scheme()),
            ),
            None => ("unknown_source".to_string(), source_url.to_string()),
        },
        Err(_) => ("unknown_source".to_string(), source_url.to_string()),
    };
    create(conn, &name, &base_url, adapter_type).await
}

/// All stored sources.
pub async fn all(conn: &mut AsyncSqliteConnection) -> Result<Vec<Source>, DieselError> {
    sources::table
        .order(sources::name.asc())
        .load::<SourceRecord>(conn)
        .await
        .map(|records| records.into_iter().map(Source::from).collect())
}

//! Venue queries.
//!
//! Venues are unique by (name, city, state). The address is captured when
//! the venue is first created and never rewritten by later ingests.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqliteConnection, DieselError};
use super::records::{NewVenue, VenueRecord};
use super::util::last_insert_rowid;
use crate::models::Venue;
use crate::schema::venues;

/// IN-clause chunk size; SQLite's bind-variable limit is far higher, but
/// keeping statements small keeps the query planner happy.
const LOOKUP_CHUNK: usize = 100;

/// Load every venue whose name appears in the given set.
pub async fn find_by_names(
    conn: &mut AsyncSqliteConnection,
    names: &[String],
) -> Result<Vec<Venue>, DieselError> {
    let mut out = Vec::new();
    for chunk in names.chunks(LOOKUP_CHUNK) {
        let records = venues::table
            .filter(venues::name.eq_any(chunk))
            .load::<VenueRecord>(conn)
            .await?;
        out.extend(records.into_iter().map(Venue::from));
    }
    Ok(out)
}

/// Insert a venue and return it with its assigned id.
pub async fn create(
    conn: &mut AsyncSqliteConnection,
    name: &str,
    address: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
) -> Result<Venue, DieselError> {
    diesel::insert_into(venues::table)
        .values(NewVenue {
            name: name.to_string(),
            address: address.map(str::to_string),
            city: city.map(str::to_string),
            state: state.map(str::to_string),
            website: None,
        })
        .execute(conn)
        .await?;

    let id: i64 = diesel::select(last_insert_rowid()).get_result(conn).await?;
    let record = venues::table
        .find(id as i32)
        .first::<VenueRecord>(conn)
        .await?;
    Ok(Venue::from(record))
}

/// Insert a batch of venues and return the stored rows.
///
/// Diesel's SQLite multi-row insert fallback is sync-only, so each row is
/// inserted with its own statement inside the caller's transaction — the
/// same statements SQLite would execute for a multi-row VALUES clause.
///
/// The returned set is looked up by name and can include pre-existing
/// venues sharing a name; callers key by (name, city, state).
pub async fn create_all(
    conn: &mut AsyncSqliteConnection,
    rows: Vec<NewVenue>,
) -> Result<Vec<Venue>, DieselError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<String> = rows.iter().map(|row| row.name.clone()).collect();
    for row in &rows {
        diesel::insert_into(venues::table)
            .values(row)
            .execute(conn)
            .await?;
    }
    find_by_names(conn, &names).await
}

/// Distinct venue names starting with the query, tolerating a leading
/// article: "met" also suggests "The Metropolitan Museum of Art". Exact
/// prefix matches rank before article-prefixed ones.
pub async fn name_suggestions(
    conn: &mut AsyncSqliteConnection,
    query: &str,
    limit: usize,
) -> Result<Vec<String>, DieselError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let prefixes = ["", "The ", "A ", "An "];
    let patterns: Vec<String> = prefixes
        .iter()
        .map(|article| format!("{article}{query}%"))
        .collect();

    // SQLite LIKE is already case-insensitive for ASCII.
    let mut names: Vec<String> = venues::table
        .filter(
            venues::name
                .like(&patterns[0])
                .or(venues::name.like(&patterns[1]))
                .or(venues::name.like(&patterns[2]))
                .or(venues::name.like(&patterns[3])),
        )
        .select(venues::name)
        .distinct()
        .load::<String>(conn)
        .await?;

    let rank = |name: &str| {
        prefixes
            .iter()
            .position(|article| {
                let full = format!("{article}{query}");
                name.get(..full.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&full))
            })
            .unwrap_or(prefixes.len())
    };
    names.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
    names.truncate(limit.clamp(1, 20));
    Ok(names)
}

/// Distinct city names starting with the query.
pub async fn city_suggestions(
    conn: &mut AsyncSqliteConnection,
    query: &str,
    limit: usize,
) -> Result<Vec<String>, DieselError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Option<String>> = venues::table
        .filter(venues::city.is_not_null())
        .filter(venues::city.like(format!("{query}%")))
        .select(venues::city)
        .distinct()
        .order(venues::city.asc())
        .limit(limit.clamp(1, 20) as i64)
        .load::<Option<String>>(conn)
        .await?;
    Ok(values.into_iter().flatten().collect())
}

/// Distinct state codes starting with the query.
pub async fn state_suggestions(
    conn: &mut AsyncSqliteConnection,
    query: &str,
    limit: usize,
) -> Result<Vec<String>, DieselError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Option<String>> = venues::table
        .filter(venues::state.is_not_null())
        .filter(venues::state.like(format!("{query}%")))
        .select(venues::state)
        .distinct()
        .order(venues::state.asc())
        .limit(limit.clamp(1, 20) as i64)
        .load::<Option<String>>(conn)
        .await?;
    Ok(values.into_iter().flatten().collect())
}

//! Batch upsert of extracted activities.
//!
//! One ingest call covers one listing page batch: dedup by identity key,
//! resolve the owning source and venues, then insert or update each row.
//! The whole batch runs in a single transaction so a failure rolls back
//! cleanly.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;
use tracing::{debug, info};

use crate::extract::ExtractedActivity;
use crate::models::Venue;
use crate::repository::records::{ActivityChanges, NewActivity, NewVenue};
use crate::repository::{activity, source, venue, AsyncSqlitePool, DieselError};

const UNKNOWN_VENUE: &str = "Unknown Venue";

/// What an ingest run did.
#[derive(Debug)]
pub struct IngestOutcome {
    /// Batch after identity-key dedup, in first-seen order.
    pub deduped: Vec<ExtractedActivity>,
    pub inserted: usize,
    pub updated: usize,
}

/// Runs upsert batches against the database.
///
/// SQLite allows a single writer, and a deferred transaction that has
/// already read cannot wait for one. Clones share a commit lock so batches
/// from concurrent source runs commit in turn instead of failing with a
/// locked database.
#[derive(Clone)]
pub struct IngestRunner {
    pool: AsyncSqlitePool,
    commit_lock: Arc<Mutex<()>>,
}

impl IngestRunner {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self {
            pool,
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Upsert one batch of extracted activities for a listing URL.
    ///
    /// The source row is resolved by base-url prefix (created from the URL's
    /// host if absent). New activities get first_seen = last_seen = now;
    /// existing ones keep their identity fields and first_seen and have
    /// everything else refreshed.
    pub async fn upsert_extracted(
        &self,
        list_url: &str,
        extracted: Vec<ExtractedActivity>,
        adapter_type: &str,
    ) -> Result<IngestOutcome, DieselError> {
        let deduped = dedup_last_wins(extracted);
        if deduped.is_empty() {
            return Ok(IngestOutcome {
                deduped,
                inserted: 0,
                updated: 0,
            });
        }

        let now = chrono::Utc::now().naive_utc();
        let _commit_guard = self.commit_lock.lock().await;
        let mut conn = self.pool.get().await?;

        let (inserted, updated) = conn
            .transaction::<(usize, usize), DieselError, _>(|conn| {
                let batch = &deduped;
                async move {
                    let src = source::resolve_or_create(conn, list_url, adapter_type).await?;

                    // Prefetch venues for the whole batch, then create the
                    // missing ones in one insert. Missing keys are collected
                    // in batch order so the first row naming a venue decides
                    // its address.
                    let mut names: Vec<String> = batch
                        .iter()
                        .filter_map(venue_name_for)
                        .collect();
                    names.sort();
                    names.dedup();
                    let mut venues: HashMap<VenueKey, Venue> = venue::find_by_names(conn, &names)
                        .await?
                        .into_iter()
                        .map(|v| (v.dedup_key(), v))
                        .collect();

                    let mut missing_keys: HashSet<VenueKey> = HashSet::new();
                    let mut missing: Vec<NewVenue> = Vec::new();
                    for item in batch {
                        let Some(name) = venue_name_for(item) else {
                            continue;
                        };
                        let key = (name.clone(), item.city.clone(), item.state.clone());
                        if !venues.contains_key(&key) && missing_keys.insert(key) {
                            missing.push(NewVenue {
                                name,
                                address: item.location_text.clone(),
                                city: item.city.clone(),
                                state: item.state.clone(),
                                website: None,
                            });
                        }
                    }
                    for ven in venue::create_all(conn, missing).await? {
                        venues.insert(ven.dedup_key(), ven);
                    }

                    let keys: Vec<_> = batch.iter().map(ExtractedActivity::identity_key).collect();
                    let existing: HashMap<_, _> = activity::find_by_keys(conn, src.id, &keys)
                        .await?
                        .into_iter()
                        .map(|a| ((a.source_url.clone(), a.title.clone(), a.start_at), a))
                        .collect();

                    let mut inserted = 0;
                    let mut updated = 0;
                    for item in batch {
                        let venue_id = venue_name_for(item).and_then(|name| {
                            venues
                                .get(&(name, item.city.clone(), item.state.clone()))
                                .map(|ven| ven.id)
                        });

                        match existing.get(&item.identity_key()) {
                            None => {
                                activity::insert(
                                    conn,
                                    &NewActivity::from_extracted(src.id, item, venue_id, now),
                                )
                                .await?;
                                inserted += 1;
                            }
                            Some(current) => {
                                activity::update(
                                    conn,
                                    current.id,
                                    &ActivityChanges::from_extracted(item, venue_id, now),
                                )
                                .await?;
                                updated += 1;
                            }
                        }
                    }
                    Ok((inserted, updated))
                }
                .scope_boxed()
            })
            .await?;

        info!(
            list_url,
            batch = deduped.len(),
            inserted,
            updated,
            "ingest batch committed"
        );
        Ok(IngestOutcome {
            deduped,
            inserted,
            updated,
        })
    }
}

type VenueKey = (String, Option<String>, Option<String>);

/// Venue name used for resolution, if the row carries any venue signal.
fn venue_name_for(item: &ExtractedActivity) -> Option<String> {
    if item.venue_name.is_none() && item.location_text.is_none() {
        return None;
    }
    Some(
        item.venue_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_VENUE.to_string()),
    )
}

/// Identity-key dedup keeping first-occurrence order; a later duplicate
/// replaces the earlier row's contents.
fn dedup_last_wins(items: Vec<ExtractedActivity>) -> Vec<ExtractedActivity> {
    let mut index: HashMap<(String, String, NaiveDateTime), usize> = HashMap::new();
    let mut out: Vec<ExtractedActivity> = Vec::new();
    for item in items {
        match index.entry(item.identity_key()) {
            Entry::Occupied(entry) => {
                debug!(title = %item.title, "duplicate within batch, keeping latest");
                out[*entry.get()] = item;
            }
            Entry::Vacant(entry) => {
                entry.insert(out.len());
                out.push(item);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FreeVerificationStatus;
    use chrono::NaiveDate;

    fn extracted(title: &str, description: &str) -> ExtractedActivity {
        ExtractedActivity {
            source_url: "https://example.org/events/a".to_string(),
            title: title.to_string(),
            description: Some(description.to_string()),
            venue_name: None,
            location_text: None,
            city: None,
            state: None,
            activity_type: None,
            age_min: None,
            age_max: None,
            drop_in: None,
            registration_required: None,
            start_at: NaiveDate::from_ymd_opt(2025, 4, 12)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
            end_at: None,
            timezone: "America/New_York".to_string(),
            free_verification_status: FreeVerificationStatus::Inferred,
        }
    }

    #[test]
    fn test_dedup_last_wins_keeps_order() {
        let batch = vec![
            extracted("Teen Night", "first copy"),
            extracted("Other Event", "unrelated"),
            extracted("Teen Night", "second copy"),
        ];
        let deduped = dedup_last_wins(batch);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "Teen Night");
        assert_eq!(deduped[0].description.as_deref(), Some("second copy"));
        assert_eq!(deduped[1].title, "Other Event");
    }

    #[test]
    fn test_venue_name_fallback() {
        let mut item = extracted("Teen Night", "x");
        assert_eq!(venue_name_for(&item), None);
        item.location_text = Some("New York, NY".to_string());
        assert_eq!(venue_name_for(&item).as_deref(), Some(UNKNOWN_VENUE));
        item.venue_name = Some("MoMA".to_string());
        assert_eq!(venue_name_for(&item).as_deref(), Some("MoMA"));
    }
}

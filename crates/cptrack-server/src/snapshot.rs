//! Snapshot capture shared by the manual refresh endpoint, the scheduled
//! sweep, and the post-link backfill task.

use std::collections::BTreeMap;

use cptrack_core::PlatformProfile;
use cptrack_db::{DbError, SnapshotRow};
use sqlx::PgPool;

use crate::adapter::PlatformAdapters;

/// Persists one snapshot built from a freshly fetched profile and moves the
/// handle's cached rating forward in the same transaction.
///
/// Missing ratings and solve counts are stored as zero so downstream series
/// stay numeric.
///
/// # Errors
///
/// Returns [`DbError`] if the insert or cache update fails.
pub async fn create_from_profile(
    pool: &PgPool,
    user_id: i64,
    profile: &PlatformProfile,
    topics: &BTreeMap<String, i64>,
) -> Result<SnapshotRow, DbError> {
    cptrack_db::create_snapshot(
        pool,
        user_id,
        profile.platform.as_str(),
        profile.rating.unwrap_or(0),
        profile.total_solved.unwrap_or(0),
        Some(topics),
    )
    .await
}

/// Topic breakdown for a snapshot, preferring counts already present on the
/// profile and otherwise asking the platform.
///
/// Upstream failure degrades to an empty map; a snapshot without topics is
/// still worth keeping.
pub async fn resolve_topics(
    adapters: &PlatformAdapters,
    profile: &PlatformProfile,
) -> BTreeMap<String, i64> {
    if !profile.topics.is_empty() {
        return profile.topics.clone();
    }
    match adapters
        .fetch_topic_breakdown(profile.platform, &profile.handle)
        .await
    {
        Ok(topics) => topics,
        Err(error) => {
            tracing::warn!(
                platform = profile.platform.as_str(),
                handle = %profile.handle,
                %error,
                "topic breakdown fetch failed; storing snapshot without topics"
            );
            BTreeMap::new()
        }
    }
}

/// Imports the platform's rating history as synthetic snapshots, skipping
/// timestamps that already exist, then refreshes the cached rating once.
///
/// When the platform has no history to offer and the user has no snapshots
/// yet, a single current snapshot is captured instead so the user starts
/// with at least one point. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if a database write fails.
pub async fn backfill_history(
    pool: &PgPool,
    adapters: &PlatformAdapters,
    user_id: i64,
    profile: &PlatformProfile,
) -> Result<u64, DbError> {
    let history = match adapters
        .fetch_rating_history(profile.platform, &profile.handle)
        .await
    {
        Ok(history) => history,
        Err(error) => {
            tracing::warn!(
                platform = profile.platform.as_str(),
                handle = %profile.handle,
                %error,
                "rating history fetch failed; treating as empty"
            );
            Vec::new()
        }
    };

    if history.is_empty() {
        let existing =
            cptrack_db::latest_snapshot_at(pool, user_id, profile.platform.as_str()).await?;
        if existing.is_some() {
            return Ok(0);
        }
        let topics = resolve_topics(adapters, profile).await;
        create_from_profile(pool, user_id, profile, &topics).await?;
        return Ok(1);
    }

    let mut inserted = 0u64;
    for point in &history {
        let wrote = cptrack_db::insert_backfill_snapshot(
            pool,
            user_id,
            profile.platform.as_str(),
            point.rating,
            point.at,
        )
        .await?;
        if wrote {
            inserted += 1;
        }
    }
    if inserted > 0 {
        cptrack_db::refresh_cached_rating(pool, user_id, profile.platform.as_str()).await?;
    }
    Ok(inserted)
}

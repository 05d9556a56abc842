//! Snapshot persistence and history queries.
//!
//! Two insert paths exist. [`create_snapshot`] records a fresh observation
//! stamped `NOW()` and updates the handle's cached rating in the same
//! transaction. [`insert_backfill_snapshot`] replays a platform-supplied
//! history entry at its original timestamp and skips timestamps that are
//! already recorded, so a backfill can run any number of times without
//! duplicating points.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub rating: i32,
    /// Platform-dependent: Codeforces exposes no solve count in its profile
    /// endpoint, so its rows record 0.
    pub total_solved: i64,
    pub topic_breakdown: Option<serde_json::Value>,
    pub captured_at: DateTime<Utc>,
}

/// Records a current-state snapshot and refreshes the handle's
/// `current_rating` cache in one transaction.
///
/// An empty topic map is stored as SQL NULL rather than `{}`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or the cache update fails.
pub async fn create_snapshot(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
    rating: i32,
    total_solved: i64,
    topic_breakdown: Option<&BTreeMap<String, i64>>,
) -> Result<SnapshotRow, DbError> {
    let topics = topic_breakdown
        .filter(|map| !map.is_empty())
        .map(sqlx::types::Json);

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, SnapshotRow>(
        "INSERT INTO snapshots (user_id, platform, rating, total_solved, topic_breakdown) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, user_id, platform, rating, total_solved, topic_breakdown, captured_at",
    )
    .bind(user_id)
    .bind(platform)
    .bind(rating)
    .bind(total_solved)
    .bind(topics)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE platform_handles SET current_rating = $3, updated_at = NOW() \
         WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform)
    .bind(rating)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Inserts a backfilled snapshot at a platform-supplied timestamp, unless a
/// snapshot already exists for that exact `(user, platform, captured_at)`.
///
/// Returns `true` when a row was inserted. The existence check and the
/// insert run as one statement, so re-running a backfill is idempotent;
/// only a sub-second concurrent insert of the same timestamp can slip
/// through, which the chart tolerates.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_backfill_snapshot(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
    rating: i32,
    captured_at: DateTime<Utc>,
) -> Result<bool, DbError> {
    let rows_affected = sqlx::query(
        "INSERT INTO snapshots (user_id, platform, rating, total_solved, captured_at) \
         SELECT $1, $2, $3, 0, $4 \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM snapshots \
             WHERE user_id = $1 AND platform = $2 AND captured_at = $4 \
         )",
    )
    .bind(user_id)
    .bind(platform)
    .bind(rating)
    .bind(captured_at)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Re-derives a handle's `current_rating` from its latest snapshot.
///
/// Needed after a backfill, whose inserts bypass the cache: history entries
/// usually land *before* the current snapshot, but a first-time backfill on
/// a platform with a long history can move the latest point. A pair with no
/// snapshots keeps its cache untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn refresh_cached_rating(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE platform_handles h \
         SET current_rating = latest.rating, updated_at = NOW() \
         FROM ( \
             SELECT rating FROM snapshots \
             WHERE user_id = $1 AND platform = $2 \
             ORDER BY captured_at DESC, id DESC \
             LIMIT 1 \
         ) AS latest \
         WHERE h.user_id = $1 AND h.platform = $2",
    )
    .bind(user_id)
    .bind(platform)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the timestamp of the most recent snapshot for a pair, if any.
/// This drives the refresh cooldown.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_snapshot_at(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let at = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT captured_at FROM snapshots \
         WHERE user_id = $1 AND platform = $2 \
         ORDER BY captured_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?;

    Ok(at)
}

/// Returns the most recent snapshot for a pair, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_snapshot(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<Option<SnapshotRow>, DbError> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, user_id, platform, rating, total_solved, topic_breakdown, captured_at \
         FROM snapshots \
         WHERE user_id = $1 AND platform = $2 \
         ORDER BY captured_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists one user's snapshots captured at or after `cutoff`, oldest first.
///
/// `platform` of `None` returns both platforms interleaved by time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_since(
    pool: &PgPool,
    user_id: i64,
    platform: Option<&str>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<SnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, user_id, platform, rating, total_solved, topic_breakdown, captured_at \
         FROM snapshots \
         WHERE user_id = $1 \
           AND ($2::text IS NULL OR platform = $2) \
           AND captured_at >= $3 \
         ORDER BY captured_at ASC, id ASC",
    )
    .bind(user_id)
    .bind(platform)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists snapshots for a set of users in a single query, grouped by user and
/// then oldest first, captured at or after `cutoff`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_since_for_users(
    pool: &PgPool,
    user_ids: &[i64],
    platform: Option<&str>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<SnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, user_id, platform, rating, total_solved, topic_breakdown, captured_at \
         FROM snapshots \
         WHERE user_id = ANY($1::bigint[]) \
           AND ($2::text IS NULL OR platform = $2) \
           AND captured_at >= $3 \
         ORDER BY user_id, captured_at ASC, id ASC",
    )
    .bind(user_ids)
    .bind(platform)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

//! Linked platform accounts.
//!
//! `current_rating` mirrors the latest snapshot's rating. It is written by
//! the snapshot module only; handle operations here never touch it apart
//! from deleting the whole row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `platform_handles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformHandleRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub handle: String,
    pub verified: bool,
    pub current_rating: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Links a handle for one (user, platform) pair.
///
/// The insert is atomic: when the pair already has a handle, nothing is
/// written and [`DbError::HandleExists`] is returned, so two concurrent link
/// requests cannot both win.
///
/// # Errors
///
/// Returns [`DbError::HandleExists`] if the platform is already linked for
/// this user, or [`DbError::Sqlx`] if the insert fails.
pub async fn insert_handle(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
    handle: &str,
) -> Result<PlatformHandleRow, DbError> {
    let row = sqlx::query_as::<_, PlatformHandleRow>(
        "INSERT INTO platform_handles (user_id, platform, handle) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, platform) DO NOTHING \
         RETURNING id, user_id, platform, handle, verified, current_rating, \
                   created_at, updated_at",
    )
    .bind(user_id)
    .bind(platform)
    .bind(handle)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::HandleExists)
}

/// Fetches the handle linked for one (user, platform) pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_handle(
    pool: &PgPool,
    user_id: i64,
    platform: &str,
) -> Result<Option<PlatformHandleRow>, DbError> {
    let row = sqlx::query_as::<_, PlatformHandleRow>(
        "SELECT id, user_id, platform, handle, verified, current_rating, \
                created_at, updated_at \
         FROM platform_handles \
         WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists a user's linked handles, ordered by platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_handles(pool: &PgPool, user_id: i64) -> Result<Vec<PlatformHandleRow>, DbError> {
    let rows = sqlx::query_as::<_, PlatformHandleRow>(
        "SELECT id, user_id, platform, handle, verified, current_rating, \
                created_at, updated_at \
         FROM platform_handles \
         WHERE user_id = $1 \
         ORDER BY platform",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists linked handles for a set of users in a single query, ordered by
/// `(user_id, platform)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_handles_for_users(
    pool: &PgPool,
    user_ids: &[i64],
) -> Result<Vec<PlatformHandleRow>, DbError> {
    let rows = sqlx::query_as::<_, PlatformHandleRow>(
        "SELECT id, user_id, platform, handle, verified, current_rating, \
                created_at, updated_at \
         FROM platform_handles \
         WHERE user_id = ANY($1::bigint[]) \
         ORDER BY user_id, platform",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists every linked handle, ordered by `(user_id, platform)`. Used by the
/// scheduled snapshot sweep.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_all_handles(pool: &PgPool) -> Result<Vec<PlatformHandleRow>, DbError> {
    let rows = sqlx::query_as::<_, PlatformHandleRow>(
        "SELECT id, user_id, platform, handle, verified, current_rating, \
                created_at, updated_at \
         FROM platform_handles \
         ORDER BY user_id, platform",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks a handle as ownership-verified.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the pair has no linked handle, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_verified(pool: &PgPool, user_id: i64, platform: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE platform_handles SET verified = TRUE, updated_at = NOW() \
         WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Unlinks a handle and deletes every snapshot recorded for the pair, in one
/// transaction. Returns `false` when there was nothing to unlink.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either delete fails.
pub async fn unlink_handle(pool: &PgPool, user_id: i64, platform: &str) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM snapshots WHERE user_id = $1 AND platform = $2")
        .bind(user_id)
        .bind(platform)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM platform_handles WHERE user_id = $1 AND platform = $2")
        .bind(user_id)
        .bind(platform)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

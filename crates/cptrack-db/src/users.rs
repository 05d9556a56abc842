//! User account rows.
//!
//! Account creation and authentication live in the session gateway; this
//! module only reads and seeds the rows other tables hang off.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inserts a user and returns the created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate
/// username).
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    display_name: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (username, display_name) VALUES ($1, $2) \
         RETURNING id, username, display_name, created_at",
    )
    .bind(username)
    .bind(display_name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Looks a user up by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, display_name, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the users with the given ids, in id order.
///
/// Ids without a row are silently absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users_by_ids(pool: &PgPool, user_ids: &[i64]) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, display_name, created_at FROM users \
         WHERE id = ANY($1::bigint[]) \
         ORDER BY id",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

//! Friendship reads.
//!
//! The friends subsystem owns friendship writes; the tracker only ever asks
//! "whose series belong on this chart". Only `accepted` rows count, and a
//! friendship is symmetric regardless of who requested it.

use sqlx::PgPool;

use crate::DbError;

/// Returns the ids of all accepted friends of `user_id`, in id order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_friend_ids(pool: &PgPool, user_id: i64) -> Result<Vec<i64>, DbError> {
    let rows = sqlx::query_scalar::<_, i64>(
        "SELECT CASE WHEN requester_id = $1 THEN addressee_id ELSE requester_id END \
         FROM friendships \
         WHERE (requester_id = $1 OR addressee_id = $1) AND status = 'accepted' \
         ORDER BY 1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Checks whether an accepted friendship exists between two users.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn are_friends(pool: &PgPool, user_id: i64, other_id: i64) -> Result<bool, DbError> {
    let found = sqlx::query_scalar::<_, i32>(
        "SELECT 1 FROM friendships \
         WHERE status = 'accepted' \
           AND ((requester_id = $1 AND addressee_id = $2) \
             OR (requester_id = $2 AND addressee_id = $1)) \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(other_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

//! Friends leaderboard over a trailing window.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use cptrack_core::normalize::{combine_overall, normalize};
use cptrack_core::series::SeriesPoint;
use cptrack_core::{Platform, Scope};
use cptrack_db::{PlatformHandleRow, SnapshotRow};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::history::scope_series;
use super::{
    map_db_error, normalize_days, parse_scope, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct LeaderboardQuery {
    pub platform: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct LeaderboardData {
    pub platform: Scope,
    pub days: i64,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub(super) struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    /// Cached current value under the scope.
    pub value: f64,
    /// Rating movement across the window: last minus first emitted point.
    pub delta: Option<f64>,
}

/// Latest cached value for a user's handles under the scope: the native
/// cached rating for a single platform, the combined normalized value for
/// overall. `None` when nothing relevant is linked or snapshotted yet.
pub(super) fn scope_value(scope: Scope, handles: &[&PlatformHandleRow]) -> Option<f64> {
    match scope.platform() {
        Some(platform) => cached_rating(handles, platform).map(f64::from),
        None => combine_overall(
            cached_rating(handles, Platform::Codeforces)
                .map(|r| normalize(r, Platform::Codeforces)),
            cached_rating(handles, Platform::Leetcode).map(|r| normalize(r, Platform::Leetcode)),
        ),
    }
}

fn cached_rating(handles: &[&PlatformHandleRow], platform: Platform) -> Option<i32> {
    handles
        .iter()
        .find(|h| h.platform == platform.as_str())
        .and_then(|h| h.current_rating)
}

fn series_delta(points: &[SeriesPoint]) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    Some(last.value - first.value)
}

/// GET /api/v1/leaderboard — the caller and their accepted friends, ranked.
pub(super) async fn get_leaderboard(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<LeaderboardData>>, ApiError> {
    let rid = &req_id.0;
    let scope = parse_scope(rid, query.platform.as_deref())?;
    let days = normalize_days(query.days);
    let cutoff = Utc::now() - Duration::days(days);

    let mut member_ids = cptrack_db::list_friend_ids(&state.pool, user.0)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    member_ids.push(user.0);

    let users = cptrack_db::list_users_by_ids(&state.pool, &member_ids)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    let handles = cptrack_db::list_handles_for_users(&state.pool, &member_ids)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    let rows = cptrack_db::list_snapshots_since_for_users(
        &state.pool,
        &member_ids,
        scope.platform().map(Platform::as_str),
        cutoff,
    )
    .await
    .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;

    let mut handles_by_user: HashMap<i64, Vec<&PlatformHandleRow>> = HashMap::new();
    for handle in &handles {
        handles_by_user
            .entry(handle.user_id)
            .or_default()
            .push(handle);
    }
    let mut rows_by_user: HashMap<i64, Vec<SnapshotRow>> = HashMap::new();
    for row in rows {
        rows_by_user.entry(row.user_id).or_default().push(row);
    }

    let mut entries = Vec::with_capacity(users.len());
    for user_row in users {
        let own_handles = handles_by_user.remove(&user_row.id).unwrap_or_default();
        let Some(value) = scope_value(scope, &own_handles) else {
            // Nothing linked or never snapshotted; not on the board.
            continue;
        };
        let own_rows = rows_by_user.remove(&user_row.id).unwrap_or_default();
        let points = scope_series(scope, &own_rows);
        entries.push(LeaderboardEntry {
            rank: 0,
            user_id: user_row.id,
            username: user_row.username,
            display_name: user_row.display_name,
            value,
            delta: series_delta(&points),
        });
    }

    entries.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    Ok(Json(ApiResponse {
        data: LeaderboardData {
            platform: scope,
            days,
            entries,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

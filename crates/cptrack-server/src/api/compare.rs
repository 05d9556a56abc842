//! Head-to-head comparison between the caller and one accepted friend.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use cptrack_core::series::SeriesPoint;
use cptrack_core::{Platform, Scope};
use cptrack_db::{PlatformHandleRow, SnapshotRow, UserRow};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::history::scope_series;
use super::leaderboard::scope_value;
use super::{
    map_db_error, normalize_days, parse_scope, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct CompareQuery {
    pub platform: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CompareData {
    pub platform: Scope,
    pub days: i64,
    pub user: CompareSide,
    pub friend: CompareSide,
}

#[derive(Debug, Serialize)]
pub(super) struct CompareSide {
    pub user_id: i64,
    pub username: String,
    /// Latest cached value under the scope: native rating for a single
    /// platform, combined normalized value for overall.
    pub current: Option<f64>,
    pub points: Vec<SeriesPoint>,
}

/// GET /api/v1/compare/{friend_id} — the caller against one friend.
///
/// Comparing against a stranger (or yourself) reads as `not_found`; the
/// friendship must already be accepted.
pub(super) async fn compare_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(friend_id): Path<i64>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ApiResponse<CompareData>>, ApiError> {
    let rid = &req_id.0;
    let scope = parse_scope(rid, query.platform.as_deref())?;
    let days = normalize_days(query.days);
    let cutoff = Utc::now() - Duration::days(days);

    let accepted = cptrack_db::are_friends(&state.pool, user.0, friend_id)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    if !accepted {
        return Err(ApiError::new(
            rid,
            "not_found",
            "no accepted friendship with that user",
        ));
    }

    let ids = [user.0, friend_id];
    let users = cptrack_db::list_users_by_ids(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    let handles = cptrack_db::list_handles_for_users(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    let rows = cptrack_db::list_snapshots_since_for_users(
        &state.pool,
        &ids,
        scope.platform().map(Platform::as_str),
        cutoff,
    )
    .await
    .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;

    let data = CompareData {
        platform: scope,
        days,
        user: build_side(rid, scope, user.0, &users, &handles, &rows)?,
        friend: build_side(rid, scope, friend_id, &users, &handles, &rows)?,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn build_side(
    request_id: &str,
    scope: Scope,
    user_id: i64,
    users: &[UserRow],
    handles: &[PlatformHandleRow],
    rows: &[SnapshotRow],
) -> Result<CompareSide, ApiError> {
    let user = users
        .iter()
        .find(|u| u.id == user_id)
        .ok_or_else(|| ApiError::new(request_id, "not_found", "user not found"))?;

    let own_handles: Vec<&PlatformHandleRow> =
        handles.iter().filter(|h| h.user_id == user_id).collect();
    let own_rows: Vec<SnapshotRow> = rows
        .iter()
        .filter(|r| r.user_id == user_id)
        .cloned()
        .collect();

    Ok(CompareSide {
        user_id,
        username: user.username.clone(),
        current: scope_value(scope, &own_handles),
        points: scope_series(scope, &own_rows),
    })
}

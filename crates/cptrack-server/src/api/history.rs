//! Rating history series, optionally overlaid with the caller's friends.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use cptrack_core::series::{self, RatingPoint, SeriesPoint};
use cptrack_core::{Platform, Scope};
use cptrack_db::SnapshotRow;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_db_error, normalize_days, parse_scope, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    pub platform: Option<String>,
    pub days: Option<i64>,
    pub include: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryData {
    pub platform: Scope,
    pub days: i64,
    pub points: Vec<SeriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friends: Option<Vec<FriendSeries>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friends_average: Option<Vec<SeriesPoint>>,
}

#[derive(Debug, Serialize)]
pub(super) struct FriendSeries {
    pub user_id: i64,
    pub username: String,
    pub points: Vec<SeriesPoint>,
}

/// Converts one user's snapshot rows into the series the scope asks for:
/// native values for a single platform, normalized and combined for overall.
pub(super) fn scope_series(scope: Scope, rows: &[SnapshotRow]) -> Vec<SeriesPoint> {
    match scope.platform() {
        Some(platform) => series::platform_series(&platform_points(rows, platform)),
        None => {
            let codeforces = platform_points(rows, Platform::Codeforces);
            let leetcode = platform_points(rows, Platform::Leetcode);
            series::overall_series(&codeforces, &leetcode)
        }
    }
}

fn platform_points(rows: &[SnapshotRow], platform: Platform) -> Vec<RatingPoint> {
    rows.iter()
        .filter(|row| row.platform == platform.as_str())
        .map(|row| RatingPoint {
            rating: row.rating,
            at: row.captured_at,
        })
        .collect()
}

/// GET /api/v1/history — the caller's rating series over a trailing window.
pub(super) async fn get_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryData>>, ApiError> {
    let rid = &req_id.0;
    let scope = parse_scope(rid, query.platform.as_deref())?;
    let days = normalize_days(query.days);
    let cutoff = Utc::now() - Duration::days(days);
    let platform_filter = scope.platform().map(Platform::as_str);

    let rows = cptrack_db::list_snapshots_since(&state.pool, user.0, platform_filter, cutoff)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;

    let mut data = HistoryData {
        platform: scope,
        days,
        points: scope_series(scope, &rows),
        friends: None,
        friends_average: None,
    };

    if query.include.as_deref() == Some("friends") {
        let friend_ids = cptrack_db::list_friend_ids(&state.pool, user.0)
            .await
            .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
        let users = cptrack_db::list_users_by_ids(&state.pool, &friend_ids)
            .await
            .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
        let friend_rows = cptrack_db::list_snapshots_since_for_users(
            &state.pool,
            &friend_ids,
            platform_filter,
            cutoff,
        )
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;

        let mut by_user: HashMap<i64, Vec<SnapshotRow>> = HashMap::new();
        for row in friend_rows {
            by_user.entry(row.user_id).or_default().push(row);
        }

        // Friends with nothing in the window still appear, with empty series.
        let mut friends = Vec::with_capacity(users.len());
        let mut all_series = Vec::with_capacity(users.len());
        for user_row in users {
            let rows = by_user.remove(&user_row.id).unwrap_or_default();
            let points = scope_series(scope, &rows);
            all_series.push(points.clone());
            friends.push(FriendSeries {
                user_id: user_row.id,
                username: user_row.username,
                points,
            });
        }

        data.friends_average = Some(series::friends_average(&all_series));
        data.friends = Some(friends);
    }

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

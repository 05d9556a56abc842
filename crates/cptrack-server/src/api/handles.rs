//! Handle lifecycle: link, verify, unlink, list, and on-demand refresh.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use cptrack_core::{cooldown, Platform};
use cptrack_db::{PlatformHandleRow, SnapshotRow};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};
use crate::snapshot;
use crate::tasks;

use super::{
    map_db_error, map_upstream_error, parse_platform, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct LinkHandleRequest {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct VerifyHandleRequest {
    pub token: String,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct HandleItem {
    pub platform: String,
    pub handle: String,
    pub verified: bool,
    pub current_rating: Option<i32>,
    pub linked_at: DateTime<Utc>,
}

impl From<PlatformHandleRow> for HandleItem {
    fn from(row: PlatformHandleRow) -> Self {
        Self {
            platform: row.platform,
            handle: row.handle,
            verified: row.verified,
            current_rating: row.current_rating,
            linked_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SnapshotItem {
    pub platform: String,
    pub rating: i32,
    pub total_solved: i64,
    pub topic_breakdown: Option<serde_json::Value>,
    pub captured_at: DateTime<Utc>,
}

impl From<SnapshotRow> for SnapshotItem {
    fn from(row: SnapshotRow) -> Self {
        Self {
            platform: row.platform,
            rating: row.rating,
            total_solved: row.total_solved,
            topic_breakdown: row.topic_breakdown,
            captured_at: row.captured_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Loads the caller's handle for `platform` or fails with `not_found`.
async fn require_handle(
    state: &AppState,
    request_id: &str,
    user_id: i64,
    platform: Platform,
) -> Result<PlatformHandleRow, ApiError> {
    cptrack_db::get_handle(&state.pool, user_id, platform.as_str())
        .await
        .map_err(|e| map_db_error(state.expose_errors, request_id.to_owned(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                request_id,
                "not_found",
                format!("no {platform} handle linked"),
            )
        })
}

fn map_link_error(
    expose_errors: bool,
    request_id: &str,
    platform: Platform,
    error: &cptrack_db::DbError,
) -> ApiError {
    match error {
        cptrack_db::DbError::HandleExists => ApiError::new(
            request_id,
            "conflict",
            format!("a {platform} handle is already linked to this account"),
        ),
        cptrack_db::DbError::Sqlx(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some("23503") =>
        {
            ApiError::new(request_id, "not_found", "no such user")
        }
        other => map_db_error(expose_errors, request_id.to_owned(), other),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/handles — the caller's linked handles.
pub(super) async fn list_handles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<HandleItem>>>, ApiError> {
    let rows = cptrack_db::list_handles(&state.pool, user.0)
        .await
        .map_err(|e| map_db_error(state.expose_errors, req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(HandleItem::from).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/handles/{platform} — link a platform account.
pub(super) async fn link_handle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(platform): Path<String>,
    Json(body): Json<LinkHandleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<HandleItem>>), ApiError> {
    let rid = &req_id.0;
    let platform = parse_platform(rid, &platform)?;

    let handle = body.handle.trim().to_owned();
    if handle.is_empty() || handle.len() > 64 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "handle must be 1-64 characters",
        ));
    }

    // The platform's confirmation is load-bearing here: a link must never be
    // created for an account the platform cannot see.
    let profile = state
        .adapters
        .fetch_profile(platform, &handle)
        .await
        .map_err(|e| map_upstream_error(rid.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                rid,
                "not_found",
                format!("no {platform} account named '{handle}'"),
            )
        })?;

    let row = cptrack_db::insert_handle(&state.pool, user.0, platform.as_str(), &handle)
        .await
        .map_err(|e| map_link_error(state.expose_errors, rid, platform, &e))?;

    tasks::spawn_backfill(
        state.pool.clone(),
        Arc::clone(&state.adapters),
        user.0,
        profile,
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: HandleItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// POST /api/v1/handles/{platform}/verify — prove ownership via a profile
/// token.
pub(super) async fn verify_handle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(platform): Path<String>,
    Json(body): Json<VerifyHandleRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let platform = parse_platform(rid, &platform)?;

    let token = body.token.trim();
    if token.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "token must not be empty",
        ));
    }

    let row = require_handle(&state, rid, user.0, platform).await?;

    let found = state
        .adapters
        .verify_ownership_token(platform, &row.handle, token)
        .await
        .map_err(|e| map_upstream_error(rid.clone(), &e))?;
    if !found {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!(
                "token not found on the {platform} profile; add it to a profile text field and retry"
            ),
        ));
    }

    cptrack_db::set_verified(&state.pool, user.0, platform.as_str())
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "verified": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/handles/{platform} — unlink and drop the platform's
/// snapshot history.
pub(super) async fn unlink_handle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(platform): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let platform = parse_platform(rid, &platform)?;

    let removed = cptrack_db::unlink_handle(&state.pool, user.0, platform.as_str())
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    if !removed {
        return Err(ApiError::new(
            rid,
            "not_found",
            format!("no {platform} handle linked"),
        ));
    }

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "removed": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/handles/{platform}/refresh — capture a snapshot now,
/// subject to the cooldown.
pub(super) async fn refresh_handle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(platform): Path<String>,
) -> Result<Json<ApiResponse<SnapshotItem>>, ApiError> {
    let rid = &req_id.0;
    let platform = parse_platform(rid, &platform)?;
    let row = require_handle(&state, rid, user.0, platform).await?;

    let last = cptrack_db::latest_snapshot_at(&state.pool, user.0, platform.as_str())
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    let status = cooldown::check(last, Utc::now());
    if !status.allowed {
        let minutes = status.remaining_minutes();
        let message = if minutes == 1 {
            "refresh available in 1 minute".to_owned()
        } else {
            format!("refresh available in {minutes} minutes")
        };
        return Err(ApiError::rate_limited(
            rid,
            message,
            status.remaining_seconds,
        ));
    }

    let profile = match state.adapters.fetch_profile(platform, &row.handle).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            return Err(ApiError::new(
                rid,
                "not_found",
                format!("no {platform} account named '{}'", row.handle),
            ));
        }
        Err(error) => {
            // Upstream failure degrades to not_found on refresh; link and
            // verify surface it as bad gateway instead.
            tracing::warn!(
                platform = platform.as_str(),
                handle = %row.handle,
                %error,
                "refresh: profile fetch failed"
            );
            return Err(ApiError::new(
                rid,
                "not_found",
                format!("could not fetch the {platform} profile for '{}'", row.handle),
            ));
        }
    };

    let topics = snapshot::resolve_topics(&state.adapters, &profile).await;
    let snap = snapshot::create_from_profile(&state.pool, user.0, &profile, &topics)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SnapshotItem::from(snap),
        meta: ResponseMeta::new(req_id.0),
    }))
}

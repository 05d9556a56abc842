//! Topic breakdowns, fetched live and merged across linked handles.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use cptrack_core::{Platform, Scope};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, parse_scope, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct TopicsQuery {
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct TopicsData {
    pub platform: Scope,
    pub topics: BTreeMap<String, i64>,
}

/// GET /api/v1/topics — tag to solved-count map, summed across whichever
/// handles the scope selects.
///
/// Counts come straight from the platforms rather than from stored
/// snapshots; a handle whose platform cannot be reached contributes an
/// empty map instead of failing the request.
pub(super) async fn get_topic_breakdown(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<ApiResponse<TopicsData>>, ApiError> {
    let rid = &req_id.0;
    let scope = parse_scope(rid, query.platform.as_deref())?;

    let handles = cptrack_db::list_handles(&state.pool, user.0)
        .await
        .map_err(|e| map_db_error(state.expose_errors, rid.clone(), &e))?;
    let selected: Vec<_> = handles
        .iter()
        .filter(|h| scope.platform().is_none_or(|p| h.platform == p.as_str()))
        .collect();
    if selected.is_empty() {
        let message = match scope.platform() {
            Some(platform) => format!("no {platform} handle linked"),
            None => "no platform handles linked".to_owned(),
        };
        return Err(ApiError::new(rid, "not_found", message));
    }

    let mut topics: BTreeMap<String, i64> = BTreeMap::new();
    for row in selected {
        let Ok(platform) = row.platform.parse::<Platform>() else {
            continue;
        };
        match state
            .adapters
            .fetch_topic_breakdown(platform, &row.handle)
            .await
        {
            Ok(counts) => {
                for (tag, count) in counts {
                    *topics.entry(tag).or_insert(0) += count;
                }
            }
            Err(error) => {
                tracing::warn!(
                    platform = platform.as_str(),
                    handle = %row.handle,
                    %error,
                    "topic breakdown fetch failed; treating as empty"
                );
            }
        }
    }

    Ok(Json(ApiResponse {
        data: TopicsData {
            platform: scope,
            topics,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

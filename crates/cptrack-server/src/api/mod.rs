mod compare;
mod handles;
mod history;
mod leaderboard;
mod topics;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use cptrack_core::{Platform, Scope};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::adapter::{AdapterError, PlatformAdapters};
use crate::middleware::{request_id, require_user, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub adapters: Arc<PlatformAdapters>,
    /// Append the underlying error to 500 messages (development only).
    pub expose_errors: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Only set on `rate_limited` errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                retry_after_seconds: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    /// A 429 carrying a machine-readable retry hint next to the message.
    pub fn rate_limited(
        request_id: impl Into<String>,
        message: impl Into<String>,
        retry_after_seconds: i64,
    ) -> Self {
        let mut error = Self::new(request_id, "rate_limited", message);
        error.error.retry_after_seconds = Some(retry_after_seconds);
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_unavailable" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_days(days: Option<i64>) -> i64 {
    days.unwrap_or(90).clamp(1, 365)
}

/// Resolves the `platform` query parameter; absent means the overall view.
pub(super) fn parse_scope(request_id: &str, raw: Option<&str>) -> Result<Scope, ApiError> {
    let Some(raw) = raw else {
        return Ok(Scope::Overall);
    };
    raw.parse().map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("platform must be codeforces, leetcode, or overall, got '{raw}'"),
        )
    })
}

/// Resolves a `{platform}` path segment, where the overall view is not a
/// valid target.
pub(super) fn parse_platform(request_id: &str, raw: &str) -> Result<Platform, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("unknown platform '{raw}'"),
        )
    })
}

pub(super) fn map_db_error(
    expose_errors: bool,
    request_id: String,
    error: &cptrack_db::DbError,
) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    let message = if expose_errors {
        format!("database query failed: {error}")
    } else {
        "database query failed".to_owned()
    };
    ApiError::new(request_id, "internal_error", message)
}

pub(super) fn map_upstream_error(request_id: String, error: &AdapterError) -> ApiError {
    tracing::warn!(error = %error, "platform API request failed");
    ApiError::new(
        request_id,
        "upstream_unavailable",
        "platform API unavailable; try again later",
    )
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-user-id"),
        ])
}

fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/handles", get(handles::list_handles))
        .route(
            "/api/v1/handles/{platform}",
            post(handles::link_handle).delete(handles::unlink_handle),
        )
        .route(
            "/api/v1/handles/{platform}/verify",
            post(handles::verify_handle),
        )
        .route(
            "/api/v1/handles/{platform}/refresh",
            post(handles::refresh_handle),
        )
        .route("/api/v1/history", get(history::get_history))
        .route("/api/v1/topics", get(topics::get_topic_breakdown))
        .route("/api/v1/compare/{friend_id}", get(compare::compare_users))
        .route("/api/v1/leaderboard", get(leaderboard::get_leaderboard))
        .layer(axum::middleware::from_fn(require_user))
}

pub fn build_app(state: AppState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router())
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match cptrack_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Duration;
    use cptrack_codeforces::CodeforcesClient;
    use cptrack_leetcode::LeetcodeClient;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn normalize_days_applies_defaults_and_bounds() {
        assert_eq!(normalize_days(None), 90);
        assert_eq!(normalize_days(Some(0)), 1);
        assert_eq!(normalize_days(Some(1_000)), 365);
        assert_eq!(normalize_days(Some(30)), 30);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let response =
            ApiError::new("req-1", "upstream_unavailable", "platform down").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn rate_limited_carries_a_retry_hint() {
        let error = ApiError::rate_limited("req-1", "refresh available in 3 minutes", 150);
        let json = serde_json::to_value(&error).expect("serialize");
        assert_eq!(json["error"]["code"], "rate_limited");
        assert_eq!(json["error"]["retry_after_seconds"], 150);
        assert_eq!(
            error.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn plain_errors_omit_the_retry_hint() {
        let error = ApiError::new("req-1", "not_found", "nope");
        let json = serde_json::to_value(&error).expect("serialize");
        assert!(json["error"].get("retry_after_seconds").is_none());
    }

    #[test]
    fn parse_scope_defaults_to_overall_and_rejects_junk() {
        assert_eq!(parse_scope("req-1", None).expect("default"), Scope::Overall);
        assert_eq!(
            parse_scope("req-1", Some("codeforces")).expect("codeforces"),
            Scope::Codeforces
        );
        assert_eq!(
            parse_scope("req-1", Some("overall")).expect("overall"),
            Scope::Overall
        );
        let err = parse_scope("req-1", Some("atcoder")).expect_err("junk");
        assert_eq!(err.error.code, "validation_error");
    }

    // -------------------------------------------------------------------------
    // Seed helpers
    // -------------------------------------------------------------------------

    async fn seed_user(pool: &sqlx::PgPool, username: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, display_name) VALUES ($1, $2) RETURNING id",
        )
        .bind(username)
        .bind(format!("User {username}"))
        .fetch_one(pool)
        .await
        .expect("seed_user failed")
    }

    async fn seed_friendship(pool: &sqlx::PgPool, requester: i64, addressee: i64) {
        sqlx::query(
            "INSERT INTO friendships (requester_id, addressee_id, status) \
             VALUES ($1, $2, 'accepted')",
        )
        .bind(requester)
        .bind(addressee)
        .execute(pool)
        .await
        .expect("seed_friendship failed");
    }

    async fn seed_handle(pool: &sqlx::PgPool, user_id: i64, platform: &str, handle: &str) {
        sqlx::query("INSERT INTO platform_handles (user_id, platform, handle) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(platform)
            .bind(handle)
            .execute(pool)
            .await
            .expect("seed_handle failed");
    }

    async fn seed_snapshot_at(
        pool: &sqlx::PgPool,
        user_id: i64,
        platform: &str,
        rating: i32,
        captured_at: DateTime<Utc>,
    ) {
        sqlx::query(
            "INSERT INTO snapshots (user_id, platform, rating, captured_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(platform)
        .bind(rating)
        .bind(captured_at)
        .execute(pool)
        .await
        .expect("seed_snapshot_at failed");
    }

    async fn refresh_cache(pool: &sqlx::PgPool, user_id: i64, platform: &str) {
        cptrack_db::refresh_cached_rating(pool, user_id, platform)
            .await
            .expect("refresh_cached_rating failed");
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    // -------------------------------------------------------------------------
    // App and request helpers
    // -------------------------------------------------------------------------

    fn test_app(pool: sqlx::PgPool, adapters: Arc<PlatformAdapters>) -> Router {
        build_app(AppState {
            pool,
            adapters,
            expose_errors: false,
        })
    }

    /// Adapters pointed at a closed port, for tests that never touch a
    /// platform API.
    fn offline_adapters() -> Arc<PlatformAdapters> {
        let codeforces =
            CodeforcesClient::with_base_url(2, "cptrack-tests", "http://127.0.0.1:9/cf/")
                .expect("codeforces client")
                .retry_policy(0, 1);
        let leetcode = LeetcodeClient::with_endpoint(2, "cptrack-tests", "http://127.0.0.1:9/lc")
            .expect("leetcode client");
        Arc::new(PlatformAdapters::from_parts(codeforces, leetcode))
    }

    fn mock_adapters(server: &MockServer) -> Arc<PlatformAdapters> {
        let codeforces =
            CodeforcesClient::with_base_url(5, "cptrack-tests", &format!("{}/cf/", server.uri()))
                .expect("codeforces client")
                .retry_policy(0, 1);
        let leetcode =
            LeetcodeClient::with_endpoint(5, "cptrack-tests", &format!("{}/lc", server.uri()))
                .expect("leetcode client");
        Arc::new(PlatformAdapters::from_parts(codeforces, leetcode))
    }

    fn get_as(user_id: i64, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .body(Body::empty())
            .expect("request")
    }

    fn post_as(user_id: i64, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn delete_as(user_id: i64, uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    // -------------------------------------------------------------------------
    // Platform API fixtures
    // -------------------------------------------------------------------------

    fn cf_user_info(handle: &str, rating: i32, organization: &str) -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "result": [{
                "handle": handle,
                "firstName": "Anna",
                "organization": organization,
                "rating": rating,
                "maxRating": rating + 120,
                "rank": "expert",
            }]
        })
    }

    fn cf_rating_history() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "result": [
                {
                    "contestId": 101,
                    "contestName": "Round 101",
                    "ratingUpdateTimeSeconds": 1_767_312_000,
                    "oldRating": 0,
                    "newRating": 1450,
                },
                {
                    "contestId": 102,
                    "contestName": "Round 102",
                    "ratingUpdateTimeSeconds": 1_768_521_600,
                    "oldRating": 1450,
                    "newRating": 1520,
                },
            ]
        })
    }

    fn cf_submissions() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "result": [
                {
                    "id": 1,
                    "creationTimeSeconds": 1_767_312_000,
                    "problem": {
                        "contestId": 101, "index": "A", "name": "Watermelon",
                        "tags": ["math", "greedy"],
                    },
                    "verdict": "OK",
                },
                {
                    "id": 2,
                    "creationTimeSeconds": 1_767_312_100,
                    "problem": {
                        "contestId": 101, "index": "A", "name": "Watermelon",
                        "tags": ["math", "greedy"],
                    },
                    "verdict": "OK",
                },
                {
                    "id": 3,
                    "creationTimeSeconds": 1_767_312_200,
                    "problem": {
                        "contestId": 102, "index": "B", "name": "Bridges",
                        "tags": ["graphs"],
                    },
                    "verdict": "OK",
                },
            ]
        })
    }

    fn cf_handle_not_found() -> serde_json::Value {
        serde_json::json!({
            "status": "FAILED",
            "comment": "handles: User with handle ghost not found"
        })
    }

    fn lc_matched_user(username: &str) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "matchedUser": {
                    "username": username,
                    "profile": { "aboutMe": "hi", "ranking": 12_345 },
                    "submitStatsGlobal": {
                        "acSubmissionNum": [
                            { "difficulty": "All", "count": 250 },
                            { "difficulty": "Easy", "count": 120 },
                            { "difficulty": "Medium", "count": 100 },
                            { "difficulty": "Hard", "count": 30 },
                        ]
                    },
                    "tagProblemCounts": {
                        "advanced": [
                            { "tagName": "graphs", "problemsSolved": 12 },
                        ],
                        "intermediate": [],
                        "fundamental": [
                            { "tagName": "array", "problemsSolved": 95 },
                        ],
                    },
                }
            }
        })
    }

    async fn mount_cf_profile(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/cf/user.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_cf_submissions(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/cf/user.status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cf_submissions()))
            .mount(server)
            .await;
    }

    async fn mount_lc_profile(server: &MockServer, username: &str) {
        Mock::given(method("POST"))
            .and(path("/lc"))
            .and(body_string_contains("matchedUser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lc_matched_user(username)))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/lc"))
            .and(body_string_contains("userContestRanking"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "userContestRanking": { "rating": 2000.4, "attendedContestsCount": 9 } }
            })))
            .mount(server)
            .await;
    }

    /// Waits for the detached post-link backfill to finish writing.
    async fn wait_for_snapshots(pool: &sqlx::PgPool, user_id: i64, platform: &str, want: i64) {
        for _ in 0..50 {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM snapshots WHERE user_id = $1 AND platform = $2",
            )
            .bind(user_id)
            .bind(platform)
            .fetch_one(pool)
            .await
            .expect("snapshot count");
            if count >= want {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("backfill never reached {want} snapshots");
    }

    // -------------------------------------------------------------------------
    // Health and identity
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_is_public_and_reports_ok(pool: sqlx::PgPool) {
        let app = test_app(pool, offline_adapters());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["database"], "ok");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn protected_routes_reject_missing_identity(pool: sqlx::PgPool) {
        let app = test_app(pool, offline_adapters());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/handles")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "unauthorized");
    }

    // -------------------------------------------------------------------------
    // Linking
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn link_handle_creates_row_and_schedules_backfill(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_user_info("anna_cf", 1520, "")).await;
        mount_cf_submissions(&server).await;
        Mock::given(method("GET"))
            .and(path("/cf/user.rating"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cf_rating_history()))
            .mount(&server)
            .await;

        let alice = seed_user(&pool, "alice").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces",
                &serde_json::json!({ "handle": "anna_cf" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["platform"], "codeforces");
        assert_eq!(json["data"]["handle"], "anna_cf");
        assert_eq!(json["data"]["verified"], false);

        let row = cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .expect("handle row");
        assert_eq!(row.handle, "anna_cf");

        // One immediate snapshot plus two backfilled history points.
        wait_for_snapshots(&pool, alice, "codeforces", 3).await;
        let row = cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .expect("handle row");
        assert_eq!(row.current_rating, Some(1520));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn linking_twice_conflicts_and_keeps_the_original(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_user_info("second_choice", 1400, "")).await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "first_choice").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces",
                &serde_json::json!({ "handle": "second_choice" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "conflict");

        let row = cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .expect("handle row");
        assert_eq!(row.handle, "first_choice");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn linking_an_unknown_handle_is_not_found(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_handle_not_found()).await;

        let alice = seed_user(&pool, "alice").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces",
                &serde_json::json!({ "handle": "ghost" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn linking_while_the_platform_is_down_is_bad_gateway(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cf/user.info"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let alice = seed_user(&pool, "alice").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces",
                &serde_json::json!({ "handle": "anna_cf" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "upstream_unavailable");
        assert!(cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn link_rejects_blank_handles_and_unknown_platforms(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .clone()
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces",
                &serde_json::json!({ "handle": "   " }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/atcoder",
                &serde_json::json!({ "handle": "anna" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    // -------------------------------------------------------------------------
    // Refresh and cooldown
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn refresh_captures_a_snapshot_and_updates_the_cache(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_user_info("anna_cf", 1742, "")).await;
        mount_cf_submissions(&server).await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces/refresh",
                &serde_json::json!({}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["platform"], "codeforces");
        assert_eq!(json["data"]["rating"], 1742);
        assert_eq!(json["data"]["total_solved"], 0);
        assert_eq!(json["data"]["topic_breakdown"]["math"], 1);
        assert_eq!(json["data"]["topic_breakdown"]["graphs"], 1);

        let row = cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .expect("handle row");
        assert_eq!(row.current_rating, Some(1742));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn refresh_inside_the_cooldown_is_rate_limited(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_user_info("anna_cf", 1742, "")).await;
        mount_cf_submissions(&server).await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .clone()
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces/refresh",
                &serde_json::json!({}),
            ))
            .await
            .expect("first refresh");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces/refresh",
                &serde_json::json!({}),
            ))
            .await
            .expect("second refresh");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "rate_limited");
        let retry_after = json["error"]["retry_after_seconds"]
            .as_i64()
            .expect("retry_after_seconds");
        assert!((1..=300).contains(&retry_after), "got {retry_after}");
        let message = json["error"]["message"].as_str().expect("message");
        assert!(message.contains("minute"), "got {message:?}");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn refresh_without_a_linked_handle_is_not_found(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/leetcode/refresh",
                &serde_json::json!({}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn refresh_survives_platform_downtime_as_not_found(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cf/user.info"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces/refresh",
                &serde_json::json!({}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // No snapshot was written.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    // -------------------------------------------------------------------------
    // Verification
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn verify_flips_the_flag_when_the_token_is_present(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_user_info("anna_cf", 1742, "cpt-verify-123")).await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces/verify",
                &serde_json::json!({ "token": "cpt-verify-123" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["verified"], true);

        let row = cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .expect("handle row");
        assert!(row.verified);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn verify_with_a_missing_token_is_rejected(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_profile(&server, cf_user_info("anna_cf", 1742, "nothing here")).await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        let app = test_app(pool.clone(), mock_adapters(&server));

        let response = app
            .oneshot(post_as(
                alice,
                "/api/v1/handles/codeforces/verify",
                &serde_json::json!({ "token": "cpt-verify-123" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");

        let row = cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .expect("handle row");
        assert!(!row.verified);
    }

    // -------------------------------------------------------------------------
    // Unlink and list
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn unlink_removes_the_handle_and_its_history(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_snapshot_at(&pool, alice, "codeforces", 1500, days_ago(1)).await;
        let app = test_app(pool.clone(), offline_adapters());

        let response = app
            .clone()
            .oneshot(delete_as(alice, "/api/v1/handles/codeforces"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["removed"], true);

        assert!(cptrack_db::get_handle(&pool, alice, "codeforces")
            .await
            .expect("get_handle")
            .is_none());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots WHERE user_id = $1")
            .bind(alice)
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);

        let response = app
            .oneshot(delete_as(alice, "/api/v1/handles/codeforces"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_handles_shows_linked_platforms_with_cached_ratings(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "leetcode", "anna_lc").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_snapshot_at(&pool, alice, "codeforces", 1742, days_ago(1)).await;
        refresh_cache(&pool, alice, "codeforces").await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(alice, "/api/v1/handles"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["platform"], "codeforces");
        assert_eq!(data[0]["current_rating"], 1742);
        assert_eq!(data[1]["platform"], "leetcode");
        assert!(data[1]["current_rating"].is_null());
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn history_returns_native_points_for_one_platform(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_snapshot_at(&pool, alice, "codeforces", 1500, days_ago(3)).await;
        seed_snapshot_at(&pool, alice, "codeforces", 1550, days_ago(2)).await;
        seed_snapshot_at(&pool, alice, "codeforces", 1600, days_ago(1)).await;
        // Outside the requested window.
        seed_snapshot_at(&pool, alice, "codeforces", 900, days_ago(200)).await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(alice, "/api/v1/history?platform=codeforces&days=90"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["platform"], "codeforces");
        assert_eq!(json["data"]["days"], 90);
        let points = json["data"]["points"].as_array().expect("points");
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["value"], 1500.0);
        assert_eq!(points[2]["value"], 1600.0);
        assert!(json["data"].get("friends").is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn history_overall_normalizes_and_combines(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_handle(&pool, alice, "leetcode", "anna_lc").await;
        // Codeforces 800 -> 0, 2150 -> 50; LeetCode 2000 -> 50.
        seed_snapshot_at(&pool, alice, "codeforces", 800, days_ago(3)).await;
        seed_snapshot_at(&pool, alice, "codeforces", 2150, days_ago(1)).await;
        seed_snapshot_at(&pool, alice, "leetcode", 2000, days_ago(2)).await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(alice, "/api/v1/history?platform=overall"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["platform"], "overall");
        let points = json["data"]["points"].as_array().expect("points");
        assert_eq!(points.len(), 2);
        // Index 0 averages both platforms, index 1 is Codeforces alone.
        assert_eq!(points[0]["value"], 25.0);
        assert_eq!(points[1]["value"], 50.0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn history_with_friends_includes_their_series_and_average(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        seed_friendship(&pool, bob, alice).await;
        seed_snapshot_at(&pool, alice, "codeforces", 1600, days_ago(1)).await;
        seed_snapshot_at(&pool, bob, "codeforces", 1200, days_ago(2)).await;
        seed_snapshot_at(&pool, bob, "codeforces", 1300, days_ago(1)).await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(
                alice,
                "/api/v1/history?platform=codeforces&include=friends",
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let friends = json["data"]["friends"].as_array().expect("friends");
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0]["username"], "bob");
        assert_eq!(
            friends[0]["points"].as_array().map(Vec::len),
            Some(2),
            "bob's series"
        );
        let average = json["data"]["friends_average"]
            .as_array()
            .expect("friends_average");
        assert_eq!(average.len(), 2);
        assert_eq!(average[0]["value"], 1200.0);
        assert_eq!(average[1]["value"], 1300.0);
    }

    // -------------------------------------------------------------------------
    // Topics
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn topics_merge_across_platforms(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_cf_submissions(&server).await;
        mount_lc_profile(&server, "anna_lc").await;

        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_handle(&pool, alice, "leetcode", "anna_lc").await;
        let app = test_app(pool, mock_adapters(&server));

        let response = app
            .oneshot(get_as(alice, "/api/v1/topics"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["platform"], "overall");
        // "graphs" appears on both platforms: 1 from Codeforces, 12 from LeetCode.
        assert_eq!(json["data"]["topics"]["graphs"], 13);
        assert_eq!(json["data"]["topics"]["math"], 1);
        assert_eq!(json["data"]["topics"]["array"], 95);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn topics_require_a_matching_linked_handle(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(alice, "/api/v1/topics?platform=leetcode"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // -------------------------------------------------------------------------
    // Leaderboard and compare
    // -------------------------------------------------------------------------

    #[sqlx::test(migrations = "../../migrations")]
    async fn leaderboard_ranks_friends_by_value(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;
        seed_friendship(&pool, alice, bob).await;
        // carol is not a friend and must not appear.
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_handle(&pool, bob, "codeforces", "bob_cf").await;
        seed_handle(&pool, carol, "codeforces", "carol_cf").await;
        seed_snapshot_at(&pool, alice, "codeforces", 2000, days_ago(5)).await;
        seed_snapshot_at(&pool, alice, "codeforces", 2150, days_ago(1)).await;
        seed_snapshot_at(&pool, bob, "codeforces", 1900, days_ago(2)).await;
        seed_snapshot_at(&pool, carol, "codeforces", 3000, days_ago(1)).await;
        for user in [alice, bob, carol] {
            refresh_cache(&pool, user, "codeforces").await;
        }
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(alice, "/api/v1/leaderboard?platform=codeforces"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let entries = json["data"]["entries"].as_array().expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["rank"], 1);
        assert_eq!(entries[0]["username"], "alice");
        assert_eq!(entries[0]["value"], 2150.0);
        assert_eq!(entries[0]["delta"], 150.0);
        assert_eq!(entries[1]["rank"], 2);
        assert_eq!(entries[1]["username"], "bob");
        assert_eq!(entries[1]["value"], 1900.0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn compare_requires_an_accepted_friendship(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        let carol = seed_user(&pool, "carol").await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(alice, &format!("/api/v1/compare/{carol}")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn compare_returns_both_sides_of_the_pair(pool: sqlx::PgPool) {
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        seed_friendship(&pool, alice, bob).await;
        seed_handle(&pool, alice, "codeforces", "anna_cf").await;
        seed_handle(&pool, bob, "codeforces", "bob_cf").await;
        seed_snapshot_at(&pool, alice, "codeforces", 1500, days_ago(3)).await;
        seed_snapshot_at(&pool, alice, "codeforces", 1600, days_ago(1)).await;
        seed_snapshot_at(&pool, bob, "codeforces", 1400, days_ago(2)).await;
        refresh_cache(&pool, alice, "codeforces").await;
        refresh_cache(&pool, bob, "codeforces").await;
        let app = test_app(pool, offline_adapters());

        let response = app
            .oneshot(get_as(
                alice,
                &format!("/api/v1/compare/{bob}?platform=codeforces"),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["platform"], "codeforces");
        assert_eq!(json["data"]["user"]["username"], "alice");
        assert_eq!(json["data"]["user"]["current"], 1600.0);
        assert_eq!(json["data"]["user"]["points"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["data"]["friend"]["username"], "bob");
        assert_eq!(json["data"]["friend"]["current"], 1400.0);
        assert_eq!(
            json["data"]["friend"]["points"].as_array().map(Vec::len),
            Some(1)
        );
    }
}

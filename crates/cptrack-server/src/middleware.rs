use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The acting user's id, resolved from the `x-user-id` header.
///
/// Session handling lives in the gateway in front of this service; it
/// authenticates the caller and forwards the numeric user id in `x-user-id`.
/// This service trusts the header and only rejects requests where it is
/// missing or not a positive integer.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving [`CurrentUser`] on protected routes.
pub async fn require_user(mut req: Request, next: Next) -> Response {
    match user_id_from_header(req.headers().get("x-user-id")) {
        Some(id) => {
            req.extensions_mut().insert(CurrentUser(id));
            next.run(req).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "unauthorized",
                    message: "missing or invalid x-user-id header",
                },
            }),
        )
            .into_response(),
    }
}

fn user_id_from_header(value: Option<&HeaderValue>) -> Option<i64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

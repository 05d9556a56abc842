//! Wire types for the Codeforces REST API.
//!
//! Every endpoint wraps its payload in `{"status": "OK", "result": ...}`;
//! failures come back as `{"status": "FAILED", "comment": "..."}`. The
//! client checks the envelope before deserializing `result`, so these types
//! only model the success shape.

use serde::Deserialize;

/// Success envelope around an endpoint's `result` payload.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub result: T,
}

/// A user as returned by `user.info`.
///
/// Unrated accounts omit `rating`/`maxRating`/`rank` entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub handle: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub max_rating: Option<i32>,
    #[serde(default)]
    pub rank: Option<String>,
}

/// One entry of `user.rating`, ordered oldest-first by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub contest_id: i64,
    pub contest_name: String,
    pub rating_update_time_seconds: i64,
    pub old_rating: i32,
    pub new_rating: i32,
}

/// One submission from `user.status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    #[serde(default)]
    pub creation_time_seconds: Option<i64>,
    pub problem: Problem,
    /// Absent while the submission is still judging.
    #[serde(default)]
    pub verdict: Option<String>,
}

/// Problem metadata attached to a submission.
///
/// `contest_id` is absent for problems from gyms and archives.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default)]
    pub contest_id: Option<i64>,
    #[serde(default)]
    pub index: Option<String>,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

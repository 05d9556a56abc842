//! HTTP client for the Codeforces REST API.
//!
//! Wraps `reqwest` with Codeforces-specific envelope handling, retry with
//! back-off, and typed response deserialization. Every endpoint checks the
//! `"status"` field in the JSON envelope; a `"FAILED"` status whose comment
//! names an unknown handle is folded into the return type (`None`, empty)
//! instead of surfacing as an error, because an unknown handle is an answer,
//! not a failure.

use std::collections::BTreeMap;
use std::time::Duration;

use cptrack_core::profile::PlatformProfile;
use cptrack_core::series::RatingPoint;
use reqwest::{Client, Url};

use crate::error::CodeforcesError;
use crate::retry::retry_with_backoff;
use crate::types::{ApiResponse, RatingUpdate, Submission, UserInfo};
use crate::{normalize, topics};

const DEFAULT_BASE_URL: &str = "https://codeforces.com/api/";

/// Submissions fetched per `user.status` call; enough to cover years of
/// activity for a typical account.
const MAX_SUBMISSIONS: u32 = 10_000;

/// Client for the Codeforces REST API.
///
/// Use [`CodeforcesClient::new`] for production or
/// [`CodeforcesClient::with_base_url`] to point at a mock server in tests.
/// Transient failures (timeouts, 5xx) are retried per the configured policy;
/// see [`CodeforcesClient::retry_policy`].
pub struct CodeforcesClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl CodeforcesClient {
    /// Creates a new client pointed at the production Codeforces API.
    ///
    /// # Errors
    ///
    /// Returns [`CodeforcesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, CodeforcesError> {
        Self::with_base_url(timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock,
    /// or a mirror).
    ///
    /// # Errors
    ///
    /// Returns [`CodeforcesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`CodeforcesError::ApiError`] if `base_url`
    /// is not a valid base URL.
    pub fn with_base_url(
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, CodeforcesError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so the
        // endpoint name is appended as a new path segment rather than
        // replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| CodeforcesError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CodeforcesError::ApiError(format!(
                "base URL '{base_url}' cannot carry path segments"
            )));
        }

        Ok(Self {
            client,
            base_url,
            max_retries: 2,
            backoff_base_ms: 500,
        })
    }

    /// Replaces the default retry policy (2 retries, 500 ms base back-off).
    #[must_use]
    pub fn retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Fetches a user's public profile via `user.info`.
    ///
    /// Returns `Ok(None)` when the handle does not exist. The returned
    /// profile has no solve counts and an empty topic breakdown; combine it
    /// with [`CodeforcesClient::fetch_topic_breakdown`] for the full picture.
    ///
    /// # Errors
    ///
    /// - [`CodeforcesError::ApiError`] if the API reports a failure other
    ///   than an unknown handle.
    /// - [`CodeforcesError::Http`] on network failure or non-2xx HTTP status.
    /// - [`CodeforcesError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn fetch_profile(
        &self,
        handle: &str,
    ) -> Result<Option<PlatformProfile>, CodeforcesError> {
        let url = self.build_url("user.info", &[("handles", handle)]);
        let body = self.request_json(&url).await?;
        if let Some(comment) = Self::failure_comment(&body) {
            if is_handle_not_found(&comment) {
                return Ok(None);
            }
            return Err(CodeforcesError::ApiError(comment));
        }

        let envelope: ApiResponse<Vec<UserInfo>> =
            serde_json::from_value(body).map_err(|e| CodeforcesError::Deserialize {
                context: format!("user.info(handles={handle})"),
                source: e,
            })?;

        Ok(envelope
            .result
            .first()
            .map(normalize::profile_from_user))
    }

    /// Fetches a user's full rating-change history via `user.rating`,
    /// oldest first.
    ///
    /// Returns an empty vector when the handle does not exist or has never
    /// competed.
    ///
    /// # Errors
    ///
    /// - [`CodeforcesError::ApiError`] if the API reports a failure other
    ///   than an unknown handle.
    /// - [`CodeforcesError::Http`] on network failure or non-2xx HTTP status.
    /// - [`CodeforcesError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn fetch_rating_history(
        &self,
        handle: &str,
    ) -> Result<Vec<RatingPoint>, CodeforcesError> {
        let url = self.build_url("user.rating", &[("handle", handle)]);
        let body = self.request_json(&url).await?;
        if let Some(comment) = Self::failure_comment(&body) {
            if is_handle_not_found(&comment) {
                return Ok(Vec::new());
            }
            return Err(CodeforcesError::ApiError(comment));
        }

        let envelope: ApiResponse<Vec<RatingUpdate>> =
            serde_json::from_value(body).map_err(|e| CodeforcesError::Deserialize {
                context: format!("user.rating(handle={handle})"),
                source: e,
            })?;

        Ok(normalize::history_points(&envelope.result))
    }

    /// Derives a topic → solved-count breakdown from `user.status`.
    ///
    /// Accepted submissions are deduplicated per problem before tags are
    /// tallied (see [`topics::topic_breakdown`]). Returns an empty map when
    /// the handle does not exist.
    ///
    /// # Errors
    ///
    /// - [`CodeforcesError::ApiError`] if the API reports a failure other
    ///   than an unknown handle.
    /// - [`CodeforcesError::Http`] on network failure or non-2xx HTTP status.
    /// - [`CodeforcesError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn fetch_topic_breakdown(
        &self,
        handle: &str,
    ) -> Result<BTreeMap<String, i64>, CodeforcesError> {
        let count = MAX_SUBMISSIONS.to_string();
        let url = self.build_url(
            "user.status",
            &[("handle", handle), ("from", "1"), ("count", &count)],
        );
        let body = self.request_json(&url).await?;
        if let Some(comment) = Self::failure_comment(&body) {
            if is_handle_not_found(&comment) {
                return Ok(BTreeMap::new());
            }
            return Err(CodeforcesError::ApiError(comment));
        }

        let envelope: ApiResponse<Vec<Submission>> =
            serde_json::from_value(body).map_err(|e| CodeforcesError::Deserialize {
                context: format!("user.status(handle={handle})"),
                source: e,
            })?;

        Ok(topics::topic_breakdown(&envelope.result))
    }

    /// Checks whether `token` appears in the profile's free-text fields
    /// (first name, last name, organization).
    ///
    /// Used for handle-ownership verification: the user temporarily puts a
    /// server-issued token into one of those fields. Returns `false` when
    /// the handle does not exist.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CodeforcesClient::fetch_profile`].
    pub async fn verify_ownership_token(
        &self,
        handle: &str,
        token: &str,
    ) -> Result<bool, CodeforcesError> {
        let url = self.build_url("user.info", &[("handles", handle)]);
        let body = self.request_json(&url).await?;
        if let Some(comment) = Self::failure_comment(&body) {
            if is_handle_not_found(&comment) {
                return Ok(false);
            }
            return Err(CodeforcesError::ApiError(comment));
        }

        let envelope: ApiResponse<Vec<UserInfo>> =
            serde_json::from_value(body).map_err(|e| CodeforcesError::Deserialize {
                context: format!("user.info(handles={handle})"),
                source: e,
            })?;

        let Some(user) = envelope.result.first() else {
            return Ok(false);
        };
        let token_present = [&user.first_name, &user.last_name, &user.organization]
            .into_iter()
            .flatten()
            .any(|field| field.contains(token));
        Ok(token_present)
    }

    /// Builds the full request URL: base, endpoint name as a path segment,
    /// percent-encoded query parameters.
    fn build_url(&self, op: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .expect("base URL validated as a base at construction");
            segments.pop_if_empty().push(op);
        }
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Sends a GET request with retry and parses the response body as JSON.
    ///
    /// Codeforces pairs `"status": "FAILED"` envelopes with a 4xx HTTP
    /// status, so a parseable JSON body always wins over the status code;
    /// the status error is only surfaced when there is no envelope to
    /// interpret (5xx maintenance pages, truncated bodies).
    ///
    /// # Errors
    ///
    /// Returns [`CodeforcesError::Http`] on network failure or a non-2xx
    /// status without a JSON body, after retries are exhausted. Returns
    /// [`CodeforcesError::Deserialize`] if a 2xx body is not valid JSON.
    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, CodeforcesError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async {
            let response = self.client.get(url.clone()).send().await?;
            let status_error = response.error_for_status_ref().err();
            let body = response.text().await?;
            match serde_json::from_str(&body) {
                Ok(value) => Ok(value),
                Err(e) => {
                    if let Some(status_error) = status_error {
                        return Err(CodeforcesError::Http(status_error));
                    }
                    Err(CodeforcesError::Deserialize {
                        context: url.to_string(),
                        source: e,
                    })
                }
            }
        })
        .await
    }

    /// Returns the failure comment if the envelope reports anything other
    /// than `"status": "OK"`.
    fn failure_comment(body: &serde_json::Value) -> Option<String> {
        if body.get("status").and_then(serde_json::Value::as_str) == Some("OK") {
            return None;
        }
        Some(
            body.get("comment")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_owned(),
        )
    }
}

/// Matches the comment Codeforces attaches when a queried handle is unknown,
/// e.g. `handles: User with handle tourist_ not found`.
fn is_handle_not_found(comment: &str) -> bool {
    comment.contains("not found")
}

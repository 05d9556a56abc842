//! HTTP client for the LeetCode GraphQL API.
//!
//! All queries POST to a single endpoint. LeetCode has no public
//! rating-history endpoint, so this adapter only reports current state;
//! history for LeetCode accounts accrues snapshot by snapshot.

use std::collections::BTreeMap;
use std::time::Duration;

use cptrack_core::profile::PlatformProfile;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::LeetcodeError;
use crate::normalize;
use crate::types::{ContestRankingData, GraphqlResponse, MatchedUserData};

const DEFAULT_ENDPOINT: &str = "https://leetcode.com/graphql/";

const PROFILE_QUERY: &str = "\
query userPublicProfile($username: String!) {
  matchedUser(username: $username) {
    username
    profile { aboutMe ranking }
    submitStatsGlobal { acSubmissionNum { difficulty count } }
    tagProblemCounts {
      advanced { tagName problemsSolved }
      intermediate { tagName problemsSolved }
      fundamental { tagName problemsSolved }
    }
  }
}";

const CONTEST_RANKING_QUERY: &str = "\
query userContestRanking($username: String!) {
  userContestRanking(username: $username) {
    rating
    attendedContestsCount
    globalRanking
  }
}";

/// Client for the LeetCode GraphQL API.
///
/// Use [`LeetcodeClient::new`] for production or
/// [`LeetcodeClient::with_endpoint`] to point at a mock server in tests.
pub struct LeetcodeClient {
    client: Client,
    endpoint: Url,
}

impl LeetcodeClient {
    /// Creates a new client pointed at the production LeetCode endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LeetcodeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, LeetcodeError> {
        Self::with_endpoint(timeout_secs, user_agent, DEFAULT_ENDPOINT)
    }

    /// Creates a new client with a custom GraphQL endpoint (for testing with
    /// wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`LeetcodeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`LeetcodeError::ApiError`] if `endpoint`
    /// is not a valid URL.
    pub fn with_endpoint(
        timeout_secs: u64,
        user_agent: &str,
        endpoint: &str,
    ) -> Result<Self, LeetcodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let endpoint = Url::parse(endpoint)
            .map_err(|e| LeetcodeError::ApiError(format!("invalid endpoint '{endpoint}': {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Fetches a user's public profile and contest rating.
    ///
    /// Returns `Ok(None)` when the username does not exist. Accounts without
    /// contest history come back with `rating: None` but full solve counts.
    ///
    /// # Errors
    ///
    /// - [`LeetcodeError::ApiError`] if the GraphQL response carries an
    ///   error other than an unknown user.
    /// - [`LeetcodeError::Http`] on network failure or non-2xx HTTP status.
    /// - [`LeetcodeError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn fetch_profile(
        &self,
        username: &str,
    ) -> Result<Option<PlatformProfile>, LeetcodeError> {
        let Some(data) = self
            .post_query::<MatchedUserData>(PROFILE_QUERY, username, "matchedUser")
            .await?
        else {
            return Ok(None);
        };
        let Some(user) = data.matched_user else {
            return Ok(None);
        };

        let ranking = self
            .post_query::<ContestRankingData>(CONTEST_RANKING_QUERY, username, "userContestRanking")
            .await?
            .and_then(|d| d.user_contest_ranking);

        Ok(Some(normalize::profile_from_parts(&user, ranking.as_ref())))
    }

    /// Fetches the tag → solved-count breakdown for a user.
    ///
    /// LeetCode buckets tags into three tiers; the result flattens them into
    /// one map. Returns an empty map when the username does not exist.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`LeetcodeClient::fetch_profile`].
    pub async fn fetch_topic_breakdown(
        &self,
        username: &str,
    ) -> Result<BTreeMap<String, i64>, LeetcodeError> {
        let matched = self
            .post_query::<MatchedUserData>(PROFILE_QUERY, username, "matchedUser")
            .await?
            .and_then(|d| d.matched_user);
        Ok(matched
            .and_then(|u| u.tag_problem_counts)
            .map(|tags| normalize::merge_topic_buckets(&tags))
            .unwrap_or_default())
    }

    /// Checks whether `token` appears in the profile's "about me" text.
    ///
    /// Used for handle-ownership verification. Returns `false` when the
    /// username does not exist or the profile has no about text.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`LeetcodeClient::fetch_profile`].
    pub async fn verify_ownership_token(
        &self,
        username: &str,
        token: &str,
    ) -> Result<bool, LeetcodeError> {
        let matched = self
            .post_query::<MatchedUserData>(PROFILE_QUERY, username, "matchedUser")
            .await?
            .and_then(|d| d.matched_user);
        Ok(matched
            .and_then(|u| u.profile)
            .and_then(|p| p.about_me)
            .is_some_and(|about| about.contains(token)))
    }

    /// POSTs one GraphQL query and unwraps the envelope.
    ///
    /// Returns `Ok(None)` when the response reports an unknown user, either
    /// through the `errors` array or a null `data`.
    async fn post_query<T: DeserializeOwned + Default>(
        &self,
        query: &str,
        username: &str,
        context: &str,
    ) -> Result<Option<T>, LeetcodeError> {
        let payload = serde_json::json!({
            "query": query,
            "variables": { "username": username },
        });
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        let envelope: GraphqlResponse<T> =
            serde_json::from_str(&body).map_err(|e| LeetcodeError::Deserialize {
                context: format!("{context}(username={username})"),
                source: e,
            })?;

        if let Some(error) = envelope.errors.first() {
            if is_user_not_found(&error.message) {
                return Ok(None);
            }
            return Err(LeetcodeError::ApiError(error.message.clone()));
        }
        Ok(envelope.data)
    }
}

/// Matches the error message LeetCode returns for unknown usernames,
/// `That user does not exist.`.
fn is_user_not_found(message: &str) -> bool {
    message.contains("does not exist")
}

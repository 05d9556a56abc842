//! Enum dispatch over the per-platform API clients.
//!
//! The clients fold "handle does not exist" into their return types
//! (`None`, empty, `false`); anything surfacing here as `Err` is a real
//! upstream failure such as a network error, a 5xx, or a malformed body.
//! Callers absorb those errors for enrichment reads and surface them only
//! where the platform's confirmation is load-bearing.

use std::collections::BTreeMap;

use cptrack_codeforces::{CodeforcesClient, CodeforcesError};
use cptrack_core::series::RatingPoint;
use cptrack_core::{AppConfig, Platform, PlatformProfile};
use cptrack_leetcode::{LeetcodeClient, LeetcodeError};

/// One client per supported platform, built once at startup and shared.
pub struct PlatformAdapters {
    codeforces: CodeforcesClient,
    leetcode: LeetcodeClient,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Codeforces(#[from] CodeforcesError),
    #[error(transparent)]
    Leetcode(#[from] LeetcodeError),
}

impl PlatformAdapters {
    /// Builds both platform clients from the application config.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if an underlying HTTP client cannot be
    /// constructed or a configured base URL is invalid.
    pub fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        let codeforces = CodeforcesClient::with_base_url(
            config.platform_request_timeout_secs,
            &config.platform_user_agent,
            &config.codeforces_base_url,
        )?
        .retry_policy(
            config.codeforces_max_retries,
            config.codeforces_retry_backoff_base_ms,
        );
        let leetcode = LeetcodeClient::with_endpoint(
            config.platform_request_timeout_secs,
            &config.platform_user_agent,
            &config.leetcode_base_url,
        )?;
        Ok(Self {
            codeforces,
            leetcode,
        })
    }

    /// Wraps prebuilt clients; used by tests to point at a mock server.
    #[must_use]
    pub fn from_parts(codeforces: CodeforcesClient, leetcode: LeetcodeClient) -> Self {
        Self {
            codeforces,
            leetcode,
        }
    }

    /// Fetches the current public profile. `Ok(None)` means the platform
    /// reports no such handle.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on upstream failure.
    pub async fn fetch_profile(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<Option<PlatformProfile>, AdapterError> {
        match platform {
            Platform::Codeforces => Ok(self.codeforces.fetch_profile(handle).await?),
            Platform::Leetcode => Ok(self.leetcode.fetch_profile(handle).await?),
        }
    }

    /// Full rating-change history, oldest first.
    ///
    /// LeetCode exposes no history endpoint, so its history is always empty
    /// and accrues snapshot by snapshot instead.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on upstream failure.
    pub async fn fetch_rating_history(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<Vec<RatingPoint>, AdapterError> {
        match platform {
            Platform::Codeforces => Ok(self.codeforces.fetch_rating_history(handle).await?),
            Platform::Leetcode => Ok(Vec::new()),
        }
    }

    /// Topic name to solved-count map; empty when the handle is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on upstream failure.
    pub async fn fetch_topic_breakdown(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<BTreeMap<String, i64>, AdapterError> {
        match platform {
            Platform::Codeforces => Ok(self.codeforces.fetch_topic_breakdown(handle).await?),
            Platform::Leetcode => Ok(self.leetcode.fetch_topic_breakdown(handle).await?),
        }
    }

    /// Whether `token` appears in the profile's free-text fields.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on upstream failure.
    pub async fn verify_ownership_token(
        &self,
        platform: Platform,
        handle: &str,
        token: &str,
    ) -> Result<bool, AdapterError> {
        match platform {
            Platform::Codeforces => {
                Ok(self.codeforces.verify_ownership_token(handle, token).await?)
            }
            Platform::Leetcode => Ok(self.leetcode.verify_ownership_token(handle, token).await?),
        }
    }
}

use thiserror::Error;

/// Errors returned by the Codeforces API client.
#[derive(Debug, Error)]
pub enum CodeforcesError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Codeforces API returned `"status": "FAILED"` with a comment.
    #[error("Codeforces API error: {0}")]
    ApiError(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

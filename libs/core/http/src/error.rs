use thiserror::Error;

/// Errors surfaced by [`crate::RateLimitedHttpClient`].
#[derive(Error, Debug)]
pub enum HttpError {
    /// Transport-level failure that survived every retry attempt.
    #[error("request to '{url}' failed after {attempts} attempts: {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Server kept answering 5xx until retries were exhausted.
    #[error("request to '{url}' exhausted {attempts} attempts, last status {status}")]
    ServerExhausted {
        url: String,
        attempts: u32,
        status: u16,
    },

    /// Client-side (4xx) response. Never retried.
    #[error("HTTP status {status} from '{url}': {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body was not the JSON we expected.
    #[error("failed to decode response from '{url}': {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The underlying reqwest client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl HttpError {
    /// Whether this error may resolve on a later redelivery of the work
    /// that triggered it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::ServerExhausted { .. }
        )
    }
}

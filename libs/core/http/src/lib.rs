//! Rate-limited JSON HTTP client shared by the vault clients.
//!
//! A fixed-window limiter caps the number of requests per period, and every
//! request is retried with exponential backoff on transport errors and
//! server-side (5xx) failures. Client-side (4xx) failures are surfaced
//! immediately as typed errors.

mod client;
mod error;

pub use client::RateLimitedHttpClient;
pub use error::HttpError;

/// Result type alias for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

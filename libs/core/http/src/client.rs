//! The rate-limited client itself.

use crate::error::HttpError;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default number of calls allowed per window.
pub const DEFAULT_MAX_CALLS: u32 = 100;
/// Default window length.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Fixed-window rate limiter state, guarded by one mutex so that the
/// read-modify-write and the saturation sleep serialize waiters fairly.
struct Window {
    call_count: u32,
    last_reset: Instant,
}

/// JSON HTTP client with a fixed-window rate limit and retry with
/// exponential backoff.
///
/// # Example
///
/// ```rust,ignore
/// let client = RateLimitedHttpClient::new("http://config-vault:8000", 100, Duration::from_secs(60))?;
/// let body = client.request(Method::GET, "/config", None, None).await?;
/// ```
pub struct RateLimitedHttpClient {
    base_url: String,
    http: reqwest::Client,
    max_calls: u32,
    period: Duration,
    max_attempts: u32,
    window: Mutex<Window>,
}

impl RateLimitedHttpClient {
    /// Create a new client for `base_url`, allowing `max_calls` requests
    /// per `period`.
    pub fn new(
        base_url: impl Into<String>,
        max_calls: u32,
        period: Duration,
    ) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(HttpError::Build)?;

        Ok(Self {
            base_url: base_url.into(),
            http,
            max_calls,
            period,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: Mutex::new(Window {
                call_count: 0,
                last_reset: Instant::now(),
            }),
        })
    }

    /// Create a client with the default 100 calls / 60 s limit.
    pub fn with_defaults(base_url: impl Into<String>) -> Result<Self, HttpError> {
        Self::new(base_url, DEFAULT_MAX_CALLS, DEFAULT_PERIOD)
    }

    /// Override the number of attempts per request.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Block until the current window has room for one more call.
    ///
    /// The saturation sleep happens while holding the window lock: callers
    /// queue on the mutex and drain in FIFO order once the window resets.
    async fn acquire(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(window.last_reset);
        if elapsed >= self.period {
            window.last_reset = now;
            window.call_count = 0;
        }
        window.call_count += 1;
        if window.call_count > self.max_calls {
            let wake_at = window.last_reset + self.period;
            debug!(
                max_calls = self.max_calls,
                period_secs = self.period.as_secs(),
                "Rate limit window saturated, waiting for reset"
            );
            tokio::time::sleep_until(wake_at).await;
            window.last_reset = Instant::now();
            window.call_count = 1;
        }
    }

    /// Perform a JSON request against `path`.
    ///
    /// Returns `Ok(None)` for `204 No Content`, `Ok(Some(body))` for any
    /// other success. Transport errors and 5xx responses are retried up to
    /// the attempt limit with `2^attempt` seconds of backoff; 4xx responses
    /// fail immediately.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<Option<Value>, HttpError> {
        let url = format!("{}{}", self.base_url, path);
        self.acquire().await;

        let mut last_server_status = 0;
        for attempt in 0..self.max_attempts {
            debug!(%url, %method, attempt, "Making request");

            let mut request = self.http.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(query) = query {
                request = request.query(query);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NO_CONTENT {
                        return Ok(None);
                    }
                    if status.is_success() {
                        let parsed = response
                            .json::<Value>()
                            .await
                            .map_err(|source| HttpError::Decode {
                                url: url.clone(),
                                source,
                            })?;
                        return Ok(Some(parsed));
                    }
                    if status.is_client_error() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(HttpError::Status {
                            url,
                            status: status.as_u16(),
                            body,
                        });
                    }
                    // 5xx: server-side trouble, worth retrying
                    last_server_status = status.as_u16();
                    warn!(
                        %url,
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        "Server error, retrying"
                    );
                }
                Err(source) => {
                    warn!(
                        %url,
                        error = %source,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        "Request failed, retrying"
                    );
                    if attempt + 1 == self.max_attempts {
                        return Err(HttpError::Transport {
                            url,
                            attempts: self.max_attempts,
                            source,
                        });
                    }
                }
            }

            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }

        Err(HttpError::ServerExhausted {
            url,
            attempts: self.max_attempts,
            status: last_server_status,
        })
    }
}

//! Rate-limited HTTP client with bounded retry
//!
//! Every outbound call to an upstream service goes through
//! [`RateLimitedClient::fetch`]:
//! - acquires a permit from the service's [`RateLimiter`] before each attempt
//! - retries transport failures, 5xx and 429 responses with exponential
//!   backoff (`base_delay * 2^attempt`, capped at `max_delay`)
//! - a 429 `Retry-After` hint replaces the computed backoff
//! - other 4xx responses are permanent and surface immediately
//!
//! No caching happens at this layer.

use crate::services::rate_limiter::RateLimiter;
use chrono::{DateTime, Utc};
use pharmvar_common::config::RetryConfig;
use pharmvar_common::Result;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("PharmVar-Ingest/", env!("CARGO_PKG_VERSION"));

/// Upstream call failure, after internal retries were exhausted
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Connection, timeout or body-read failure (retryable)
    #[error("{service} transport error: {message}")]
    Transport { service: String, message: String },

    /// Non-2xx response; retryable only for 5xx and 429
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        retryable: bool,
        body: String,
    },

    /// 2xx response whose body could not be decoded
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: String, message: String },
}

impl UpstreamError {
    /// HTTP status, when the upstream answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport { .. } => true,
            UpstreamError::Status { retryable, .. } => *retryable,
            UpstreamError::Decode { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn service(&self) -> &str {
        match self {
            UpstreamError::Transport { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. } => service,
        }
    }
}

/// Successful upstream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Retry/backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Parse a `Retry-After` value: delay-seconds or an HTTP-date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    // A date in the past means "retry now"
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

/// Failed attempt plus the server's requested delay (429 only)
struct AttemptFailure {
    error: UpstreamError,
    retry_after: Option<Duration>,
}

/// HTTP client bound to one upstream service
pub struct RateLimitedClient {
    service: String,
    base_url: String,
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl RateLimitedClient {
    /// Create client for `service` rooted at `base_url`
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        requests_per_second: f64,
        retry: &RetryConfig,
    ) -> Result<Self> {
        let service = service.into();

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(retry.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                pharmvar_common::Error::Config(format!("{}: HTTP client build failed: {}", service, e))
            })?;

        let rate_limiter = RateLimiter::new(service.clone(), requests_per_second)?;

        Ok(Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            rate_limiter,
            retry: RetryPolicy::from_config(retry),
        })
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// GET `endpoint` with query `params`
    ///
    /// Retryable failures are retried internally; the returned error is the
    /// last one observed.
    pub async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<RawResponse, UpstreamError> {
        let url = self.build_url(endpoint);
        let mut attempt: u32 = 0;

        loop {
            self.rate_limiter.acquire().await;

            tracing::debug!(
                service = %self.service,
                url = %url,
                attempt = attempt + 1,
                "Querying upstream"
            );

            let failure = match self.attempt(&url, params).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            attempt += 1;

            if !failure.error.is_retryable() {
                return Err(failure.error);
            }

            if attempt >= self.retry.max_attempts {
                tracing::warn!(
                    service = %self.service,
                    url = %url,
                    attempts = attempt,
                    error = %failure.error,
                    "Upstream retries exhausted"
                );
                return Err(failure.error);
            }

            let delay = failure
                .retry_after
                .unwrap_or_else(|| self.retry.backoff(attempt - 1));

            tracing::warn!(
                service = %self.service,
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure.error,
                "Upstream call failed, retrying after backoff"
            );

            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<RawResponse, AttemptFailure> {
        let response = self
            .http_client
            .get(url)
            .query(params)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AttemptFailure {
                error: self.transport_error(e),
                retry_after: None,
            })?;

        let status = response.status();

        if status.is_success() {
            let body = response.text().await.map_err(|e| AttemptFailure {
                error: self.transport_error(e),
                retry_after: None,
            })?;
            return Ok(RawResponse::new(url, status.as_u16(), body));
        }

        let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
            retry_after_header(response.headers())
        } else {
            None
        };
        let body = response.text().await.unwrap_or_default();

        Err(AttemptFailure {
            error: UpstreamError::Status {
                service: self.service.clone(),
                status: status.as_u16(),
                retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
                body,
            },
            retry_after,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> UpstreamError {
        UpstreamError::Transport {
            service: self.service.clone(),
            message: e.to_string(),
        }
    }
}

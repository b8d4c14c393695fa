//! Upstream rate limiter
//!
//! GCRA limiter from `governor` with a burst of one: permits are spaced at
//! `1 / requests_per_second`, so no one-second window sees more calls than
//! the configured ceiling. State is a single atomic, so concurrent fetch
//! tasks can acquire from the same limiter without a lock.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use pharmvar_common::{Error, Result};
use std::num::NonZeroU32;
use std::time::Duration;

/// Requests-per-second ceiling for one upstream service
pub struct RateLimiter {
    service: String,
    limiter: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimiter {
    /// Create limiter for `service` allowing `requests_per_second`
    pub fn new(service: impl Into<String>, requests_per_second: f64) -> Result<Self> {
        let service = service.into();

        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(Error::Config(format!(
                "{}: requests_per_second must be a positive number (got {})",
                service, requests_per_second
            )));
        }

        let period = Duration::from_secs_f64(1.0 / requests_per_second);
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                Error::Config(format!(
                    "{}: requests_per_second {} is too high",
                    service, requests_per_second
                ))
            })?
            .allow_burst(NonZeroU32::MIN);

        Ok(Self {
            service,
            limiter: GovernorLimiter::direct(quota),
        })
    }

    /// Wait until a permit is available
    pub async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        tracing::debug!(service = %self.service, "Rate limiting: waiting for permit");
        self.limiter.until_ready().await;
    }
}

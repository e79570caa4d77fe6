//! Rate limiter configuration and builder (C7).

use std::time::Duration;

use crate::error::ConfigurationError;

/// Immutable rate limiter configuration. Build via [`RateLimiterConfig::builder`].
///
/// Shared by both [`super::atomic::AtomicRateLimiter`] and
/// [`super::semaphore::SemaphoreBasedRateLimiter`] — the two cores only
/// differ in how they account permits against the same three knobs.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub(crate) timeout_duration: Duration,
    pub(crate) limit_refresh_period: Duration,
    pub(crate) limit_for_period: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("documented defaults always validate")
    }
}

impl RateLimiterConfig {
    /// Start building a config from the documented defaults (timeout 5s,
    /// refresh period 500ns, 50 permits per period).
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// How long a caller waits for a permit before giving up.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }

    /// Length of one permit-refresh cycle.
    pub fn limit_refresh_period(&self) -> Duration {
        self.limit_refresh_period
    }

    /// Permits issued per cycle.
    pub fn limit_for_period(&self) -> u32 {
        self.limit_for_period
    }
}

/// Builder for [`RateLimiterConfig`], validated at [`build`](Self::build).
pub struct RateLimiterConfigBuilder {
    timeout_duration: Duration,
    limit_refresh_period: Duration,
    limit_for_period: u32,
}

impl RateLimiterConfigBuilder {
    fn new() -> Self {
        Self {
            timeout_duration: Duration::from_secs(5),
            limit_refresh_period: Duration::from_nanos(500),
            limit_for_period: 50,
        }
    }

    /// How long a caller waits for a permit (`>= 0`, any `Duration` qualifies).
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Cycle length (`> 0`).
    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }

    /// Permits issued per cycle (`>= 1`).
    pub fn limit_for_period(mut self, limit: u32) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<RateLimiterConfig, ConfigurationError> {
        if self.limit_refresh_period.is_zero() {
            return Err(ConfigurationError::new(
                "limit_refresh_period",
                "must be > 0",
            ));
        }
        if self.limit_for_period < 1 {
            return Err(ConfigurationError::new(
                "limit_for_period",
                "must be >= 1",
            ));
        }

        Ok(RateLimiterConfig {
            timeout_duration: self.timeout_duration,
            limit_refresh_period: self.limit_refresh_period,
            limit_for_period: self.limit_for_period,
        })
    }
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

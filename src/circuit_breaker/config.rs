//! Circuit breaker configuration and builder (C7).

use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigurationError;

/// A predicate deciding whether an observed error counts toward the failure
/// rate (`true`) or is rethrown unrecorded (`false`).
pub type RecordFailurePredicate =
    Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Immutable circuit breaker configuration. Build via [`CircuitBreakerConfig::builder`].
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) ring_buffer_size_in_closed_state: usize,
    pub(crate) ring_buffer_size_in_half_open_state: usize,
    pub(crate) wait_duration_in_open_state: Duration,
    pub(crate) record_failure_predicate: RecordFailurePredicate,
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field(
                "ring_buffer_size_in_closed_state",
                &self.ring_buffer_size_in_closed_state,
            )
            .field(
                "ring_buffer_size_in_half_open_state",
                &self.ring_buffer_size_in_half_open_state,
            )
            .field(
                "wait_duration_in_open_state",
                &self.wait_duration_in_open_state,
            )
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("documented defaults always validate")
    }
}

impl CircuitBreakerConfig {
    /// Start building a config from the documented defaults (threshold 50%,
    /// closed buffer 100, half-open buffer 10, wait 60s, record every error).
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn failure_rate_threshold(&self) -> f64 {
        self.failure_rate_threshold
    }

    pub fn ring_buffer_size_in_closed_state(&self) -> usize {
        self.ring_buffer_size_in_closed_state
    }

    pub fn ring_buffer_size_in_half_open_state(&self) -> usize {
        self.ring_buffer_size_in_half_open_state
    }

    pub fn wait_duration_in_open_state(&self) -> Duration {
        self.wait_duration_in_open_state
    }

    /// Evaluate the record-failure predicate against an observed error.
    pub fn should_record(&self, error: &(dyn std::error::Error + 'static)) -> bool {
        (self.record_failure_predicate)(error)
    }
}

/// Builder for [`CircuitBreakerConfig`], validated at [`build`](Self::build).
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f64,
    ring_buffer_size_in_closed_state: usize,
    ring_buffer_size_in_half_open_state: usize,
    wait_duration_in_open_state: Duration,
    record_failure_predicate: RecordFailurePredicate,
}

impl CircuitBreakerConfigBuilder {
    fn new() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            ring_buffer_size_in_closed_state: 100,
            ring_buffer_size_in_half_open_state: 10,
            wait_duration_in_open_state: Duration::from_secs(60),
            record_failure_predicate: Arc::new(|_| true),
        }
    }

    /// Percentage of failures (`(0, 100]`) at or above which the breaker
    /// trips from CLOSED/HALF_OPEN to OPEN.
    pub fn failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    /// Ring buffer size while CLOSED (`>= 1`).
    pub fn ring_buffer_size_in_closed_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_closed_state = size;
        self
    }

    /// Ring buffer size while HALF_OPEN (`>= 1`).
    pub fn ring_buffer_size_in_half_open_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_half_open_state = size;
        self
    }

    /// How long the breaker stays OPEN before becoming eligible for HALF_OPEN.
    pub fn wait_duration_in_open_state(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open_state = duration;
        self
    }

    /// Predicate deciding whether an error counts toward the failure rate.
    pub fn record_failure_predicate(
        mut self,
        predicate: impl Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.record_failure_predicate = Arc::new(predicate);
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigurationError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(ConfigurationError::new(
                "failure_rate_threshold",
                format!(
                    "must be in (0, 100], got {}",
                    self.failure_rate_threshold
                ),
            ));
        }
        if self.ring_buffer_size_in_closed_state < 1 {
            return Err(ConfigurationError::new(
                "ring_buffer_size_in_closed_state",
                "must be >= 1",
            ));
        }
        if self.ring_buffer_size_in_half_open_state < 1 {
            return Err(ConfigurationError::new(
                "ring_buffer_size_in_half_open_state",
                "must be >= 1",
            ));
        }

        Ok(CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            ring_buffer_size_in_closed_state: self.ring_buffer_size_in_closed_state,
            ring_buffer_size_in_half_open_state: self.ring_buffer_size_in_half_open_state,
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            record_failure_predicate: self.record_failure_predicate,
        })
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_rate_threshold(), 50.0);
        assert_eq!(config.ring_buffer_size_in_closed_state(), 100);
        assert_eq!(config.ring_buffer_size_in_half_open_state(), 10);
        assert_eq!(config.wait_duration_in_open_state(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(CircuitBreakerConfig::builder()
            .failure_rate_threshold(0.0)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder()
            .failure_rate_threshold(100.1)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder()
            .failure_rate_threshold(-5.0)
            .build()
            .is_err());
    }

    #[test]
    fn rejects_zero_sized_buffers() {
        assert!(CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(0)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder()
            .ring_buffer_size_in_half_open_state(0)
            .build()
            .is_err());
    }

    #[test]
    fn custom_predicate_is_applied() {
        #[derive(Debug)]
        struct MarkerError;
        impl std::fmt::Display for MarkerError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "marker")
            }
        }
        impl std::error::Error for MarkerError {}

        let config = CircuitBreakerConfig::builder()
            .record_failure_predicate(|_| false)
            .build()
            .unwrap();

        assert!(!config.should_record(&MarkerError));
    }

    #[test]
    fn round_trip_builder() {
        let config = CircuitBreakerConfig::builder()
            .failure_rate_threshold(75.0)
            .ring_buffer_size_in_closed_state(20)
            .ring_buffer_size_in_half_open_state(4)
            .wait_duration_in_open_state(Duration::from_millis(250))
            .build()
            .unwrap();

        assert_eq!(config.failure_rate_threshold(), 75.0);
        assert_eq!(config.ring_buffer_size_in_closed_state(), 20);
        assert_eq!(config.ring_buffer_size_in_half_open_state(), 4);
        assert_eq!(config.wait_duration_in_open_state(), Duration::from_millis(250));
    }
}

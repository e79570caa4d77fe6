//! Circuit breaker: ring-bit-buffer failure statistic + CLOSED/OPEN/HALF_OPEN
//! state machine. See spec §4.

mod breaker;
mod config;
mod metrics;
mod state;

pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, RecordFailurePredicate};
pub use metrics::{CircuitBreakerLifetimeStats, CircuitBreakerMetrics};
pub use state::CircuitBreakerState;

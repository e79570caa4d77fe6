//! Fault-tolerance primitives: a Circuit Breaker guarded by a sliding-window
//! ring-bit-buffer failure statistic, and a Rate Limiter capping permit
//! issuance over time cycles (two interchangeable implementations). Both
//! publish observable events and are meant to be composed as decorators
//! around arbitrary user computations.
//!
//! ```
//! use circuitry::circuit_breaker::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::with_default_config("payments-api").unwrap();
//! assert!(breaker.is_call_permitted());
//! breaker.on_success();
//! ```

pub mod circuit_breaker;
mod decorator;
mod error;
mod event;
mod name;
pub mod rate_limiter;
mod registry;
mod ring_buffer;

pub use decorator::{
    decorate_fn, decorate_result, decorate_with_rate_limiter, decorate_with_rate_limiter_timeout,
};
pub use error::{
    CircuitBreakerOpenError, ConfigurationError, NullNameError, RequestNotPermittedError,
};
pub use event::{Event, EventStream, EventStreamHandle};
pub use name::Name;
pub use registry::{CircuitBreakerRegistry, RateLimiterRegistry};
pub use ring_buffer::{RingBitBuffer, RingBitBufferSnapshot};

/// Common imports for composing circuit breakers and rate limiters together.
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState};
    pub use crate::rate_limiter::{AtomicRateLimiter, RateLimiterConfig, SemaphoreBasedRateLimiter};
    pub use crate::{
        decorate_fn, decorate_result, decorate_with_rate_limiter, CircuitBreakerOpenError,
        Event, RequestNotPermittedError,
    };
}

//! Internal circuit breaker state representation.

use std::sync::Arc;
use std::time::Instant;

use crate::ring_buffer::{RingBitBuffer, RingBitBufferSnapshot};

/// Public, buffer-free projection of the breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Internal state: exactly one ring buffer (or open-state deadline) is alive
/// at a time, matching spec §3's "only one of the two buffers is alive".
pub(crate) enum RawState {
    Closed(Arc<RingBitBuffer>),
    /// `frozen` is the buffer snapshot at the moment the trip occurred, kept
    /// around purely so [`super::breaker::CircuitBreaker::metrics`] has
    /// something meaningful to report while OPEN holds no live buffer.
    Open {
        retry_at: Instant,
        frozen: RingBitBufferSnapshot,
    },
    HalfOpen(Arc<RingBitBuffer>),
}

impl RawState {
    pub(crate) fn public(&self) -> CircuitBreakerState {
        match self {
            RawState::Closed(_) => CircuitBreakerState::Closed,
            RawState::Open { .. } => CircuitBreakerState::Open,
            RawState::HalfOpen(_) => CircuitBreakerState::HalfOpen,
        }
    }
}

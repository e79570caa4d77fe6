//! Read-only projection of the ring buffer + state (C3).

use crate::ring_buffer::RingBitBufferSnapshot;

/// A point-in-time view of the circuit breaker's *currently active* buffer.
/// A state transition atomically swaps which buffer is visible here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerMetrics {
    /// `-1.0` if the active buffer is not yet full.
    pub failure_rate: f64,
    /// Number of calls recorded in the active buffer (`== recorded`).
    pub number_of_buffered_calls: usize,
    pub number_of_failed_calls: usize,
    pub number_of_successful_calls: usize,
    /// Capacity (`N`) of the active buffer.
    pub max_number_of_buffered_calls: usize,
}

impl From<RingBitBufferSnapshot> for CircuitBreakerMetrics {
    fn from(snapshot: RingBitBufferSnapshot) -> Self {
        Self {
            failure_rate: snapshot.failure_rate,
            number_of_buffered_calls: snapshot.number_of_recorded_calls,
            number_of_failed_calls: snapshot.number_of_failed_calls,
            number_of_successful_calls: snapshot.number_of_successful_calls,
            max_number_of_buffered_calls: snapshot.capacity,
        }
    }
}

/// Lifetime request counters, additive to the windowed [`CircuitBreakerMetrics`]
/// — carried over from the teacher's habit of tracking both a windowed
/// statistic and monotonic lifetime totals side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CircuitBreakerLifetimeStats {
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_ignored_errors: u64,
    pub total_not_permitted: u64,
}

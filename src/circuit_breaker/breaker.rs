//! Circuit breaker state machine (C2).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use super::config::CircuitBreakerConfig;
use super::metrics::{CircuitBreakerLifetimeStats, CircuitBreakerMetrics};
use super::state::{CircuitBreakerState, RawState};
use crate::error::{CircuitBreakerOpenError, NullNameError};
use crate::event::{Event, EventStream, EventStreamHandle};
use crate::name::Name;
use crate::ring_buffer::{RingBitBuffer, RingBitBufferSnapshot};

/// A circuit breaker guarding calls to a single backend.
///
/// All operations complete synchronously without blocking on external
/// resources (spec §5): the only lock held is `state`, and only briefly.
/// Intended usage is behind the `Arc` the constructors already return — a
/// breaker is shared across every call site that protects the same backend.
pub struct CircuitBreaker {
    name: Name,
    config: Arc<CircuitBreakerConfig>,
    state: RwLock<RawState>,
    events: EventStream,
    total_calls: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_ignored_errors: AtomicU64,
    total_not_permitted: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker, starting CLOSED.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<Self>, NullNameError> {
        let name = Name::new(name)?;
        let config = Arc::new(config);
        info!(
            name = %name,
            threshold = config.failure_rate_threshold(),
            wait = ?config.wait_duration_in_open_state(),
            "circuit breaker initialized"
        );
        let buffer = Arc::new(RingBitBuffer::new(config.ring_buffer_size_in_closed_state()));
        Ok(Arc::new(Self {
            name,
            config,
            state: RwLock::new(RawState::Closed(buffer)),
            events: EventStream::new(),
            total_calls: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_ignored_errors: AtomicU64::new(0),
            total_not_permitted: AtomicU64::new(0),
        }))
    }

    /// Create a new circuit breaker using the documented default config.
    pub fn with_default_config(name: impl Into<String>) -> Result<Arc<Self>, NullNameError> {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> CircuitBreakerState {
        self.state.read().public()
    }

    /// Subscribe to this breaker's event stream.
    pub fn event_stream(&self) -> EventStreamHandle {
        self.events.subscribe()
    }

    /// Lifetime request counters (additive to the windowed metrics).
    pub fn lifetime_stats(&self) -> CircuitBreakerLifetimeStats {
        CircuitBreakerLifetimeStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_ignored_errors: self.total_ignored_errors.load(Ordering::Relaxed),
            total_not_permitted: self.total_not_permitted.load(Ordering::Relaxed),
        }
    }

    /// Read-only projection of the currently active buffer (C3). While OPEN
    /// there is no live buffer; the snapshot frozen at the moment of opening
    /// is reported instead, so metrics stay meaningful across a trip.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        match &*self.state.read() {
            RawState::Closed(buf) | RawState::HalfOpen(buf) => buf.snapshot().into(),
            RawState::Open { frozen, .. } => (*frozen).into(),
        }
    }

    /// `true` iff a call may proceed right now.
    ///
    /// In OPEN, the first caller whose check lands at or after the retry
    /// deadline atomically installs a fresh HALF_OPEN buffer and is the sole
    /// emitter of the `OPEN -> HALF_OPEN` transition event; every other
    /// concurrent caller just observes the new state.
    pub fn is_call_permitted(&self) -> bool {
        {
            let guard = self.state.read();
            match &*guard {
                RawState::Closed(_) | RawState::HalfOpen(_) => return true,
                RawState::Open { retry_at, .. } => {
                    if Instant::now() < *retry_at {
                        return false;
                    }
                }
            }
        }

        let mut guard = self.state.write();
        match &*guard {
            RawState::Open { retry_at, .. } if Instant::now() >= *retry_at => {
                let from = guard.public();
                let fresh = Arc::new(RingBitBuffer::new(
                    self.config.ring_buffer_size_in_half_open_state(),
                ));
                *guard = RawState::HalfOpen(fresh);
                drop(guard);
                self.emit_transition(from, CircuitBreakerState::HalfOpen);
                true
            }
            RawState::Open { .. } => false,
            // Another thread already completed the transition; permitted either way.
            _ => true,
        }
    }

    /// Helper for decorators: `Ok(())` if permitted, else a typed error.
    pub fn call_permitted_or_err(&self) -> Result<(), CircuitBreakerOpenError> {
        if self.is_call_permitted() {
            Ok(())
        } else {
            self.total_not_permitted.fetch_add(1, Ordering::Relaxed);
            trace!(name = %self.name, "call rejected, circuit OPEN");
            Err(CircuitBreakerOpenError::new(self.name.as_str()))
        }
    }

    /// Record a successful call.
    pub fn on_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_successes.fetch_add(1, Ordering::Relaxed);

        let outcome = self.record(false);
        self.events.publish(Event::Success {
            name: self.name.as_str().to_string(),
            created_at: SystemTime::now(),
        });

        if let Some((from_state, snapshot)) = outcome {
            self.evaluate(from_state, snapshot);
        }
    }

    /// Record a failed call. Filtered through the configured predicate:
    /// a `false` verdict emits `IgnoredError` and has no effect on state.
    pub fn on_error(&self, error: &(dyn std::error::Error + 'static)) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        if !self.config.should_record(error) {
            self.total_ignored_errors.fetch_add(1, Ordering::Relaxed);
            self.events.publish(Event::IgnoredError {
                name: self.name.as_str().to_string(),
                created_at: SystemTime::now(),
                message: error.to_string(),
            });
            return;
        }

        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let outcome = self.record(true);
        self.events.publish(Event::Error {
            name: self.name.as_str().to_string(),
            created_at: SystemTime::now(),
            message: error.to_string(),
        });

        if let Some((from_state, snapshot)) = outcome {
            self.evaluate(from_state, snapshot);
        }
    }

    /// Records into whichever buffer is live right now. Returns `None` if the
    /// breaker is currently OPEN (no buffer exists to record into — the call
    /// that produced this outcome raced a transition that already dropped
    /// its buffer; the outcome is still published as an event, just not
    /// counted toward a rate).
    fn record(&self, failed: bool) -> Option<(CircuitBreakerState, RingBitBufferSnapshot)> {
        let (from_state, buffer) = {
            let guard = self.state.read();
            match &*guard {
                RawState::Closed(buf) => (CircuitBreakerState::Closed, buf.clone()),
                RawState::HalfOpen(buf) => (CircuitBreakerState::HalfOpen, buf.clone()),
                RawState::Open { .. } => {
                    debug!(name = %self.name, "outcome recorded while circuit OPEN, not counted");
                    return None;
                }
            }
        };
        buffer.record(failed);
        Some((from_state, buffer.snapshot()))
    }

    /// Apply the transition table in spec §4.2 after a record.
    fn evaluate(&self, from_state: CircuitBreakerState, snapshot: RingBitBufferSnapshot) {
        if snapshot.failure_rate < 0.0 {
            return; // not full yet; no transition regardless of observed failures
        }

        let tripped = snapshot.failure_rate >= self.config.failure_rate_threshold();
        match (from_state, tripped) {
            (CircuitBreakerState::Closed, true) => self.open(snapshot),
            (CircuitBreakerState::Closed, false) => {} // roll on
            (CircuitBreakerState::HalfOpen, true) => self.open(snapshot),
            (CircuitBreakerState::HalfOpen, false) => self.close(),
            (CircuitBreakerState::Open, _) => {}
        }
    }

    fn open(&self, frozen: RingBitBufferSnapshot) {
        let mut guard = self.state.write();
        if matches!(&*guard, RawState::Open { .. }) {
            return;
        }
        let from = guard.public();
        let retry_at = Instant::now() + self.config.wait_duration_in_open_state();
        *guard = RawState::Open { retry_at, frozen };
        drop(guard);
        self.emit_transition(from, CircuitBreakerState::Open);
    }

    fn close(&self) {
        let mut guard = self.state.write();
        if matches!(&*guard, RawState::Closed(_)) {
            return;
        }
        let from = guard.public();
        let fresh = Arc::new(RingBitBuffer::new(
            self.config.ring_buffer_size_in_closed_state(),
        ));
        *guard = RawState::Closed(fresh);
        drop(guard);
        self.emit_transition(from, CircuitBreakerState::Closed);
    }

    /// Explicit administrative override: force OPEN regardless of observed
    /// failure rate. No-op (and no event) if already OPEN.
    pub fn transition_to_open_state(&self) {
        let snapshot = self.metrics_snapshot_for_transition();
        self.open(snapshot);
    }

    /// Explicit administrative override: force CLOSED with a fresh buffer.
    /// No-op (and no event) if already CLOSED.
    pub fn transition_to_closed_state(&self) {
        self.close();
    }

    /// Explicit administrative override: force HALF_OPEN with a fresh
    /// buffer. No-op (and no event) if already HALF_OPEN.
    pub fn transition_to_half_open_state(&self) {
        let mut guard = self.state.write();
        if matches!(&*guard, RawState::HalfOpen(_)) {
            return;
        }
        let from = guard.public();
        let fresh = Arc::new(RingBitBuffer::new(
            self.config.ring_buffer_size_in_half_open_state(),
        ));
        *guard = RawState::HalfOpen(fresh);
        drop(guard);
        self.emit_transition(from, CircuitBreakerState::HalfOpen);
    }

    /// Forcibly return to CLOSED with a fresh buffer, unconditionally
    /// emitting a transition event (unlike [`Self::transition_to_closed_state`],
    /// this is not a no-op when already CLOSED — it is an explicit reset).
    pub fn reset(&self) {
        let mut guard = self.state.write();
        let from = guard.public();
        let fresh = Arc::new(RingBitBuffer::new(
            self.config.ring_buffer_size_in_closed_state(),
        ));
        *guard = RawState::Closed(fresh);
        drop(guard);
        self.emit_transition(from, CircuitBreakerState::Closed);
    }

    fn metrics_snapshot_for_transition(&self) -> RingBitBufferSnapshot {
        match &*self.state.read() {
            RawState::Closed(buf) | RawState::HalfOpen(buf) => buf.snapshot(),
            RawState::Open { frozen, .. } => *frozen,
        }
    }

    fn emit_transition(&self, from: CircuitBreakerState, to: CircuitBreakerState) {
        match to {
            CircuitBreakerState::Open => {
                warn!(name = %self.name, %from, "circuit breaker OPENED")
            }
            CircuitBreakerState::Closed => {
                info!(name = %self.name, %from, "circuit breaker CLOSED")
            }
            CircuitBreakerState::HalfOpen => {
                debug!(name = %self.name, %from, "circuit breaker transitioned to HALF_OPEN")
            }
        }
        self.events.publish(Event::StateTransition {
            name: self.name.as_str().to_string(),
            created_at: SystemTime::now(),
            from,
            to,
        });
    }
}

//! Error types shared across the crate.

use thiserror::Error;

/// Raised by a config builder when a field fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid configuration for `{field}`: {reason}")]
pub struct ConfigurationError {
    /// The offending field name.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigurationError {
    /// Build a new configuration error naming the offending field.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Raised by [`crate::circuit_breaker::CircuitBreaker::call_permitted_or_err`]
/// when the breaker is OPEN (or HALF_OPEN with no slot available).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("circuit breaker '{name}' is OPEN")]
pub struct CircuitBreakerOpenError {
    /// Name of the circuit breaker that rejected the call.
    pub name: String,
}

impl CircuitBreakerOpenError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Raised by a decorator when a rate limiter denied a call within its timeout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rate limiter '{name}' did not permit a call within the timeout")]
pub struct RequestNotPermittedError {
    /// Name of the rate limiter that denied the call.
    pub name: String,
}

impl RequestNotPermittedError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Raised by a constructor that requires a non-empty [`crate::name::Name`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
#[error("name must not be empty")]
pub struct NullNameError;

//! Thin decorators composing a core's permission check with the wrapped
//! call's outcome reporting — spec §3's "data flow" made concrete.

use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{CircuitBreakerOpenError, RequestNotPermittedError};
use crate::rate_limiter::AtomicRateLimiter;

/// Wrap a fallible computation with a circuit breaker: checks permission,
/// runs `f` if permitted, reports the outcome back to `breaker`.
///
/// `E` must be convertible from [`CircuitBreakerOpenError`] so a rejection
/// and a propagated failure share one return type.
pub fn decorate_result<T, E, F>(breaker: &CircuitBreaker, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: std::error::Error + 'static,
    E: From<CircuitBreakerOpenError>,
{
    breaker.call_permitted_or_err()?;

    match f() {
        Ok(value) => {
            breaker.on_success();
            Ok(value)
        }
        Err(error) => {
            breaker.on_error(&error);
            Err(error)
        }
    }
}

/// Same as [`decorate_result`], but for a fallible closure whose error type
/// is not `CircuitBreakerOpenError`-convertible — the rejection case is
/// reported as `Err(CircuitBreakerOpenError)` directly via an outer `Result`.
pub fn decorate_fn<T, E, F>(
    breaker: &CircuitBreaker,
    f: F,
) -> Result<Result<T, E>, CircuitBreakerOpenError>
where
    F: FnOnce() -> Result<T, E>,
    E: std::error::Error + 'static,
{
    breaker.call_permitted_or_err()?;

    Ok(match f() {
        Ok(value) => {
            breaker.on_success();
            Ok(value)
        }
        Err(error) => {
            breaker.on_error(&error);
            Err(error)
        }
    })
}

/// Wrap an async computation with rate limiting: waits up to the limiter's
/// configured timeout for a permit, then runs `f` if granted.
pub async fn decorate_with_rate_limiter<T, Fut, F>(
    limiter: &Arc<AtomicRateLimiter>,
    f: F,
) -> Result<T, RequestNotPermittedError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    decorate_with_rate_limiter_timeout(limiter, limiter.config().timeout_duration(), f).await
}

/// Same as [`decorate_with_rate_limiter`], with an explicit timeout instead
/// of the limiter's configured default.
pub async fn decorate_with_rate_limiter_timeout<T, Fut, F>(
    limiter: &Arc<AtomicRateLimiter>,
    timeout: Duration,
    f: F,
) -> Result<T, RequestNotPermittedError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    if limiter.acquire_permission_async(timeout).await {
        Ok(f().await)
    } else {
        Err(RequestNotPermittedError::new(limiter.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::rate_limiter::RateLimiterConfig;

    #[derive(Debug)]
    struct BoomError;
    impl std::fmt::Display for BoomError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }
    impl std::error::Error for BoomError {}
    impl From<CircuitBreakerOpenError> for BoomError {
        fn from(_: CircuitBreakerOpenError) -> Self {
            BoomError
        }
    }

    #[test]
    fn decorate_result_reports_success() {
        let breaker = CircuitBreaker::with_default_config("svc").unwrap();
        let result: Result<i32, BoomError> = decorate_result(&breaker, || Ok(42));
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.lifetime_stats().total_successes, 1);
    }

    #[test]
    fn decorate_result_reports_failure() {
        let breaker = CircuitBreaker::with_default_config("svc").unwrap();
        let result: Result<i32, BoomError> = decorate_result(&breaker, || Err(BoomError));
        assert!(result.is_err());
        assert_eq!(breaker.lifetime_stats().total_failures, 1);
    }

    #[test]
    fn decorate_result_short_circuits_when_open() {
        let config = CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(1)
            .build()
            .unwrap();
        let breaker = CircuitBreaker::new("svc", config).unwrap();
        let _: Result<i32, BoomError> = decorate_result(&breaker, || Err(BoomError));

        let mut calls = 0;
        let _: Result<i32, BoomError> = decorate_result(&breaker, || {
            calls += 1;
            Ok(1)
        });
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn rate_limiter_decorator_denies_past_capacity() {
        let config = RateLimiterConfig::builder()
            .limit_for_period(1)
            .limit_refresh_period(Duration::from_secs(60))
            .timeout_duration(Duration::ZERO)
            .build()
            .unwrap();
        let limiter = AtomicRateLimiter::new("svc", config).unwrap();

        let first = decorate_with_rate_limiter(&limiter, || async { 1 }).await;
        assert!(first.is_ok());

        let second = decorate_with_rate_limiter(&limiter, || async { 1 }).await;
        assert!(second.is_err());
    }
}

//! Lock-free permit accounting over time cycles (C4).
//!
//! One `ArcSwap<RateLimiterState>` cell replaces spec.md's literal "single
//! atomic reference" (the exact crate `vanyastaff/nebula` and
//! `ShabbirHasan1/sentinel` already reach for to publish copy-and-swap
//! state); [`ArcSwap::rcu`] *is* the CAS-retry loop spec.md §4.4 describes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::config::RateLimiterConfig;
use super::metrics::RateLimiterMetrics;
use crate::error::NullNameError;
use crate::event::{Event, EventStream, EventStreamHandle};
use crate::name::Name;

#[derive(Clone, Copy)]
struct RateLimiterState {
    active_cycle: i64,
    active_permissions: i64,
}

/// Rate limiter backed by a single atomically-swapped state cell.
///
/// Permission reservations borrow against future cycles: `active_permissions`
/// may go negative, meaning callers ahead in the queue have already claimed
/// permits that haven't refreshed yet.
pub struct AtomicRateLimiter {
    name: Name,
    config: RwLock<Arc<RateLimiterConfig>>,
    start: Instant,
    state: ArcSwap<RateLimiterState>,
    waiting_threads: AtomicUsize,
    events: EventStream,
}

impl AtomicRateLimiter {
    pub fn new(
        name: impl Into<String>,
        config: RateLimiterConfig,
    ) -> Result<Arc<Self>, NullNameError> {
        let name = Name::new(name)?;
        info!(
            name = %name,
            limit_for_period = config.limit_for_period(),
            refresh_period = ?config.limit_refresh_period(),
            "atomic rate limiter initialized"
        );
        // Cycle 0 starts with a full grant, not zero — matching "each cycle
        // grants limitForPeriod fresh permissions" from the very first cycle.
        let initial_permissions = config.limit_for_period() as i64;
        Ok(Arc::new(Self {
            name,
            config: RwLock::new(Arc::new(config)),
            start: Instant::now(),
            state: ArcSwap::from_pointee(RateLimiterState {
                active_cycle: 0,
                active_permissions: initial_permissions,
            }),
            waiting_threads: AtomicUsize::new(0),
            events: EventStream::new(),
        }))
    }

    pub fn with_default_config(name: impl Into<String>) -> Result<Arc<Self>, NullNameError> {
        Self::new(name, RateLimiterConfig::default())
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn config(&self) -> Arc<RateLimiterConfig> {
        self.config.read().clone()
    }

    pub fn event_stream(&self) -> EventStreamHandle {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> RateLimiterMetrics {
        let state = self.state.load();
        RateLimiterMetrics {
            available_permissions: state.active_permissions.max(0),
            number_of_waiting_threads: self.waiting_threads.load(Ordering::Relaxed),
        }
    }

    /// Blocking acquire, parity with spec.md's "park the caller, interruptible"
    /// framing — Rust has no interrupt signal, so cancellation is modeled as
    /// the caller-supplied `timeout` elapsing (see DESIGN.md).
    pub fn acquire_permission(&self, timeout: Duration) -> bool {
        self.waiting_threads.fetch_add(1, Ordering::Relaxed);
        let (permitted, nanos_to_wait) = self.try_reserve(timeout);
        if permitted && !nanos_to_wait.is_zero() {
            std::thread::park_timeout(nanos_to_wait);
        }
        self.waiting_threads.fetch_sub(1, Ordering::Relaxed);
        self.publish_outcome(permitted);
        permitted
    }

    /// Non-blocking: only succeeds if a permit is available with no wait.
    pub fn try_acquire_permission(&self) -> bool {
        self.acquire_permission(Duration::ZERO)
    }

    /// Async acquire: same accounting as [`Self::acquire_permission`], but
    /// sleeps on the reactor instead of parking the OS thread — the
    /// idiomatic default in this lineage, since `armature-ratelimit`'s
    /// entire surface is `async fn check()`.
    pub async fn acquire_permission_async(&self, timeout: Duration) -> bool {
        self.waiting_threads.fetch_add(1, Ordering::Relaxed);
        let (permitted, nanos_to_wait) = self.try_reserve(timeout);
        if permitted && !nanos_to_wait.is_zero() {
            tokio::time::sleep(nanos_to_wait).await;
        }
        self.waiting_threads.fetch_sub(1, Ordering::Relaxed);
        self.publish_outcome(permitted);
        permitted
    }

    pub fn change_limit_for_period(&self, limit_for_period: u32) {
        let mut guard = self.config.write();
        let current = **guard;
        *guard = Arc::new(RateLimiterConfig {
            limit_for_period,
            ..current
        });
    }

    pub fn change_timeout_duration(&self, timeout: Duration) {
        let mut guard = self.config.write();
        let current = **guard;
        *guard = Arc::new(RateLimiterConfig {
            timeout_duration: timeout,
            ..current
        });
    }

    /// Implements spec.md §4.4 steps 1-7 as a single `rcu` retry loop.
    /// `nanos_to_wait` is recomputed from the winning `(cycle, permissions)`
    /// pair rather than stored in the state cell itself — see DESIGN.md.
    fn try_reserve(&self, timeout: Duration) -> (bool, Duration) {
        let config = self.config.read().clone();
        let limit_for_period = config.limit_for_period() as i64;
        let period = config.limit_refresh_period();

        let mut outcome = (false, Duration::ZERO);
        self.state.rcu(|current| {
            let now = Instant::now();
            let current_cycle = self.cycle_index(now, period);
            let elapsed_cycles = current_cycle - current.active_cycle;

            let refreshed_permissions = if elapsed_cycles > 0 {
                current
                    .active_permissions
                    .saturating_add(elapsed_cycles.saturating_mul(limit_for_period))
                    .min(limit_for_period)
            } else {
                current.active_permissions
            };

            let new_permissions = refreshed_permissions - 1;

            if new_permissions >= 0 {
                outcome = (true, Duration::ZERO);
                Arc::new(RateLimiterState {
                    active_cycle: current_cycle,
                    active_permissions: new_permissions,
                })
            } else {
                let deficit = (-new_permissions) as u64;
                let cycles_needed = deficit.div_ceil(limit_for_period as u64);
                let elapsed_in_cycle = self.elapsed_in_current_cycle(now, period);
                let nanos_to_wait =
                    (period.saturating_mul(cycles_needed as u32)).saturating_sub(elapsed_in_cycle);

                if nanos_to_wait > timeout {
                    // Caller loses: bookkeeping advances, but no permit is reserved.
                    outcome = (false, nanos_to_wait);
                    Arc::new(RateLimiterState {
                        active_cycle: current_cycle,
                        active_permissions: refreshed_permissions,
                    })
                } else {
                    outcome = (true, nanos_to_wait);
                    Arc::new(RateLimiterState {
                        active_cycle: current_cycle,
                        active_permissions: new_permissions,
                    })
                }
            }
        });

        debug!(name = %self.name, permitted = outcome.0, nanos_to_wait = ?outcome.1, "permit reservation evaluated");
        outcome
    }

    /// `period` is always `> 0`: [`super::config::RateLimiterConfigBuilder::build`]
    /// rejects a zero refresh period before a config ever reaches here.
    fn cycle_index(&self, now: Instant, period: Duration) -> i64 {
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_nanos() / period.as_nanos()) as i64
    }

    fn elapsed_in_current_cycle(&self, now: Instant, period: Duration) -> Duration {
        let elapsed = now.saturating_duration_since(self.start);
        Duration::from_nanos((elapsed.as_nanos() % period.as_nanos()) as u64)
    }

    fn publish_outcome(&self, permitted: bool) {
        let name = self.name.as_str().to_string();
        let created_at = SystemTime::now();
        self.events.publish(if permitted {
            Event::PermissionAcquired { name, created_at }
        } else {
            Event::PermissionDenied { name, created_at }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit_for_period: u32, period: Duration) -> Arc<AtomicRateLimiter> {
        let config = RateLimiterConfig::builder()
            .limit_for_period(limit_for_period)
            .limit_refresh_period(period)
            .timeout_duration(Duration::ZERO)
            .build()
            .unwrap();
        AtomicRateLimiter::new("svc", config).unwrap()
    }

    #[test]
    fn grants_up_to_limit_then_blocks() {
        let limiter = limiter(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.try_acquire_permission());
        }
        assert!(!limiter.try_acquire_permission());
        assert_eq!(limiter.metrics().available_permissions, 0);
    }

    #[test]
    fn denied_permit_is_not_reserved_permanently() {
        let limiter = limiter(1, Duration::from_millis(20));

        assert!(limiter.try_acquire_permission());
        assert!(!limiter.try_acquire_permission());

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.try_acquire_permission());
    }

    #[test]
    fn change_limit_for_period_takes_effect() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.try_acquire_permission());
        assert!(!limiter.try_acquire_permission());

        limiter.change_limit_for_period(10);
        // still bound by the already-borrowed cycle; but a later cycle
        // should now grant far more than the original limit of 1.
        assert_eq!(limiter.config().limit_for_period(), 10);
    }

    #[test]
    fn concurrent_acquires_never_oversubscribe() {
        let limiter = limiter(20, Duration::from_secs(60));
        let granted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..50 {
                scope.spawn(|| {
                    if limiter.try_acquire_permission() {
                        granted.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(granted.load(Ordering::Relaxed), 20);
    }

    #[tokio::test]
    async fn async_acquire_waits_for_next_cycle() {
        let config = RateLimiterConfig::builder()
            .limit_for_period(1)
            .limit_refresh_period(Duration::from_millis(50))
            .timeout_duration(Duration::from_secs(5))
            .build()
            .unwrap();
        let limiter = AtomicRateLimiter::new("svc", config).unwrap();

        assert!(limiter.acquire_permission_async(Duration::ZERO).await);
        let started = Instant::now();
        assert!(
            limiter
                .acquire_permission_async(Duration::from_secs(5))
                .await
        );
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn async_acquire_denied_past_timeout() {
        let config = RateLimiterConfig::builder()
            .limit_for_period(1)
            .limit_refresh_period(Duration::from_secs(60))
            .timeout_duration(Duration::ZERO)
            .build()
            .unwrap();
        let limiter = AtomicRateLimiter::new("svc", config).unwrap();

        assert!(limiter.acquire_permission_async(Duration::ZERO).await);
        assert!(!limiter.acquire_permission_async(Duration::ZERO).await);
    }
}

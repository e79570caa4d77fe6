//! Counted-semaphore permit accounting, refreshed by a scheduled tick (C5).
//!
//! Grounded on `armature-core::resilience::bulkhead::Bulkhead`: the same
//! `tokio::sync::Semaphore` + `tokio::time::timeout`-around-`acquire()`
//! shape, adapted so permits are *not* returned to the semaphore when a call
//! completes (a rate limit, unlike a bulkhead, doesn't free a slot when work
//! finishes — only the refresh tick replenishes).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::config::RateLimiterConfig;
use super::metrics::RateLimiterMetrics;
use crate::error::NullNameError;
use crate::event::{Event, EventStream, EventStreamHandle};
use crate::name::Name;

struct Shared {
    config: ArcSwap<RateLimiterConfig>,
    semaphore: Arc<Semaphore>,
}

/// Rate limiter backed by a counted semaphore, refreshed by a scheduled tick
/// rather than C4's precise per-acquire cycle math.
///
/// Must be constructed from within a running Tokio runtime — [`Self::new`]
/// spawns the background refresh task via [`tokio::spawn`].
pub struct SemaphoreBasedRateLimiter {
    name: Name,
    shared: Arc<Shared>,
    refresh_task: JoinHandle<()>,
    waiting_threads: AtomicUsize,
    events: EventStream,
}

impl SemaphoreBasedRateLimiter {
    pub fn new(
        name: impl Into<String>,
        config: RateLimiterConfig,
    ) -> Result<Arc<Self>, NullNameError> {
        let name = Name::new(name)?;
        info!(
            name = %name,
            limit_for_period = config.limit_for_period(),
            "semaphore rate limiter initialized"
        );

        let shared = Arc::new(Shared {
            semaphore: Arc::new(Semaphore::new(config.limit_for_period() as usize)),
            config: ArcSwap::from_pointee(config),
        });

        let refresh_task = {
            let shared = shared.clone();
            let limiter_name = name.as_str().to_string();
            tokio::spawn(async move {
                loop {
                    let period = shared.config.load().limit_refresh_period();
                    tokio::time::sleep(period).await;
                    Self::refresh(&shared, &limiter_name);
                }
            })
        };

        Ok(Arc::new(Self {
            name,
            shared,
            refresh_task,
            waiting_threads: AtomicUsize::new(0),
            events: EventStream::new(),
        }))
    }

    pub fn with_default_config(name: impl Into<String>) -> Result<Arc<Self>, NullNameError> {
        Self::new(name, RateLimiterConfig::default())
    }

    /// Release up to `limit_for_period - available_permits` permits, never
    /// exceeding the configured limit (spec §4.5).
    fn refresh(shared: &Shared, name: &str) {
        let limit = shared.config.load().limit_for_period() as usize;
        let available = shared.semaphore.available_permits();
        let deficit = limit.saturating_sub(available);
        if deficit > 0 {
            shared.semaphore.add_permits(deficit);
            debug!(name, added = deficit, "rate limiter permits refreshed");
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn config(&self) -> Arc<RateLimiterConfig> {
        self.shared.config.load_full()
    }

    pub fn event_stream(&self) -> EventStreamHandle {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> RateLimiterMetrics {
        RateLimiterMetrics {
            available_permissions: self.shared.semaphore.available_permits() as i64,
            number_of_waiting_threads: self.waiting_threads.load(Ordering::Relaxed),
        }
    }

    /// `tryAcquire(timeout)` parity with spec §4.5: waits up to `timeout` for
    /// a permit, consuming it permanently (forgotten, not released) on
    /// success.
    pub async fn acquire_permission(&self, timeout: Duration) -> bool {
        self.waiting_threads.fetch_add(1, Ordering::Relaxed);
        let permitted = match tokio::time::timeout(timeout, self.shared.semaphore.acquire()).await
        {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            Ok(Err(_)) | Err(_) => false,
        };
        self.waiting_threads.fetch_sub(1, Ordering::Relaxed);
        self.publish_outcome(permitted);
        permitted
    }

    /// Non-blocking: only succeeds if a permit is immediately available.
    pub async fn try_acquire_permission(&self) -> bool {
        let permitted = match self.shared.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        };
        self.publish_outcome(permitted);
        permitted
    }

    pub fn change_limit_for_period(&self, limit_for_period: u32) {
        let current = self.shared.config.load_full();
        self.shared.config.store(Arc::new(RateLimiterConfig {
            limit_for_period,
            ..*current
        }));
    }

    pub fn change_timeout_duration(&self, timeout: Duration) {
        let current = self.shared.config.load_full();
        self.shared.config.store(Arc::new(RateLimiterConfig {
            timeout_duration: timeout,
            ..*current
        }));
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

impl Drop for SemaphoreBasedRateLimiter {
    fn drop(&mut self) {
        self.refresh_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(limit: u32, period: Duration) -> RateLimiterConfig {
        RateLimiterConfig::builder()
            .limit_for_period(limit)
            .limit_refresh_period(period)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn grants_up_to_limit_then_blocks() {
        let limiter = SemaphoreBasedRateLimiter::new("svc", config(2, Duration::from_secs(60)))
            .unwrap();

        assert!(limiter.try_acquire_permission().await);
        assert!(limiter.try_acquire_permission().await);
        assert!(!limiter.try_acquire_permission().await);
    }

    #[tokio::test]
    async fn refresh_tick_replenishes_permits() {
        let limiter =
            SemaphoreBasedRateLimiter::new("svc", config(1, Duration::from_millis(30))).unwrap();

        assert!(limiter.try_acquire_permission().await);
        assert!(!limiter.try_acquire_permission().await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.try_acquire_permission().await);
    }

    #[tokio::test]
    async fn acquire_permission_times_out_when_exhausted() {
        let limiter = SemaphoreBasedRateLimiter::new("svc", config(1, Duration::from_secs(60)))
            .unwrap();

        assert!(limiter.acquire_permission(Duration::ZERO).await);
        assert!(
            !limiter
                .acquire_permission(Duration::from_millis(20))
                .await
        );
    }

    #[tokio::test]
    async fn drop_aborts_refresh_task() {
        let limiter = SemaphoreBasedRateLimiter::new("svc", config(1, Duration::from_millis(10)))
            .unwrap();
        let task = limiter.refresh_task.abort_handle();
        drop(limiter);
        tokio::task::yield_now().await;
        assert!(task.is_finished());
    }
}

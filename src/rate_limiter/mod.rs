//! Rate limiter: permit accounting over time cycles, in two interchangeable
//! flavors. See spec §4.4/§4.5.

mod atomic;
mod config;
mod metrics;
mod semaphore;

pub use atomic::AtomicRateLimiter;
pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use metrics::RateLimiterMetrics;
pub use semaphore::SemaphoreBasedRateLimiter;

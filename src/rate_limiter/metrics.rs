//! Read-only metrics view shared by both rate limiter implementations.

/// A point-in-time view of a rate limiter's permit accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterMetrics {
    /// Permits immediately available to the next caller. Never negative —
    /// the atomic limiter's `active_permissions` may dip below zero
    /// internally (future cycles borrowed against), but that is an
    /// accounting detail, not something callers need reported as a debt.
    pub available_permissions: i64,
    /// Callers currently parked inside `acquire_permission`.
    pub number_of_waiting_threads: usize,
}

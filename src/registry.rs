//! Name-keyed registries for sharing core instances across call sites.
//!
//! Grounded on `armature-ratelimit::stores::memory::InMemoryStore`'s
//! `DashMap<String, _>` for per-key concurrent state, generalized here to
//! hold the cores themselves rather than their raw counters.

use std::sync::Arc;

use dashmap::DashMap;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::NullNameError;
use crate::rate_limiter::{AtomicRateLimiter, RateLimiterConfig};

/// Shares [`CircuitBreaker`] instances by name so every call site protecting
/// the same backend observes the same state.
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    entries: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            entries: DashMap::new(),
        }
    }

    /// Look up a breaker by name, creating one with the registry's default
    /// config the first time that name is seen.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<CircuitBreaker>, NullNameError> {
        if let Some(existing) = self.entries.get(name) {
            return Ok(existing.clone());
        }
        let created = CircuitBreaker::new(name, self.default_config.clone())?;
        Ok(self
            .entries
            .entry(name.to_string())
            .or_insert(created)
            .clone())
    }

    /// Look up a breaker by name, creating one with an explicit config the
    /// first time that name is seen. Subsequent calls for the same name
    /// return the already-created instance, ignoring `config`.
    pub fn get_or_create_with_config(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, NullNameError> {
        if let Some(existing) = self.entries.get(name) {
            return Ok(existing.clone());
        }
        let created = CircuitBreaker::new(name, config)?;
        Ok(self
            .entries
            .entry(name.to_string())
            .or_insert(created)
            .clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.entries.remove(name).map(|(_, v)| v)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Shares [`AtomicRateLimiter`] instances by name. The semaphore-based core
/// is intentionally not registry-managed here: it owns a background task and
/// is meant to be constructed and held explicitly by its owner, not shared
/// implicitly through a lazily-populated map.
pub struct RateLimiterRegistry {
    default_config: RateLimiterConfig,
    entries: DashMap<String, Arc<AtomicRateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new(default_config: RateLimiterConfig) -> Self {
        Self {
            default_config,
            entries: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Result<Arc<AtomicRateLimiter>, NullNameError> {
        if let Some(existing) = self.entries.get(name) {
            return Ok(existing.clone());
        }
        let created = AtomicRateLimiter::new(name, self.default_config)?;
        Ok(self
            .entries
            .entry(name.to_string())
            .or_insert(created)
            .clone())
    }

    pub fn get_or_create_with_config(
        &self,
        name: &str,
        config: RateLimiterConfig,
    ) -> Result<Arc<AtomicRateLimiter>, NullNameError> {
        if let Some(existing) = self.entries.get(name) {
            return Ok(existing.clone());
        }
        let created = AtomicRateLimiter::new(name, config)?;
        Ok(self
            .entries
            .entry(name.to_string())
            .or_insert(created)
            .clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<AtomicRateLimiter>> {
        self.entries.remove(name).map(|(_, v)| v)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_registry_shares_instance_by_name() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("svc").unwrap();
        let b = registry.get_or_create("svc").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn circuit_breaker_registry_distinguishes_names() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("svc-a").unwrap();
        let b = registry.get_or_create("svc-b").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn rate_limiter_registry_shares_instance_by_name() {
        let registry = RateLimiterRegistry::default();
        let a = registry.get_or_create("svc").unwrap();
        let b = registry.get_or_create("svc").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn registry_rejects_null_name() {
        let registry = CircuitBreakerRegistry::default();
        assert!(registry.get_or_create("").is_err());
    }
}

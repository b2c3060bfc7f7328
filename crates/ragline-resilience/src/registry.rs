// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide registry of circuit breakers, one per downstream service.

use std::sync::Arc;

use dashmap::DashMap;

use crate::circuit::{BreakerConfig, CircuitBreaker, CircuitState};
use crate::retry::RetryPolicy;
use crate::Guard;

/// Downstream names used for breakers, metrics labels, and logs.
pub const EMBEDDING: &str = "embedding";
pub const LLM: &str = "llm";
pub const CRAWLER: &str = "crawler";
pub const VECTOR_STORE: &str = "vector_store";

/// Hands out the shared breaker for a service, creating it on first use.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    policy: RetryPolicy,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            policy,
            breakers: DashMap::new(),
        }
    }

    pub fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.config.clone())))
            .clone()
    }

    /// A retry-plus-breaker guard for `service`.
    pub fn guard(&self, service: &str) -> Guard {
        Guard::new(self.policy.clone(), self.breaker(service))
    }

    /// Current state of every breaker created so far, sorted by service.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let mut out: Vec<_> = self
            .breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().state()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_service_shares_one_breaker() {
        let reg = BreakerRegistry::new(BreakerConfig::default(), RetryPolicy::none());
        let a = reg.breaker(LLM);
        let b = reg.breaker(LLM);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &reg.breaker(EMBEDDING)));
    }

    #[test]
    fn snapshot_lists_created_breakers() {
        let reg = BreakerRegistry::new(BreakerConfig::default(), RetryPolicy::none());
        let _ = reg.guard(VECTOR_STORE);
        let _ = reg.guard(CRAWLER);
        let names: Vec<_> = reg.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["crawler", "vector_store"]);
    }
}

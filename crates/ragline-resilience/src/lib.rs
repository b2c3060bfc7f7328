// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives guarding every external call.
//!
//! - [`RetryPolicy`] / [`retry`]: exponential backoff for transient failures.
//! - [`CircuitBreaker`]: closed / open / half-open failure isolation.
//! - [`BreakerRegistry`]: one breaker per downstream, shared process-wide.
//! - [`Guard`]: retry wrapped around a breaker-guarded call.
//! - [`guarded`]: collaborator trait impls that route through a [`Guard`].

pub mod circuit;
pub mod guarded;
pub mod registry;
pub mod retry;

pub use circuit::{BreakerConfig, CircuitBreaker, CircuitOpen, CircuitState};
pub use guarded::{GuardedCrawler, GuardedEmbedding, GuardedLlm, GuardedVectors};
pub use registry::BreakerRegistry;
pub use retry::{RetryPolicy, Transient, retry};

use std::future::Future;
use std::sync::Arc;

/// Retry policy composed with a circuit breaker for one downstream.
///
/// Each attempt goes through the breaker, so an open circuit ends the retry
/// loop immediately instead of sleeping through backoff.
#[derive(Clone)]
pub struct Guard {
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl Guard {
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self { policy, breaker }
    }

    pub fn service(&self) -> &str {
        self.breaker.service()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + From<CircuitOpen> + std::fmt::Display,
    {
        let breaker = &self.breaker;
        retry(&self.policy, breaker.service(), || breaker.call(operation())).await
    }
}

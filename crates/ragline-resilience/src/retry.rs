// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use ragline_core::RaglineError;
use tracing::{debug, warn};

/// Classifies an error as transient (worth retrying) or permanent.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for RaglineError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }
}

/// Backoff schedule: `min(max_delay, initial_delay * multiplier^attempt)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call. Always at least 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), Duration::from_millis(10_000))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt + 1` (attempt is zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        let clamped = base.min(self.max_delay.as_secs_f64());
        if clamped.is_finite() && clamped >= 0.0 {
            Duration::from_secs_f64(clamped)
        } else {
            self.max_delay
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or attempts run out.
///
/// Permanent errors are returned after the first attempt. The last transient
/// error is returned once `max_attempts` is exhausted.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, service: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(service, attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    warn!(service, attempts = attempt, error = %e, "retry attempts exhausted");
                    return Err(e);
                }
                let delay = policy.delay_for_attempt(attempt - 1);
                metrics::counter!("ragline_retry_attempts_total", "service" => service.to_string())
                    .increment(1);
                warn!(
                    service,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

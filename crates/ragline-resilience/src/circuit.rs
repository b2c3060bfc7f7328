// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker: `closed -> open -> half-open -> closed`.
//!
//! In `closed`, calls pass through and consecutive failures are counted.
//! Reaching the threshold trips the breaker `open`, which fails fast for the
//! cooldown window. After cooldown a single trial call runs in `half-open`:
//! success closes the breaker, failure reopens it with a fresh cooldown.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use ragline_core::RaglineError;
use tokio::time::Instant;

use crate::retry::Transient;
use tracing::{info, warn};

/// Breaker tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial call.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Inner {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen { trial_in_flight: bool },
}

/// Returned instead of invoking the wrapped call while the breaker is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitOpen {
    pub service: String,
    pub retry_after: Duration,
}

impl From<CircuitOpen> for RaglineError {
    fn from(open: CircuitOpen) -> Self {
        RaglineError::CircuitOpen {
            service: open.service,
            retry_after: open.retry_after,
        }
    }
}

/// A circuit breaker protecting one downstream dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: BreakerConfig,
    state: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            service: service.into(),
            config: BreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                cooldown: config.cooldown,
            },
            state: Mutex::new(Inner::Closed { failures: 0 }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> CircuitState {
        match *self.lock() {
            Inner::Closed { .. } => CircuitState::Closed,
            Inner::Open { until } if Instant::now() >= until => CircuitState::HalfOpen,
            Inner::Open { .. } => CircuitState::Open,
            Inner::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Runs `call` if the breaker admits it, recording the outcome.
    ///
    /// Only transient errors count as failures. A permanent error (a 404, a
    /// rejected request) means the downstream answered and counts as success.
    ///
    /// If the returned future is dropped before `call` completes (for example
    /// on client disconnect), a half-open trial slot is released without
    /// counting as success or failure.
    pub async fn call<Fut, T, E>(&self, call: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpen> + Transient,
    {
        let trial = self.admit().map_err(E::from)?;
        let mut permit = Permit {
            breaker: self,
            trial,
            settled: false,
        };
        let result = call.await;
        match &result {
            Err(e) if e.is_transient() => self.on_failure(),
            _ => self.on_success(),
        }
        permit.settled = true;
        result
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere while holding it; the
        // state itself is always a valid variant.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Returns whether the admitted call is the half-open trial.
    fn admit(&self) -> Result<bool, CircuitOpen> {
        let mut state = self.lock();
        let now = Instant::now();
        match *state {
            Inner::Closed { .. } => Ok(false),
            Inner::Open { until } if now >= until => {
                info!(service = %self.service, "circuit breaker half-open, allowing trial call");
                *state = Inner::HalfOpen {
                    trial_in_flight: true,
                };
                Ok(true)
            }
            Inner::Open { until } => Err(CircuitOpen {
                service: self.service.clone(),
                retry_after: until.saturating_duration_since(now),
            }),
            Inner::HalfOpen {
                ref mut trial_in_flight,
            } => {
                if *trial_in_flight {
                    Err(CircuitOpen {
                        service: self.service.clone(),
                        retry_after: Duration::ZERO,
                    })
                } else {
                    *trial_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.lock();
        if !matches!(*state, Inner::Closed { failures: 0 }) {
            if matches!(*state, Inner::HalfOpen { .. }) {
                info!(service = %self.service, "circuit breaker closed after successful trial");
            }
            *state = Inner::Closed { failures: 0 };
        }
    }

    fn on_failure(&self) {
        let mut state = self.lock();
        match *state {
            Inner::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    self.trip(&mut state, failures);
                } else {
                    *state = Inner::Closed { failures };
                }
            }
            Inner::HalfOpen { .. } => self.trip(&mut state, 1),
            // A call admitted before the breaker tripped finished late.
            Inner::Open { .. } => {}
        }
    }

    fn trip(&self, state: &mut Inner, failures: u32) {
        warn!(
            service = %self.service,
            failures,
            cooldown_secs = self.config.cooldown.as_secs(),
            "circuit breaker opened"
        );
        metrics::counter!("ragline_circuit_open_total", "service" => self.service.clone())
            .increment(1);
        *state = Inner::Open {
            until: Instant::now() + self.config.cooldown,
        };
    }
}

struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut state = self.breaker.lock();
            if let Inner::HalfOpen {
                ref mut trial_in_flight,
            } = *state
            {
                *trial_in_flight = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "embedding",
            BreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_secs(30),
            },
        )
    }

    async fn fail(b: &CircuitBreaker, calls: &AtomicU32) -> Result<(), RaglineError> {
        b.call(async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(RaglineError::external("embedding", "503"))
        })
        .await
    }

    async fn succeed(b: &CircuitBreaker, calls: &AtomicU32) -> Result<(), RaglineError> {
        b.call(async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), RaglineError>(())
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_skips_calls() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            assert!(fail(&b, &calls).await.is_err());
        }
        assert_eq!(b.state(), CircuitState::Open);

        let err = succeed(&b, &calls).await.unwrap_err();
        assert!(matches!(err, RaglineError::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "open breaker must not invoke the call");
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_success_closes() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(b.state(), CircuitState::HalfOpen);

        succeed(&b, &calls).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens_with_fresh_cooldown() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(fail(&b, &calls).await.is_err());
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(b.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_consecutive_failures() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        let _ = fail(&b, &calls).await;
        let _ = fail(&b, &calls).await;
        succeed(&b, &calls).await.unwrap();
        let _ = fail(&b, &calls).await;
        let _ = fail(&b, &calls).await;
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_trial_in_half_open() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let trial = b.call(async {
            let _ = rx.await;
            Ok::<(), RaglineError>(())
        });
        tokio::pin!(trial);
        // Poll the trial once so it claims the half-open slot.
        assert!(futures::poll!(trial.as_mut()).is_pending());

        let concurrent = succeed(&b, &calls).await;
        assert!(matches!(concurrent, Err(RaglineError::CircuitOpen { .. })));

        tx.send(()).unwrap();
        trial.await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_do_not_trip() {
        let b = breaker();
        for _ in 0..5 {
            let out: Result<(), RaglineError> = b
                .call(async {
                    Err(RaglineError::ExternalService {
                        service: "crawler".into(),
                        message: "404".into(),
                        status: Some(404),
                        source: None,
                    })
                })
                .await;
            assert!(out.is_err());
        }
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_releases_slot() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        {
            let trial = b.call(std::future::pending::<Result<(), RaglineError>>());
            tokio::pin!(trial);
            assert!(futures::poll!(trial.as_mut()).is_pending());
        }
        succeed(&b, &calls).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }
}

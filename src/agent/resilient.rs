//! Retry-with-backoff, then deterministic fallback.
//!
//! Every gateway call in the pipeline goes through [`resilient_call`]:
//!
//! 1. Each attempt is bounded by the stage timeout; a timeout counts as a
//!    gateway error.
//! 2. A failed attempt is retried up to `max_retries` times, sleeping
//!    `base_delay * 2^(n-1)` before the n-th retry.
//! 3. Once retries are exhausted the stage's fallback is asked for a
//!    substitute. A fallback that yields nothing is an error.
//!
//! Attempts and backoff sleeps are the only suspension points, and each
//! one races the run's [`CancellationToken`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::PipelineConfig;
use super::phase::Stage;
use crate::error::{GenerationError, RetrievalError};

/// Gateway errors that can represent an elapsed stage timeout.
pub trait Transient: Display {
    /// Error value for an attempt that exceeded `after`.
    fn timed_out(after: Duration) -> Self;
}

impl Transient for GenerationError {
    fn timed_out(after: Duration) -> Self {
        Self::Timeout { after }
    }
}

impl Transient for RetrievalError {
    fn timed_out(after: Duration) -> Self {
        Self::Timeout { after }
    }
}

/// Retry and timeout budget for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Budget for each attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Policy derived from the pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            timeout: config.stage_timeout,
        }
    }

    /// Total attempts allowed (`max_retries + 1`).
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }
}

/// Why [`call_with_retry`] gave up.
#[derive(Debug, PartialEq, Eq)]
pub enum CallFailure<E> {
    /// The token was cancelled at a suspension point.
    Cancelled,
    /// Every attempt failed.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the last attempt.
        last: E,
    },
}

/// Result of a resilient call that did not escalate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The gateway produced the value.
    Primary(T),
    /// The gateway failed and the fallback produced the value.
    Fallback {
        /// Substitute value.
        value: T,
        /// Description of the gateway failure.
        cause: String,
    },
}

/// Escalation out of a resilient call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResilienceError {
    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// Retries were exhausted and the fallback produced nothing.
    #[error("no fallback output after: {cause}")]
    FallbackFailed {
        /// Description of the gateway failure.
        cause: String,
    },
}

/// Runs `op` with per-attempt timeout and exponential backoff.
///
/// `op` is invoked at most `policy.max_attempts()` times.
pub async fn call_with_retry<T, E, F, Fut>(
    stage: Stage,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, CallFailure<E>>
where
    E: Transient,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CallFailure::Cancelled),
            outcome = tokio::time::timeout(policy.timeout, op()) => outcome,
        };

        let err = match outcome {
            Ok(Ok(value)) => {
                debug!(%stage, attempt, "gateway call succeeded");
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(_elapsed) => E::timed_out(policy.timeout),
        };

        if attempt >= max_attempts {
            warn!(%stage, attempts = attempt, error = %err, "gateway call failed, retries exhausted");
            return Err(CallFailure::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            %stage,
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "gateway call failed, retrying"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CallFailure::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Runs `op` through [`call_with_retry`], then falls back on exhaustion.
///
/// `fallback` returns `None` when it cannot produce usable output.
///
/// # Errors
///
/// Returns [`ResilienceError::Cancelled`] on cancellation and
/// [`ResilienceError::FallbackFailed`] when the fallback yields nothing.
pub async fn resilient_call<T, E, F, Fut, G>(
    stage: Stage,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op: F,
    fallback: G,
) -> Result<Resolution<T>, ResilienceError>
where
    E: Transient,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    G: FnOnce() -> Option<T>,
{
    match call_with_retry(stage, policy, cancel, op).await {
        Ok(value) => Ok(Resolution::Primary(value)),
        Err(CallFailure::Cancelled) => Err(ResilienceError::Cancelled),
        Err(CallFailure::Exhausted { attempts, last }) => {
            let cause = format!("{last} (after {attempts} attempt(s))");
            match fallback() {
                Some(value) => {
                    warn!(%stage, %cause, "using deterministic fallback");
                    Ok(Resolution::Fallback { value, cause })
                }
                None => Err(ResilienceError::FallbackFailed { cause }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
        }
    }

    fn provider_error() -> GenerationError {
        GenerationError::Provider {
            message: "boom".to_string(),
            status: Some(500),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let p = policy(3);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.max_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let calls = AtomicU32::new(0);
        let result = resilient_call(
            Stage::Summarizer,
            &policy(1),
            &CancellationToken::new(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, GenerationError>("ok") }
            },
            || Some("fallback"),
        )
        .await;
        assert_eq!(result, Ok(Resolution::Primary("ok")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_retry() {
        let calls = AtomicU32::new(0);
        let result = resilient_call(
            Stage::Analyst,
            &policy(2),
            &CancellationToken::new(),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n == 0 { Err(provider_error()) } else { Ok("second") } }
            },
            || Some("fallback"),
        )
        .await;
        assert_eq!(result, Ok(Resolution::Primary("second")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_after_exhaustion_with_backoff() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = resilient_call(
            Stage::Summarizer,
            &policy(2),
            &CancellationToken::new(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<&str, _>(provider_error()) }
            },
            || Some("fallback"),
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(300));
        match result {
            Ok(Resolution::Fallback { value, cause }) => {
                assert_eq!(value, "fallback");
                assert!(cause.contains("boom"));
                assert!(cause.contains("3 attempt"));
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let calls = AtomicU32::new(0);
        let result = resilient_call(
            Stage::Qa,
            &policy(0),
            &CancellationToken::new(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, GenerationError>("late")
                }
            },
            || Some("fallback"),
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Ok(Resolution::Fallback { cause, .. }) => assert!(cause.contains("timed out")),
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_fallback_escalates() {
        let result = resilient_call(
            Stage::Summarizer,
            &policy(0),
            &CancellationToken::new(),
            || async { Err::<String, _>(provider_error()) },
            || None,
        )
        .await;
        assert!(matches!(result, Err(ResilienceError::FallbackFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        token.cancel();
        let result = resilient_call(
            Stage::Retriever,
            &policy(3),
            &token,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RetrievalError>(1) }
            },
            || Some(0),
        )
        .await;
        assert_eq!(result, Err(ResilienceError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let token = CancellationToken::new();
        let child = token.clone();
        let result = call_with_retry(Stage::Summarizer, &policy(5), &token, || {
            child.cancel();
            async { Err::<(), _>(provider_error()) }
        })
        .await;
        assert_eq!(result, Err(CallFailure::Cancelled));
    }

    proptest! {
        #[test]
        fn prop_attempts_bounded_by_retries(max_retries in 0u32..5, failures in 0u32..8) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap_or_else(|_| unreachable!());
            let calls = AtomicU32::new(0);
            let result = runtime.block_on(call_with_retry(
                Stage::Summarizer,
                &policy(max_retries),
                &CancellationToken::new(),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { if n < failures { Err(provider_error()) } else { Ok(n) } }
                },
            ));
            let made = calls.load(Ordering::SeqCst);
            prop_assert!(made <= max_retries + 1);
            prop_assert_eq!(result.is_ok(), failures <= max_retries);
        }
    }
}

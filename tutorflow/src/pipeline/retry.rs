//! Bounded retry with a fixed wait between attempts.
//!
//! A [`RetryPolicy`] belongs to one stage. Attempts are counted per call to
//! [`with_retry`], so sibling stages never share counters.

use crate::errors::{Result, TutorflowError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default wait between attempts, in milliseconds.
pub const DEFAULT_WAIT_MS: u64 = 10_000;

/// Retry configuration for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts (including the initial one). Zero behaves like one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Fixed wait between attempts in milliseconds.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    /// Whether malformed responses are retried like provider failures.
    #[serde(default)]
    pub retry_format_errors: bool,
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_ms: DEFAULT_WAIT_MS,
            retry_format_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy (3 attempts, 10 seconds apart).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1).with_wait_ms(0)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the wait in milliseconds.
    #[must_use]
    pub fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = wait_ms;
        self
    }

    /// Sets the wait in whole seconds.
    #[must_use]
    pub fn with_wait_secs(self, seconds: u64) -> Self {
        self.with_wait_ms(seconds.saturating_mul(1000))
    }

    /// Treats response format errors as retryable.
    #[must_use]
    pub fn with_retry_format_errors(mut self, enabled: bool) -> Self {
        self.retry_format_errors = enabled;
        self
    }

    /// Effective attempt budget.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// The wait as a `Duration`.
    #[must_use]
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Returns true if the error class is retried under this policy.
    #[must_use]
    pub fn is_retryable(&self, error: &TutorflowError) -> bool {
        error.is_external_service() || (self.retry_format_errors && error.is_response_format())
    }
}

/// State tracking for one retried operation.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: usize,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed attempt and returns true if more attempts remain.
    pub fn increment(&mut self, policy: &RetryPolicy) -> bool {
        self.attempt += 1;
        self.attempt < policy.attempts()
    }

    /// Returns true if retries are exhausted.
    #[must_use]
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt >= policy.attempts()
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts, give up.
    GiveUp,
    /// The error is not retryable under this policy.
    NotRetryable,
}

/// Records a failed attempt and decides what happens next.
#[must_use]
pub fn should_retry(
    state: &mut RetryState,
    policy: &RetryPolicy,
    error: &TutorflowError,
) -> RetryDecision {
    if !policy.is_retryable(error) {
        return RetryDecision::NotRetryable;
    }

    if state.increment(policy) {
        RetryDecision::Retry(policy.wait())
    } else {
        RetryDecision::GiveUp
    }
}

/// Result of a retried operation together with the attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    /// Final result; on failure, the error of the last attempt.
    pub result: Result<T>,
    /// Number of attempts made.
    pub attempts: usize,
}

/// Executes an operation under a retry policy.
///
/// The operation receives the zero-based attempt index. The error of the
/// final attempt is returned unchanged.
///
/// # Errors
///
/// Returns the last attempt's error once the policy stops retrying.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, operation: F) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run_attempts(policy, label, operation, |_, _, _| {}).await.result
}

/// Like [`with_retry`], but reports the attempt count and calls `on_retry`
/// with `(failed_attempt, error, delay)` before each wait.
pub async fn run_attempts<T, F, Fut, O>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    mut on_retry: O,
) -> Attempted<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
    O: FnMut(usize, &TutorflowError, Duration),
{
    let mut state = RetryState::new();

    loop {
        let attempt = state.attempt;
        match operation(attempt).await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt + 1,
                }
            }
            Err(e) => match should_retry(&mut state, policy, &e) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        stage = label,
                        attempt = attempt + 1,
                        max_attempts = policy.attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying after error"
                    );
                    on_retry(attempt + 1, &e, delay);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                    return Attempted {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }
            },
        }
    }
}

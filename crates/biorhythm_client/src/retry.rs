//! Backoff/retry decision logic for transient API failures.
//!
//! `RetryPolicy::decide` is a pure function of (attempt, failure class);
//! sleeping happens at the call site, so decisions are testable without
//! real time passing.

use std::future::Future;
use std::time::Duration;

use common::config::DashboardConfig;
use common::Error;
use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

/// Classified request failure, as consumed by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection failure, timeout, or aborted call.
    Network,
    /// HTTP 5xx.
    Server,
    /// HTTP 429, carrying the server's Retry-After hint when present.
    RateLimited { retry_after_ms: Option<u64> },
    /// Any other 4xx — caller misuse, never retried.
    Client,
    /// Authentication failure after the one-shot token refresh.
    Auth,
    /// Malformed or out-of-range payload. Retrying will not fix bad data.
    InvalidData,
}

impl FailureClass {
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Network(_) => Self::Network,
            Error::Server { .. } => Self::Server,
            Error::RateLimited { retry_after_ms } => Self::RateLimited {
                retry_after_ms: *retry_after_ms,
            },
            Error::ClientRequest { .. } => Self::Client,
            Error::Auth(_) => Self::Auth,
            Error::DataValidation(_) | Error::Json(_) => Self::InvalidData,
            // Anything outside the HTTP layer is terminal by definition.
            _ => Self::Client,
        }
    }

    /// Terminal failures surface unchanged; they are never wrapped in
    /// `RetriesExhausted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Client | Self::Auth | Self::InvalidData)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Exponential-backoff retry policy with optional jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            jitter,
        }
    }

    pub fn from_config(cfg: &DashboardConfig) -> Self {
        Self::new(
            cfg.max_retry_attempts,
            Duration::from_millis(cfg.base_backoff_ms),
            cfg.retry_jitter,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide whether `attempt` (1-based) should be retried after `failure`.
    pub fn decide(&self, attempt: u32, failure: &FailureClass) -> RetryDecision {
        let retryable = matches!(
            failure,
            FailureClass::Network | FailureClass::Server | FailureClass::RateLimited { .. }
        );
        if !retryable || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        // A Retry-After hint from the server wins over the computed backoff.
        if let FailureClass::RateLimited {
            retry_after_ms: Some(ms),
        } = failure
        {
            return RetryDecision::Retry {
                delay: Duration::from_millis(*ms),
            };
        }
        RetryDecision::Retry {
            delay: self.backoff(attempt),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // Attempts are 1-based; a stray 0 gets the first-attempt delay.
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        if self.jitter {
            exp.mul_f64(rand::thread_rng().gen_range(1.0..1.5))
        } else {
            exp
        }
    }
}

/// Drive `op` through `policy`, sleeping between attempts.
///
/// Transient failures are retried internally and never surface
/// individually; the caller sees either success, a terminal error
/// unchanged, or `RetriesExhausted` wrapping the last failure.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1u32;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let class = FailureClass::from_error(&err);
        match policy.decide(attempt, &class) {
            RetryDecision::Retry { delay } => {
                warn!(
                    "Attempt {}/{} failed ({}); retrying in {:?}",
                    attempt,
                    policy.max_attempts(),
                    err,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::GiveUp if class.is_terminal() => return Err(err),
            RetryDecision::GiveUp => {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                })
            }
        }
    }
}

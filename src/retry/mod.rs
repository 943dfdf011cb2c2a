//! Retry and backoff policies
//!
//! Two independent disciplines:
//!
//! - [`RetryPolicy`] retries a lookup at a fixed cadence while the remote
//!   system catches up (eventual consistency).
//! - [`BackoffPolicy`] resends a request after `e^attempt - 1` time units
//!   whenever the remote side answers with a rate-limit rejection.
//!
//! Both loops hold their attempt counter locally and sleep through a
//! [`Sleeper`], so tests can observe delays without waiting for them.
//!
//! # Example
//!
//! ```no_run
//! use asset_uploadr::retry::{retry_fixed, RetryPolicy, TokioSleeper};
//! use asset_uploadr::Error;
//!
//! # async fn example() -> asset_uploadr::Result<()> {
//! let policy = RetryPolicy::default();
//! let id = retry_fixed(&policy, &TokioSleeper, |_attempt| async {
//!     Err::<String, _>(Error::NotFound("not yet".into()))
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::metrics;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Suspends the current task
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval retry for eventually-consistent lookups
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_secs(1),
        }
    }
}

/// Exponential backoff for rate-limited requests
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total number of sends before giving up
    pub max_attempts: u32,
    /// Length of one time unit in `e^attempt - 1`
    pub unit: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before send number `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let units = (attempt as f64).exp() - 1.0;
        let secs = self.unit.as_secs_f64() * units;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Retry `lookup` at a fixed cadence
///
/// Only `NotFound` and `Network` failures are retried; anything else is
/// returned as is. After `max_attempts` failures the result names the
/// exhausted count and keeps the kind of the last failure.
pub async fn retry_fixed<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut lookup: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        match lookup(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::Network) => {
                if attempt < max_attempts {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = policy.delay.as_millis() as u64,
                        error = %e,
                        "Lookup failed, retrying"
                    );
                    metrics::record_lookup_retry();
                    sleeper.sleep(policy.delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    let gave_up = format!("gave up after {} attempts", max_attempts);
    match last_err {
        Some(e) if e.kind() != ErrorKind::NotFound => Err(e.context(gave_up)),
        last => Err(Error::NotFound(format!(
            "{}: {}",
            gave_up,
            last.map(|e| e.to_string()).unwrap_or_default()
        ))),
    }
}

/// Send a request, backing off while it is rate limited
///
/// `send` must return [`Error::RateLimited`] for a rate-limit rejection.
/// Exhausting `max_attempts` is a protocol error.
pub async fn send_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    mut send: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        let delay = policy.delay(attempt);
        if !delay.is_zero() {
            sleeper.sleep(delay).await;
        }

        match send().await {
            Err(Error::RateLimited) => {
                tracing::warn!(
                    attempt = attempt,
                    next_delay_ms = policy.delay(attempt + 1).as_millis() as u64,
                    "Request rate limited, backing off"
                );
                metrics::record_rate_limited();
            }
            other => return other,
        }
    }

    Err(Error::Protocol(format!(
        "request still rate limited after {} attempts",
        max_attempts
    )))
}

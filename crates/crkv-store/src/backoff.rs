//! Attempt-bounded exponential backoff.
//!
//! Provisioning calls are retried on a schedule of `initial * multiplier^n`
//! capped at `max_interval`, each delay randomized by
//! `±randomization_factor`. The schedule stops after `max_tries` attempts or,
//! when set, once `max_elapsed` has passed since the first attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::context::{Context, Interrupted};

/// Default delay before the first retry in milliseconds
pub const DEFAULT_INITIAL_INTERVAL_MS: u64 = 500;

/// Default growth factor between retries
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Default jitter factor (0.0 to 1.0)
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;

/// Default upper bound for a single delay in milliseconds
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 60_000;

/// Default number of attempts, including the first
pub const DEFAULT_MAX_TRIES: u32 = 7;

/// Retry schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub max_interval_ms: u64,
    /// Total attempts, including the first one.
    pub max_tries: u32,
    /// Overall time budget. `None` bounds retries by attempts only.
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: DEFAULT_INITIAL_INTERVAL_MS,
            multiplier: DEFAULT_MULTIPLIER,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            max_tries: DEFAULT_MAX_TRIES,
            max_elapsed_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Check the policy, returning a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tries == 0 {
            return Err("retry.max_tries must be at least 1".into());
        }
        if !(self.multiplier >= 1.0) {
            return Err(format!(
                "retry.multiplier must be at least 1.0, got {}",
                self.multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(format!(
                "retry.randomization_factor must be within [0, 1], got {}",
                self.randomization_factor
            ));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err("retry.max_interval_ms must not be below retry.initial_interval_ms".into());
        }
        Ok(())
    }

    /// Same schedule without jitter. Useful where delays must be predictable.
    pub fn without_jitter(mut self) -> Self {
        self.randomization_factor = 0.0;
        self
    }
}

/// Stateful iterator over the delays of one retry loop.
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    current_ms: f64,
    tries: u32,
    started: Instant,
}

impl ExponentialBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            current_ms: policy.initial_interval_ms as f64,
            policy,
            tries: 0,
            started: Instant::now(),
        }
    }

    /// Record a failed attempt and return the delay before the next one, or
    /// `None` when the schedule is exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.tries += 1;
        if self.tries >= self.policy.max_tries {
            return None;
        }
        if let Some(max_elapsed) = self.policy.max_elapsed_ms {
            if self.started.elapsed() >= Duration::from_millis(max_elapsed) {
                return None;
            }
        }

        let interval = self.current_ms;
        self.current_ms =
            (self.current_ms * self.policy.multiplier).min(self.policy.max_interval_ms as f64);
        Some(self.randomize(interval))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn randomize(&self, interval_ms: f64) -> Duration {
        let delta = interval_ms * self.policy.randomization_factor;
        let jittered = interval_ms - delta + rand::random::<f64>() * 2.0 * delta;
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Failure of a [`retry`] loop.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed; `last` is the final attempt's error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The context fired during an attempt or a backoff delay.
    #[error("{reason} after {attempts} attempts")]
    Interrupted { reason: Interrupted, attempts: u32 },
}

/// Run `op` until it succeeds, the policy is exhausted, or `ctx` fires.
///
/// Every error returned by `op` is retried. Callers that want to treat an
/// error as success (e.g. "already exists") map it to `Ok` inside `op`.
pub async fn retry<T, E, F, Fut>(
    ctx: &Context,
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff = ExponentialBackoff::new(policy.clone());
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match ctx.run(op()).await {
            Ok(Ok(value)) => {
                debug!(operation, attempts, "operation succeeded");
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(reason) => return Err(RetryError::Interrupted { reason, attempts }),
        };

        let Some(delay) = backoff.next_backoff() else {
            warn!(operation, attempts, error = %err, "retries exhausted");
            return Err(RetryError::Exhausted {
                attempts,
                last: err,
            });
        };

        warn!(
            operation,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "operation failed; retrying"
        );
        if let Err(reason) = ctx.sleep(delay).await {
            return Err(RetryError::Interrupted { reason, attempts });
        }
    }
}

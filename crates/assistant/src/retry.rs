//! Retry loop with exponential backoff and jitter.
//!
//! One logical call runs up to `max_retries + 1` attempts, strictly in
//! sequence. After a retryable failure the loop waits
//! `min(base * 2^attempt, max) + jitter` before the next attempt. Anything
//! not retryable (see [`ApiError::is_retryable`]) ends the call at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pricelens_core::ApiError;
use rand::Rng;

use crate::activity::{ActivityAction, ActivityEvent, ActivityHook, ActivityLevel};

/// Granularity of the cancellable backoff wait.
const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt when the caller does not override it.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each wait.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus uniform jitter in `[0, jitter)`.
    pub fn jittered_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.backoff_delay(attempt);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rng.gen_range(0..jitter_ms))
    }

    /// Retry budget for one call: `retry == false` means a single attempt;
    /// an explicit `max_retries` is used as given, including 0.
    pub fn budget(&self, retry: bool, max_retries: Option<u32>) -> u32 {
        if !retry {
            return 0;
        }
        max_retries.unwrap_or(self.max_retries)
    }
}

/// Shared flag a caller flips to abandon an in-progress call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn is_cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.is_some_and(CancelToken::is_cancelled)
}

/// Sleep for `delay`, waking every [`WAIT_SLICE`] to check `cancel`.
pub fn sleep_cancellable(delay: Duration, cancel: Option<&CancelToken>) -> Result<(), ApiError> {
    let deadline = Instant::now() + delay;
    loop {
        if is_cancelled(cancel) {
            return Err(ApiError::cancelled());
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(WAIT_SLICE));
    }
}

/// Run `attempt_fn` until it succeeds, fails terminally, exhausts
/// `max_retries`, or `cancel` is set. The closure receives the zero-based
/// attempt number. The last error is returned unchanged.
pub fn with_retry<T>(
    operation: &str,
    policy: &RetryPolicy,
    max_retries: u32,
    cancel: Option<&CancelToken>,
    hook: &dyn ActivityHook,
    mut attempt_fn: impl FnMut(u32) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let mut rng = rand::thread_rng();
    let mut attempt = 0u32;

    loop {
        if is_cancelled(cancel) {
            let err = ApiError::cancelled();
            hook.record(
                &ActivityEvent::new(operation, ActivityAction::AttemptFailed, attempt)
                    .with_error(&err, ActivityLevel::Warn),
            );
            return Err(err);
        }

        hook.record(&ActivityEvent::new(operation, ActivityAction::Started, attempt));

        let err = match attempt_fn(attempt) {
            Ok(value) => {
                hook.record(&ActivityEvent::new(operation, ActivityAction::Succeeded, attempt));
                return Ok(value);
            }
            Err(err) => err,
        };

        let can_retry = attempt < max_retries && err.is_retryable();
        let level = if can_retry { ActivityLevel::Warn } else { ActivityLevel::Error };
        hook.record(
            &ActivityEvent::new(operation, ActivityAction::AttemptFailed, attempt)
                .with_error(&err, level),
        );
        if !can_retry {
            return Err(err);
        }

        let delay = policy.jittered_delay(attempt, &mut rng);
        hook.record(
            &ActivityEvent::new(operation, ActivityAction::RetryScheduled, attempt)
                .with_error(&err, ActivityLevel::Warn)
                .with_delay(delay),
        );
        sleep_cancellable(delay, cancel)?;
        attempt += 1;
    }
}

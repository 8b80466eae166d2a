//! Remote call discipline
//!
//! [`RetryPolicy`] bounds every remote call with a deadline and retries
//! retryable failures with exponential backoff plus jitter. [`CallPacer`]
//! enforces a minimum spacing between consecutive calls independently of any
//! backoff.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, warn};

use crate::config::ExecutionConfig;
use crate::error::{GuardError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub call_timeout: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Jitter as a fraction of the computed delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            max_attempts: config.max_retry_attempts.max(1),
            call_timeout: Duration::from_secs(config.api_timeout_secs),
            min_wait: Duration::from_millis(config.retry_min_wait_ms),
            max_wait: Duration::from_millis(config.retry_max_wait_ms),
            jitter_factor: config.retry_jitter.clamp(0.0, 1.0),
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Formula: clamp(min_wait * 2^(retry-1) +/- jitter, min_wait, max_wait)
    pub fn backoff_delay<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let base = self.min_wait.saturating_mul(1u32 << exponent);
        let capped = base.min(self.max_wait);

        let jitter_range = capped.as_secs_f64() * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let secs = (capped.as_secs_f64() + jitter).max(0.0);

        Duration::from_secs_f64(secs).clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }

    /// Run one attempt of `fut` under the call deadline
    pub async fn timed<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GuardError::Timeout {
                operation: operation.to_string(),
                elapsed_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }

    /// Run `op` with pacing, deadline and retries.
    ///
    /// Non-retryable errors are returned as-is after the first failure.
    /// Exhausting the budget yields `GuardError::TimedOutTerminal`.
    pub async fn call<T, F, Fut>(&self, operation: &str, pacer: &CallPacer, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            pacer.wait_turn().await;

            match self.timed(operation, op()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        error!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "remote call failed, retries exhausted"
                        );
                        return Err(GuardError::TimedOutTerminal {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = self.backoff_delay(attempt, &mut rand::thread_rng());
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "remote call failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Minimum spacing between remote calls, shared by every call site that talks
/// to the same exchange.
#[derive(Debug)]
pub struct CallPacer {
    spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(Duration::from_millis(config.min_call_spacing_ms))
    }

    /// Wait until `spacing` has passed since the previous call, then claim the slot
    pub async fn wait_turn(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.spacing;
            if Instant::now() < ready_at {
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

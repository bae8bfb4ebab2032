//! Bounded retry with exponential backoff for gateway calls

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::PersistenceConfig;
use crate::error::{GatewayError, PersistenceError, panic_message};

/// Retry schedule for one gateway call.
///
/// Attempt `n` (1-based) is followed by a delay of
/// `base_delay · multiplier^(n-1)`, capped at `max_delay`. All attempts and
/// delays together must finish within `overall_timeout`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    overall_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms),
            overall_timeout: Duration::from_millis(config.overall_timeout_ms.max(1)),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Run `call` until it succeeds, attempts run out, or the overall
    /// timeout elapses. A panicking call counts as a failed attempt.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let attempts = async {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let outcome = match AssertUnwindSafe(call()).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => Err(GatewayError::new(format!(
                        "gateway panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                };
                match outcome {
                    Ok(value) => {
                        if attempt > 1 {
                            debug!(operation, attempt, "Gateway call succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(e) if attempt >= self.max_attempts => {
                        warn!(operation, attempts = attempt, error = %e, "Gateway call failed, giving up");
                        return Err(PersistenceError::Exhausted {
                            operation,
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    Err(e) => {
                        let delay = self.delay_after(attempt);
                        debug!(operation, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Gateway call failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        };

        match tokio::time::timeout(self.overall_timeout, attempts).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(self.overall_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(operation, timeout_ms, "Gateway call timed out");
                Err(PersistenceError::TimedOut {
                    operation,
                    timeout_ms,
                })
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&PersistenceConfig::default())
    }
}

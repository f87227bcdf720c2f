use super::ClusterError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Backoff schedule for operations that may hit a not-yet-reachable host.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Same delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Delay to wait after the `failures`-th failed attempt (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Retries transient failures under a `RetryPolicy`, aborting on anything else.
pub struct RetryHandler {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Attempts made so far, including the successful one.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn run<T, F, Fut>(&mut self, mut operation: F) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClusterError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        loop {
            self.attempts += 1;
            match operation().await {
                Ok(result) => {
                    if self.attempts > 1 {
                        info!(attempts = self.attempts, "operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) if e.is_transient() && self.attempts < max_attempts => {
                    let delay = self.policy.delay_after(self.attempts);
                    warn!(
                        error = %e,
                        attempt = self.attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    error!(error = %e, attempts = self.attempts, "maximum attempts reached");
                    return Err(ClusterError::RetriesExhausted {
                        attempts: self.attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

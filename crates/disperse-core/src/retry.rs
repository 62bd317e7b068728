//! Retry strategies and backoff for remote calls
//!
//! Only errors that classify themselves as retryable (network failures,
//! timeouts, rate limiting, server errors) are re-run. Authentication,
//! not-found and validation failures return immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DisperseError, RemoteError};

/// Strategy type for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategyType {
    /// No delay between retries
    Immediate,
    /// Delay doubles each attempt
    #[default]
    Exponential,
    /// Delay increases linearly each attempt
    Linear,
    /// Same delay every attempt
    Constant,
}

/// Configuration for a retry strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryStrategyConfig {
    pub strategy: RetryStrategyType,
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 = none, 0.5 = delay * 0.5..1.5)
    pub jitter: f64,
}

impl Default for RetryStrategyConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategyType::Exponential,
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: 0.5,
        }
    }
}

impl RetryStrategyConfig {
    /// Retry immediately, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            strategy: RetryStrategyType::Immediate,
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Errors that know whether re-running the operation may help
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-provided hint for how long to wait
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for RemoteError {
    fn is_retryable(&self) -> bool {
        RemoteError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl Retryable for DisperseError {
    fn is_retryable(&self) -> bool {
        DisperseError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DisperseError::Remote(e) => Retryable::retry_after(e),
            _ => None,
        }
    }
}

/// Calculate the delay before retry number `attempt` (1-indexed).
pub fn calculate_delay(config: &RetryStrategyConfig, attempt: u32) -> Duration {
    let base = config.base_delay();
    let delay = match config.strategy {
        RetryStrategyType::Immediate => Duration::ZERO,
        RetryStrategyType::Exponential => {
            let pow = attempt.saturating_sub(1).min(16);
            base.saturating_mul(2_u32.saturating_pow(pow))
        }
        RetryStrategyType::Linear => base.saturating_mul(attempt),
        RetryStrategyType::Constant => base,
    };

    let capped = delay.min(config.max_delay());

    if config.jitter > 0.0 {
        apply_jitter(capped, config.jitter)
    } else {
        capped
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    let random_value: f64 = rand::thread_rng().gen();
    let factor = 1.0 - jitter + random_value * 2.0 * jitter;
    let millis = (delay.as_millis() as f64 * factor).round().max(0.0) as u64;
    Duration::from_millis(millis)
}

/// Run `op` until it succeeds, fails permanently or runs out of attempts.
pub async fn retry<T, E, F, Fut>(
    config: &RetryStrategyConfig,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = e
                    .retry_after()
                    .map(|d| d.min(config.max_delay()))
                    .unwrap_or_else(|| calculate_delay(config, attempt));
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(operation, attempt, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

//! Bounded retry with escalating delay for external service calls.

use std::future::Future;
use std::time::Duration;

use enricher_shared::{EnricherError, Result, RetryConfig};
use tokio::time::sleep;
use tracing::warn;

/// Outcome classification of a single failed service attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Worth retrying: empty body, unparseable output, throttling, 5xx, transport.
    #[error("transient: {0}")]
    Transient(String),

    /// Retrying cannot help: auth failure, bad request, refusal.
    #[error("terminal: {0}")]
    Terminal(String),
}

impl ServiceError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Terminal(m) => m,
        }
    }
}

/// Retry schedule: `max_attempts` calls in total, the n-th retry waiting
/// `initial_delay * backoff_factor^(n-1)`, optionally capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// A policy that calls once and never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: None,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_before(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `operation` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Exhaustion and terminal failures become [`EnricherError::Service`]
    /// carrying the number of attempts made.
    pub async fn run<F, Fut, T>(&self, service: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ServiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(ServiceError::Terminal(msg)) => {
                    return Err(EnricherError::service(service, attempt, msg));
                }
                Err(ServiceError::Transient(msg)) if attempt >= max_attempts => {
                    return Err(EnricherError::service(service, attempt, msg));
                }
                Err(ServiceError::Transient(msg)) => {
                    let delay = self.delay_before(attempt);
                    warn!(
                        service,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }
}

// Bounded retries with deterministic exponential backoff around a single
// provider adapter.

use crate::config::ServiceConfig;
use crate::provider::{GenerationResult, ProviderAdapter, ProviderError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, warn};

/// Growth factor of the backoff schedule. Attempt `k` waits
/// `BACKOFF_FACTOR^k * base_backoff` before attempt `k + 1`.
pub const BACKOFF_FACTOR: u32 = 2;

#[derive(Error, Debug)]
pub enum RetryError {
    /// All attempts against one adapter failed; wraps the last failure.
    #[error("{provider} generation failed after {attempts} attempts: {source}")]
    Exhausted {
        provider: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },
    /// The caller's deadline elapsed before the next attempt could start.
    #[error("deadline exceeded before generation completed")]
    DeadlineExceeded,
}

/// Executes one adapter call with up to `max_retries` attempts. Attempt 1 is
/// the first try; only failures trigger backoff. Every invocation resolves to
/// exactly one success or exactly one error.
pub struct RetryExecutor {
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryExecutor {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.max_retries, config.base_backoff)
    }

    /// Runs the generation call against `adapter` until it succeeds, the
    /// attempt budget is spent, or `deadline` elapses.
    pub async fn run(
        &self,
        adapter: &dyn ProviderAdapter,
        prompt: &str,
        system_prompt: &str,
        deadline: Option<Instant>,
    ) -> Result<GenerationResult, RetryError> {
        let mut attempt: u32 = 1;

        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(RetryError::DeadlineExceeded);
                }
            }

            match adapter.generate(prompt, system_prompt).await {
                Ok(result) => {
                    debug!(
                        provider = adapter.id(),
                        attempt, "Generation succeeded"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    if attempt >= self.max_retries {
                        warn!(
                            provider = adapter.id(),
                            attempts = attempt,
                            error = %err,
                            "Generation attempts exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            provider: adapter.id().to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }

                    let delay = self.backoff_delay(attempt);
                    warn!(
                        provider = adapter.id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Generation attempt failed, backing off"
                    );
                    self.wait(delay, deadline).await?;
                    attempt += 1;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_backoff * BACKOFF_FACTOR.pow(attempt)
    }

    /// Sleeps for `delay`, racing the caller's deadline so a stale attempt is
    /// never started after the deadline has passed.
    async fn wait(&self, delay: Duration, deadline: Option<Instant>) -> Result<(), RetryError> {
        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = sleep(delay) => Ok(()),
                    _ = sleep_until(deadline) => Err(RetryError::DeadlineExceeded),
                }
            }
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }
}

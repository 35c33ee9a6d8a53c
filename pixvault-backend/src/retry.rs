//! Retry with exponential backoff for transient store failures
//!

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use pixvault_shared::error::VaultError;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
/// Ceiling for a single backoff step
pub const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each one after
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.max(1) - 1;
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(MAX_DELAY.max(self.initial_delay))
            .with_factor(2.0)
            .with_max_times(retries as usize)
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error,
    /// or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, VaultError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VaultError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        operation
            .retry(self.backoff())
            .sleep(tokio::time::sleep)
            .when(|err: &VaultError| err.is_transient())
            .notify(|err: &VaultError, delay: Duration| {
                warn!(
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "store operation failed, retrying"
                );
            })
            .await
    }
}

pub async fn with_retry<T, F, Fut>(
    operation: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, VaultError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VaultError>>,
{
    RetryPolicy::new(max_attempts, initial_delay)
        .run(operation)
        .await
}

//! Provider retry logic
//!
//! Linear backoff between attempts: after failed attempt N the wrapper waits
//! N × `backoff_base` before trying again.

use std::future::Future;
use std::time::{Duration, Instant};

use geotest_common::config::AnalysisSettings;

use super::ProviderError;

/// Attempt budget and backoff unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts (first try included), at least 1
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
        }
    }

    /// Delay after failed attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. On error with attempts left: log WARN, sleep attempt × backoff_base, retry
/// 4. On error with no attempts left: log ERROR, return the last error
///
/// Every error kind is retried; callers decide afterwards how to degrade.
///
/// # Arguments
/// * `operation_name` - Name for logging (usually the provider display name)
/// * `policy` - Attempt budget and backoff unit
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        tracing::debug!(
            operation = operation_name,
            attempt,
            max_attempts,
            "Provider attempt"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Provider call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Provider call failed: attempts exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.backoff_for(attempt);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Provider call failed, will retry after backoff"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

// ============================================================================
// Storage Retry
// ============================================================================
//
// Bounded retry around operations that touch the database. Each attempt must
// open its own unit of work (Database::transact / unit_of_work), so the work
// of a failed attempt is already rolled back when the next one starts.
//
// Only transient storage errors are retried; anything else fails fast.
//
// ============================================================================

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::error::is_transient;
use crate::{Database, UnitOfWork};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts. Zero only yields to the scheduler.
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` is reached. The last error is returned on
/// exhaustion.
pub async fn retry_transient<F, Fut, T>(operation: &str, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation, attempt, "storage operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_transient(&err) {
            return Err(err);
        }

        if attempt >= max_attempts {
            error!(
                operation,
                attempts = attempt,
                error = %err,
                "storage operation failed, retries exhausted"
            );
            return Err(err);
        }

        warn!(
            operation,
            attempt,
            max_attempts,
            error = %err,
            "transient storage failure, retrying on a fresh unit of work"
        );

        if policy.pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(policy.pause).await;
        }
    }
}

impl Database {
    /// [`Database::unit_of_work`] under [`retry_transient`]. Each attempt runs
    /// a fresh copy of `f` in its own unit of work. Keep side effects outside
    /// the store out of `f`; they would repeat with every attempt.
    pub async fn unit_of_work_with_retry<F, T>(
        &self,
        operation: &str,
        policy: RetryPolicy,
        f: F,
    ) -> Result<T>
    where
        F: Fn(&UnitOfWork<'_>) -> Result<T> + Clone + Send + 'static,
        T: Send + 'static,
    {
        retry_transient(operation, policy, || self.unit_of_work(f.clone())).await
    }
}

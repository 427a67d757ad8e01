//! # Busy-Database Retry
//!
//! SQLite allows one writer. A register that finds the write lock held waits
//! up to the busy timeout inside SQLite, then gets `SQLITE_BUSY`. This module
//! retries the whole operation with exponential backoff, a bounded number of
//! times.
//!
//! ```text
//! attempt 1 ── Busy ──► sleep ~50ms
//! attempt 2 ── Busy ──► sleep ~100ms
//! attempt 3 ── Busy ──► sleep ~200ms
//! ...
//! attempt N ── Busy ──► LedgerError::TransientStorage { operation, attempts: N }
//! ```
//!
//! Each attempt is a fresh transaction. Business rejections are returned
//! immediately; only [`LedgerError::is_retryable`] errors are retried.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{LedgerError, LedgerResult};

/// How hard to retry a busy database.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_backoff: Duration,

    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.create_backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if attempt >= max_attempts {
                    error!(operation, attempts = attempt, error = %e, "Storage still busy, giving up");
                    return Err(LedgerError::TransientStorage {
                        operation: operation.to_string(),
                        attempts: attempt,
                    });
                }

                let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
                warn!(operation, attempt, ?delay, error = %e, "Storage busy, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use till_core::CoreError;
    use till_db::DbError;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retries_busy_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(5), "op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbError::Busy("database is locked".into()).into())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_with_transient_error() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_retry(&fast(3), "create_sale", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Busy("database is locked".into()).into())
        })
        .await;

        match result {
            Err(LedgerError::TransientStorage { operation, attempts }) => {
                assert_eq!(operation, "create_sale");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_retry(&fast(5), "void_sale", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::AlreadyVoided { sale_id: 1 }.into())
        })
        .await;

        assert!(matches!(
            result,
            Err(LedgerError::Domain(CoreError::AlreadyVoided { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

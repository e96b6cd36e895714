//! Timeout helpers for bounded database work.
//!
//! A timed-out future is dropped, and dropping an open `sqlx::Transaction`
//! rolls it back, so a timeout never leaves a partial write behind.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

/// Default timeout for database queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for long-running operations (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Raised when an operation exceeds its time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Database operation timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Run `future` with a deadline, mapping expiry into the caller's error type
///
/// # Example
///
/// ```no_run
/// use ringside::{LedgerError, db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT}};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), LedgerError> {
///
/// let row = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
///     Ok::<_, LedgerError>(sqlx::query("SELECT 1").fetch_one(pool).await?)
/// })
/// .await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(TimeoutError(duration).into()),
    }
}

/// Run `future` with the default query timeout (5 seconds)
pub async fn with_default_timeout<F, T, E>(future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Timeout,
        Inner,
    }

    impl From<TimeoutError> for TestError {
        fn from(_: TimeoutError) -> Self {
            TestError::Timeout
        }
    }

    #[tokio::test]
    async fn test_timeout_constants() {
        assert_eq!(DEFAULT_QUERY_TIMEOUT.as_secs(), 5);
        assert_eq!(DEFAULT_TRANSACTION_TIMEOUT.as_secs(), 10);
        assert_eq!(LONG_OPERATION_TIMEOUT.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_timeout_error_display() {
        let err = TimeoutError(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }

    #[tokio::test]
    async fn test_expired_future_maps_to_timeout() {
        let result: Result<(), TestError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(TestError::Timeout));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<(), TestError> =
            with_timeout(Duration::from_secs(1), async { Err(TestError::Inner) }).await;
        assert_eq!(result, Err(TestError::Inner));
    }
}

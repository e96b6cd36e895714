//! Error types for the security module

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for throttle checks
pub type ThrottleResult<T> = Result<T, RateLimitError>;

/// Raised when a client has exhausted its failed-login budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Too many failed attempts, retry after {retry_after_secs} seconds")]
pub struct RateLimitError {
    /// Attempts left before blocking (always 0 once blocked)
    pub remaining: u32,
    /// Failures allowed per window
    pub limit: u32,
    /// When the current window ends
    pub reset_time: DateTime<Utc>,
    /// Whole seconds until `reset_time`, rounded up
    pub retry_after_secs: u64,
}

impl RateLimitError {
    pub fn new(remaining: u32, limit: u32, reset_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let millis = (reset_time - now).num_milliseconds().max(0) as u64;
        Self {
            remaining,
            limit,
            reset_time,
            retry_after_secs: millis.div_ceil(1000).max(1),
        }
    }

    pub fn client_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let err = RateLimitError::new(0, 5, now + Duration::milliseconds(2_001), now);
        assert_eq!(err.retry_after_secs, 3);
        assert!(err.to_string().contains("3 seconds"));
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let now = Utc::now();
        let err = RateLimitError::new(0, 5, now - Duration::seconds(1), now);
        assert_eq!(err.retry_after_secs, 1);
    }
}

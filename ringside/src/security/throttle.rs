//! Sliding-window login throttle keyed by client IP.

use super::{
    errors::{RateLimitError, ThrottleResult},
    store::{AttemptCounter, AttemptStore, InMemoryAttemptStore},
};
use crate::{
    env,
    validation::{ValidationErrors, Validator},
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// Throttle configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Window length; every failure restarts it
    pub window: Duration,

    /// Failures that block the client
    pub max_attempts: u32,

    /// How often expired counters are swept
    pub sweep_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(10_000),
            max_attempts: 5,
            sweep_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl ThrottleConfig {
    /// Create configuration from environment variables
    ///
    /// - `LOGIN_THROTTLE_WINDOW_MS` (default: 10000)
    /// - `LOGIN_THROTTLE_MAX_ATTEMPTS` (default: 5)
    /// - `LOGIN_THROTTLE_SWEEP_SECS` (default: 900)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window: Duration::from_millis(env::parse_or(
                "LOGIN_THROTTLE_WINDOW_MS",
                defaults.window.as_millis() as u64,
            )),
            max_attempts: env::parse_or("LOGIN_THROTTLE_MAX_ATTEMPTS", defaults.max_attempts),
            sweep_interval: Duration::from_secs(env::parse_or(
                "LOGIN_THROTTLE_SWEEP_SECS",
                defaults.sweep_interval.as_secs(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(!self.window.is_zero(), "window", "must be non-zero")
            .check(self.max_attempts > 0, "max_attempts", "must be positive")
            .check(
                !self.sweep_interval.is_zero(),
                "sweep_interval",
                "must be non-zero",
            );
        v.finish(())
    }

    fn window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX)
    }
}

/// Counter state reported after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStatus {
    pub count: u32,
    /// `max(0, max_attempts - count)`
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    pub is_blocked: bool,
}

/// Per-IP failed-login throttle
pub struct LoginThrottle {
    store: Arc<dyn AttemptStore>,
    config: ThrottleConfig,
}

impl LoginThrottle {
    pub fn new(store: Arc<dyn AttemptStore>, config: ThrottleConfig) -> Self {
        Self { store, config }
    }

    /// Throttle backed by process memory
    pub fn in_memory(config: ThrottleConfig) -> Self {
        Self::new(Arc::new(InMemoryAttemptStore::new()), config)
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Count a failed login from `ip`
    ///
    /// Starts a fresh window when there is no live counter, otherwise increments
    /// it and pushes its reset time to `now + window`.
    pub async fn record_failed_attempt(&self, ip: &str) -> AttemptStatus {
        self.record_failed_attempt_at(ip, Utc::now()).await
    }

    /// Forget `ip`'s failures, typically after a successful login
    pub async fn clear_failed_attempts(&self, ip: &str) {
        self.store.delete(ip.trim()).await;
    }

    /// Whether `ip` has a live counter at or above the limit
    pub async fn is_blocked(&self, ip: &str) -> bool {
        self.is_blocked_at(ip, Utc::now()).await
    }

    /// Reject a blocked client before its credentials are checked
    pub async fn check(&self, ip: &str) -> ThrottleResult<()> {
        self.check_at(ip, Utc::now()).await
    }

    /// Drop expired counters, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let removed = self.store.sweep(Utc::now()).await;
        if removed > 0 {
            let remaining = self.store.tracked_keys().await;
            log::debug!(
                "Swept {removed} expired login attempt counters, {remaining} still tracked"
            );
        }
        removed
    }

    /// Sweep on `sweep_interval` until the returned handle is aborted
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }

    pub(crate) async fn record_failed_attempt_at(
        &self,
        ip: &str,
        now: DateTime<Utc>,
    ) -> AttemptStatus {
        let reset_time = now + self.config.window_chrono();
        let counter = self
            .store
            .update(ip.trim(), &|current| match current {
                Some(c) if !c.is_expired(now) => AttemptCounter {
                    count: c.count.saturating_add(1),
                    reset_time,
                },
                _ => AttemptCounter {
                    count: 1,
                    reset_time,
                },
            })
            .await;

        let status = self.status_of(counter);
        if status.is_blocked {
            log::warn!(
                "Login blocked for {} after {} failed attempts",
                ip.trim(),
                status.count
            );
        }
        status
    }

    pub(crate) async fn is_blocked_at(&self, ip: &str, now: DateTime<Utc>) -> bool {
        match self.store.get(ip.trim()).await {
            Some(counter) => !counter.is_expired(now) && counter.count >= self.config.max_attempts,
            None => false,
        }
    }

    pub(crate) async fn check_at(&self, ip: &str, now: DateTime<Utc>) -> ThrottleResult<()> {
        match self.store.get(ip.trim()).await {
            Some(counter) if !counter.is_expired(now) && counter.count >= self.config.max_attempts => {
                Err(RateLimitError::new(
                    0,
                    self.config.max_attempts,
                    counter.reset_time,
                    now,
                ))
            }
            _ => Ok(()),
        }
    }

    fn status_of(&self, counter: AttemptCounter) -> AttemptStatus {
        AttemptStatus {
            count: counter.count,
            remaining: self.config.max_attempts.saturating_sub(counter.count),
            reset_time: counter.reset_time,
            is_blocked: counter.count >= self.config.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const IP: &str = "198.51.100.4";

    fn throttle() -> LoginThrottle {
        LoginThrottle::in_memory(ThrottleConfig::default())
    }

    #[tokio::test]
    async fn test_blocks_on_fifth_failure() {
        let throttle = throttle();
        let now = Utc::now();

        for expected in 1..=4u32 {
            let status = throttle.record_failed_attempt_at(IP, now).await;
            assert_eq!(status.count, expected);
            assert_eq!(status.remaining, 5 - expected);
            assert!(!status.is_blocked);
        }

        let fifth = throttle.record_failed_attempt_at(IP, now).await;
        assert!(fifth.is_blocked);
        assert_eq!(fifth.remaining, 0);
        assert!(throttle.is_blocked_at(IP, now).await);
    }

    #[tokio::test]
    async fn test_sixth_failure_stays_blocked_and_slides_window() {
        let throttle = throttle();
        let start = Utc::now();
        for _ in 0..5 {
            throttle.record_failed_attempt_at(IP, start).await;
        }

        let later = start + chrono::Duration::seconds(3);
        let sixth = throttle.record_failed_attempt_at(IP, later).await;
        assert_eq!(sixth.count, 6);
        assert_eq!(sixth.remaining, 0);
        assert!(sixth.is_blocked);
        assert_eq!(sixth.reset_time, later + chrono::Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_success_clears_counter() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failed_attempt(IP).await;
        }
        assert!(throttle.is_blocked(IP).await);

        throttle.clear_failed_attempts(IP).await;
        assert!(!throttle.is_blocked(IP).await);
        assert_eq!(throttle.record_failed_attempt(IP).await.count, 1);
    }

    #[tokio::test]
    async fn test_window_expiry_unblocks_and_restarts() {
        let throttle = throttle();
        let start = Utc::now();
        for _ in 0..5 {
            throttle.record_failed_attempt_at(IP, start).await;
        }

        let expired = start + chrono::Duration::milliseconds(10_000);
        assert!(!throttle.is_blocked_at(IP, expired).await);
        assert!(throttle.check_at(IP, expired).await.is_ok());

        let fresh = throttle.record_failed_attempt_at(IP, expired).await;
        assert_eq!(fresh.count, 1);
        assert!(!fresh.is_blocked);
    }

    #[tokio::test]
    async fn test_check_reports_limit_and_retry_after() {
        let throttle = throttle();
        let now = Utc::now();
        for _ in 0..5 {
            throttle.record_failed_attempt_at(IP, now).await;
        }

        let err = throttle.check_at(IP, now).await.unwrap_err();
        assert_eq!(err.remaining, 0);
        assert_eq!(err.limit, 5);
        assert_eq!(err.retry_after_secs, 10);
        assert_eq!(err.reset_time, now + chrono::Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_ips_are_independent() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failed_attempt(IP).await;
        }
        assert!(throttle.check("192.0.2.1").await.is_ok());
        assert!(throttle.check(&format!(" {IP} ")).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_counters() {
        let throttle = LoginThrottle::in_memory(ThrottleConfig {
            window: Duration::from_millis(1),
            ..ThrottleConfig::default()
        });
        throttle
            .record_failed_attempt_at(IP, Utc::now() - chrono::Duration::seconds(5))
            .await;
        assert_eq!(throttle.sweep().await, 1);
        assert!(!throttle.is_blocked(IP).await);
    }

    #[test]
    fn test_default_config() {
        let config = ThrottleConfig::default();
        assert_eq!(config.window.as_millis(), 10_000);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.sweep_interval.as_secs(), 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("LOGIN_THROTTLE_WINDOW_MS", "2500");
            std::env::set_var("LOGIN_THROTTLE_MAX_ATTEMPTS", "3");
        }
        let config = ThrottleConfig::from_env();
        unsafe {
            std::env::remove_var("LOGIN_THROTTLE_WINDOW_MS");
            std::env::remove_var("LOGIN_THROTTLE_MAX_ATTEMPTS");
        }
        assert_eq!(config.window, Duration::from_millis(2_500));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let config = ThrottleConfig {
            max_attempts: 0,
            ..ThrottleConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().fields(), vec!["max_attempts"]);
    }
}

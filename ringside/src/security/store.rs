//! Attempt counter storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Failed-attempt counter for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCounter {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

impl AttemptCounter {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_time <= now
    }
}

/// Storage for attempt counters
///
/// `update` must apply its closure atomically with respect to other calls on
/// the same key, so that concurrent failures are never lost.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<AttemptCounter>;

    async fn set(&self, key: &str, counter: AttemptCounter);

    async fn delete(&self, key: &str);

    /// Replace the counter with `f(current)` and return the new value
    async fn update(
        &self,
        key: &str,
        f: &(dyn Fn(Option<AttemptCounter>) -> AttemptCounter + Send + Sync),
    ) -> AttemptCounter;

    /// Remove every counter expired at `now`, returning how many were removed
    async fn sweep(&self, now: DateTime<Utc>) -> usize;

    /// Number of counters currently held
    async fn tracked_keys(&self) -> usize;
}

/// Process-local counter store
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    counters: RwLock<HashMap<String, AttemptCounter>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn get(&self, key: &str) -> Option<AttemptCounter> {
        self.counters.read().await.get(key).copied()
    }

    async fn set(&self, key: &str, counter: AttemptCounter) {
        self.counters.write().await.insert(key.to_string(), counter);
    }

    async fn delete(&self, key: &str) {
        self.counters.write().await.remove(key);
    }

    async fn update(
        &self,
        key: &str,
        f: &(dyn Fn(Option<AttemptCounter>) -> AttemptCounter + Send + Sync),
    ) -> AttemptCounter {
        let mut counters = self.counters.write().await;
        let next = f(counters.get(key).copied());
        counters.insert(key.to_string(), next);
        next
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut counters = self.counters.write().await;
        let before = counters.len();
        counters.retain(|_, counter| !counter.is_expired(now));
        before - counters.len()
    }

    async fn tracked_keys(&self) -> usize {
        self.counters.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = InMemoryAttemptStore::new();
        let now = Utc::now();
        store
            .set(
                "old",
                AttemptCounter {
                    count: 3,
                    reset_time: now - Duration::seconds(1),
                },
            )
            .await;
        store
            .set(
                "fresh",
                AttemptCounter {
                    count: 1,
                    reset_time: now + Duration::seconds(10),
                },
            )
            .await;

        assert_eq!(store.tracked_keys().await, 2);
        assert_eq!(store.sweep(now).await, 1);
        assert_eq!(store.tracked_keys().await, 1);
        assert!(store.get("old").await.is_none());
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = std::sync::Arc::new(InMemoryAttemptStore::new());
        let reset_time = Utc::now() + Duration::seconds(60);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update("ip", &|current| AttemptCounter {
                            count: current.map_or(0, |c| c.count) + 1,
                            reset_time,
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("ip").await.unwrap().count, 50);
    }
}

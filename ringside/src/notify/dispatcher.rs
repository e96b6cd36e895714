//! Notification dispatcher: persisted notifications plus a broadcast channel.

use super::models::{Event, Notification, NotificationKind};
use crate::ledger::{LedgerError, LedgerResult};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events buffered per subscriber before the slowest one starts lagging
pub const EVENT_BUFFER: usize = 1024;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, data, is_read, created_at";

/// Notification dispatcher
#[derive(Clone)]
pub struct NotificationDispatcher {
    pool: Arc<PgPool>,
    sender: broadcast::Sender<Event>,
}

impl NotificationDispatcher {
    pub fn new(pool: Arc<PgPool>) -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { pool, sender }
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Fire-and-forget broadcast
    pub fn publish(&self, event: Event) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            log::trace!("No subscribers for {name} event");
        }
    }

    /// Persist a notification for one user, then publish it
    ///
    /// Returns `None` when the insert failed; the failure is logged and the
    /// caller carries on.
    pub async fn notify(
        &self,
        user_id: i64,
        kind: NotificationKind,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Option<Notification> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO notifications (user_id, kind, title, body, data)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(body)
        .bind(&data)
        .fetch_one(self.pool.as_ref())
        .await
        .and_then(|row| Notification::from_row(&row));

        match inserted {
            Ok(notification) => {
                self.publish(Event::Notification {
                    user_id,
                    notification: notification.clone(),
                });
                Some(notification)
            }
            Err(e) => {
                log::error!(
                    "Failed to store {} notification for user {}: {}",
                    kind.as_str(),
                    user_id,
                    e
                );
                None
            }
        }
    }

    /// Newest first; `limit` is clamped to `1..=100`
    pub async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: i64,
    ) -> LedgerResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.clamp(1, 100))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .iter()
            .map(Notification::from_row)
            .collect::<Result<_, _>>()?)
    }

    pub async fn unread_count(&self, user_id: i64) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    /// Mark one of the user's notifications read; other users' ids are not found
    pub async fn mark_read(
        &self,
        user_id: i64,
        notification_id: i64,
    ) -> LedgerResult<Notification> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET is_read = TRUE
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| LedgerError::not_found("Notification", notification_id))?;

        Ok(Notification::from_row(&row)?)
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self, user_id: i64) -> LedgerResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Corner;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_dispatcher() -> NotificationDispatcher {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        NotificationDispatcher::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let dispatcher = lazy_dispatcher();
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.publish(Event::FightResult {
            fight_id: 4,
            winner: Corner::A,
        });

        match rx.recv().await.unwrap() {
            Event::FightResult { fight_id, winner } => {
                assert_eq!(fight_id, 4);
                assert_eq!(winner, Corner::A);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let dispatcher = lazy_dispatcher();
        dispatcher.publish(Event::FightResult {
            fight_id: 1,
            winner: Corner::B,
        });
        assert_eq!(dispatcher.subscriber_count(), 0);
    }
}

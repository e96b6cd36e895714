//! Notification and event models.

use crate::{betting::BetStatus, ledger::Corner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};

/// Category of a persisted notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BetWon,
    BetLost,
    BetRefunded,
    BetAccepted,
    BetPostponed,
    DepositConfirmed,
    DepositFailed,
    WithdrawalConfirmed,
    WithdrawalFailed,
    Bonus,
    Penalty,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::BetWon => "bet_won",
            NotificationKind::BetLost => "bet_lost",
            NotificationKind::BetRefunded => "bet_refunded",
            NotificationKind::BetAccepted => "bet_accepted",
            NotificationKind::BetPostponed => "bet_postponed",
            NotificationKind::DepositConfirmed => "deposit_confirmed",
            NotificationKind::DepositFailed => "deposit_failed",
            NotificationKind::WithdrawalConfirmed => "withdrawal_confirmed",
            NotificationKind::WithdrawalFailed => "withdrawal_failed",
            NotificationKind::Bonus => "bonus",
            NotificationKind::Penalty => "penalty",
        }
    }
}

/// Persisted notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get("kind")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            data: row.try_get("data")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Event pushed to live subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all_fields = "camelCase")]
pub enum Event {
    /// A bet changed status
    #[serde(rename = "bet:update")]
    BetUpdate {
        user_id: i64,
        bet_id: i64,
        fight_id: i64,
        status: BetStatus,
        actual_win: i64,
    },

    /// A fight result was recorded; delivered to everyone
    #[serde(rename = "fight:result")]
    FightResult { fight_id: i64, winner: Corner },

    /// A notification was persisted for one user
    #[serde(rename = "notification")]
    Notification {
        user_id: i64,
        notification: Notification,
    },
}

impl Event {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Event::BetUpdate { .. } => "bet:update",
            Event::FightResult { .. } => "fight:result",
            Event::Notification { .. } => "notification",
        }
    }

    /// The only user who should receive this event, `None` for broadcasts
    pub fn recipient(&self) -> Option<i64> {
        match self {
            Event::BetUpdate { user_id, .. } | Event::Notification { user_id, .. } => {
                Some(*user_id)
            }
            Event::FightResult { .. } => None,
        }
    }

    /// Whether `user_id` should see this event
    pub fn is_visible_to(&self, user_id: i64) -> bool {
        self.recipient().is_none_or(|r| r == user_id)
    }
}

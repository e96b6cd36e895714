//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};

/// Wallet model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: i64,
    /// Spendable funds
    pub balance: i64,
    /// Promotional credit, not spendable on bets
    pub bonus_balance: i64,
    /// Funds reserved by pending withdrawals
    pub locked_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            balance: row.try_get("balance")?,
            bonus_balance: row.try_get("bonus_balance")?,
            locked_balance: row.try_get("locked_balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Everything the user owns, locked funds included
    pub fn total(&self) -> i64 {
        self.balance
            .saturating_add(self.bonus_balance)
            .saturating_add(self.locked_balance)
    }
}

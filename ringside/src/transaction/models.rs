//! Transaction data models and their wallet effects.

use crate::ledger::{CommissionPolicy, LedgerError, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    BetPlaced,
    BetWin,
    BetRefund,
    Commission,
    Bonus,
    Penalty,
}

impl TransactionType {
    pub const ALL: [TransactionType; 8] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::BetPlaced,
        TransactionType::BetWin,
        TransactionType::BetRefund,
        TransactionType::Commission,
        TransactionType::Bonus,
        TransactionType::Penalty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::BetPlaced => "BET_PLACED",
            TransactionType::BetWin => "BET_WIN",
            TransactionType::BetRefund => "BET_REFUND",
            TransactionType::Commission => "COMMISSION",
            TransactionType::Bonus => "BONUS",
            TransactionType::Penalty => "PENALTY",
        }
    }

    /// Deposits and withdrawals go through a payment provider and start PENDING
    pub fn is_external(self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Withdrawal)
    }

    /// Wallet effect of writing an internal row, which is confirmed immediately
    pub fn record_effect(self, policy: CommissionPolicy) -> WalletEffect {
        match self {
            TransactionType::Deposit => WalletEffect::None,
            TransactionType::Withdrawal => WalletEffect::Lock,
            TransactionType::BetPlaced | TransactionType::Penalty => WalletEffect::Debit,
            TransactionType::BetWin | TransactionType::BetRefund => WalletEffect::Credit,
            TransactionType::Bonus => WalletEffect::CreditBonus,
            TransactionType::Commission => match policy {
                CommissionPolicy::Bookkeeping => WalletEffect::None,
                CommissionPolicy::HouseLedger { .. } => WalletEffect::Credit,
            },
        }
    }

    /// Wallet effect of a provider settling a PENDING row
    pub fn confirm_effect(self, outcome: ProviderOutcome) -> WalletEffect {
        match (self, outcome) {
            (TransactionType::Deposit, ProviderOutcome::Confirmed) => WalletEffect::Credit,
            (TransactionType::Withdrawal, ProviderOutcome::Confirmed) => {
                WalletEffect::SettleLocked
            }
            (TransactionType::Withdrawal, ProviderOutcome::Failed) => WalletEffect::ReleaseLocked,
            _ => WalletEffect::None,
        }
    }

    /// Wallet effect of the owner cancelling a PENDING row
    pub fn cancel_effect(self) -> WalletEffect {
        match self {
            TransactionType::Withdrawal => WalletEffect::ReleaseLocked,
            _ => WalletEffect::None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LedgerError::Corrupt(format!("unknown transaction type {s:?}")))
    }
}

/// Transaction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Confirmed => "CONFIRMED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != TransactionStatus::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "CONFIRMED" => Ok(TransactionStatus::Confirmed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(LedgerError::Corrupt(format!(
                "unknown transaction status {other:?}"
            ))),
        }
    }
}

/// Result reported by a payment provider for a PENDING transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderOutcome {
    Confirmed,
    Failed,
}

impl From<ProviderOutcome> for TransactionStatus {
    fn from(outcome: ProviderOutcome) -> Self {
        match outcome {
            ProviderOutcome::Confirmed => TransactionStatus::Confirmed,
            ProviderOutcome::Failed => TransactionStatus::Failed,
        }
    }
}

/// How a transaction changes the owner's wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEffect {
    None,
    Credit,
    Debit,
    CreditBonus,
    Lock,
    ReleaseLocked,
    SettleLocked,
}

/// Transaction model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub status: TransactionStatus,
    pub provider: Option<String>,
    pub external_ref: Option<String>,
    pub bet_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, LedgerError> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get::<String, _>("kind")?.parse()?,
            amount: row.try_get("amount")?,
            status: row.try_get::<String, _>("status")?.parse()?,
            provider: row.try_get("provider")?,
            external_ref: row.try_get("external_ref")?,
            bet_id: row.try_get("bet_id")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Stored amounts are positive by table constraint
    pub(crate) fn money(&self) -> Result<Money, LedgerError> {
        Money::new(self.amount).map_err(|_| {
            LedgerError::Corrupt(format!("transaction {} has amount {}", self.id, self.amount))
        })
    }
}

/// An internal money movement to be applied and recorded as CONFIRMED
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub user_id: i64,
    pub kind: TransactionType,
    pub amount: Money,
    pub bet_id: Option<i64>,
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn new(user_id: i64, kind: TransactionType, amount: Money) -> Self {
        Self {
            user_id,
            kind,
            amount,
            bet_id: None,
            description: None,
        }
    }

    pub fn for_bet(mut self, bet_id: i64) -> Self {
        self.bet_id = Some(bet_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

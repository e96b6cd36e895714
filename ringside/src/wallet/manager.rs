//! Wallet manager: guarded balance updates.
//!
//! Every debit-like mutation is a single `UPDATE ... WHERE <column> >= $amount
//! RETURNING ...` statement. Concurrent debits on the same wallet serialize on
//! the row lock, and the loser sees no row instead of a negative balance.

use super::models::Wallet;
use crate::ledger::{LedgerError, LedgerResult, Money};
use sqlx::{PgConnection, PgPool, Row};
use std::sync::Arc;

const WALLET_COLUMNS: &str =
    "user_id, balance, bonus_balance, locked_balance, created_at, updated_at";

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
}

impl WalletManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a user's wallet
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - The user has no wallet
    pub async fn get_wallet(&self, user_id: i64) -> LedgerResult<Wallet> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user_id).await
    }

    /// Get a user's spendable balance
    pub async fn get_balance(&self, user_id: i64) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::not_found("Wallet", user_id))?;

        Ok(row.try_get("balance")?)
    }

    pub(crate) async fn fetch(conn: &mut PgConnection, user_id: i64) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Wallet", user_id))?;

        Ok(Wallet::from_row(&row)?)
    }

    /// Create an empty (or pre-funded) wallet for a freshly inserted user
    pub(crate) async fn create(
        conn: &mut PgConnection,
        user_id: i64,
        initial_balance: i64,
    ) -> LedgerResult<Wallet> {
        if initial_balance < 0 {
            return Err(LedgerError::invalid(
                "initial_balance",
                "must not be negative",
            ));
        }

        let row = sqlx::query(&format!(
            "INSERT INTO wallets (user_id, balance) VALUES ($1, $2) RETURNING {WALLET_COLUMNS}"
        ))
        .bind(user_id)
        .bind(initial_balance)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Wallet::from_row(&row)?)
    }

    /// Increase `balance`
    pub(crate) async fn credit(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
    ) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "UPDATE wallets
             SET balance = balance + $1, updated_at = NOW()
             WHERE user_id = $2
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(amount.minor_units())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Wallet", user_id))?;

        Ok(Wallet::from_row(&row)?)
    }

    /// Decrease `balance`, rejecting the debit if it would go negative
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - `balance < amount`
    /// * `LedgerError::NotFound` - The user has no wallet
    pub(crate) async fn debit(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
    ) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(amount.minor_units())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(Self::shortfall(conn, user_id, amount, "balance").await),
        }
    }

    /// Move funds from `balance` into `locked_balance`
    pub(crate) async fn lock(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
    ) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "UPDATE wallets
             SET balance = balance - $1, locked_balance = locked_balance + $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(amount.minor_units())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(Self::shortfall(conn, user_id, amount, "balance").await),
        }
    }

    /// Return locked funds to `balance`
    pub(crate) async fn release_locked(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
    ) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "UPDATE wallets
             SET balance = balance + $1, locked_balance = locked_balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND locked_balance >= $1
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(amount.minor_units())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(Self::shortfall(conn, user_id, amount, "locked_balance").await),
        }
    }

    /// Remove locked funds from the wallet entirely (a withdrawal paid out)
    pub(crate) async fn settle_locked(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
    ) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "UPDATE wallets
             SET locked_balance = locked_balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND locked_balance >= $1
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(amount.minor_units())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Wallet::from_row(&row)?),
            None => Err(Self::shortfall(conn, user_id, amount, "locked_balance").await),
        }
    }

    /// Increase `bonus_balance`
    pub(crate) async fn credit_bonus(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
    ) -> LedgerResult<Wallet> {
        let row = sqlx::query(&format!(
            "UPDATE wallets
             SET bonus_balance = bonus_balance + $1, updated_at = NOW()
             WHERE user_id = $2
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(amount.minor_units())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Wallet", user_id))?;

        Ok(Wallet::from_row(&row)?)
    }

    /// Explain why a guarded update matched no row: missing wallet or short funds
    async fn shortfall(
        conn: &mut PgConnection,
        user_id: i64,
        amount: Money,
        column: &'static str,
    ) -> LedgerError {
        let query = format!("SELECT {column} AS available FROM wallets WHERE user_id = $1");
        let row = match sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await
        {
            Ok(row) => row,
            Err(e) => return e.into(),
        };

        match row {
            Some(row) => match row.try_get::<i64, _>("available") {
                Ok(available) => LedgerError::InsufficientFunds {
                    available,
                    required: amount.minor_units(),
                },
                Err(e) => e.into(),
            },
            None => LedgerError::not_found("Wallet", user_id),
        }
    }
}

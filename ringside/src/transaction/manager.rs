//! Transaction manager: the only writer of wallet balances.

use super::models::{
    LedgerEntry, ProviderOutcome, Transaction, TransactionStatus, TransactionType, WalletEffect,
};
use crate::{
    ledger::{CommissionPolicy, LedgerConfig, LedgerError, LedgerResult, Money},
    validation::Validator,
    wallet::{Wallet, WalletManager},
};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "id, user_id, kind, amount, status, provider, external_ref, \
     bet_id, description, created_at, updated_at";

/// Largest page returned by [`TransactionManager::list_for_user`]
pub const MAX_LIST_LIMIT: i64 = 100;

/// Transaction manager
#[derive(Clone)]
pub struct TransactionManager {
    pool: Arc<PgPool>,
    config: LedgerConfig,
}

impl TransactionManager {
    pub fn new(pool: Arc<PgPool>, config: LedgerConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Check that the account commission is credited to can take it
    ///
    /// A missing house wallet would fail every winning bet at settlement, so
    /// the server refuses to start with one.
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - `HouseLedger` names a user with no wallet
    pub async fn verify_commission_account(&self) -> LedgerResult<()> {
        if let CommissionPolicy::HouseLedger { house_user_id } = self.config.commission_policy {
            let mut conn = self.pool.acquire().await?;
            WalletManager::fetch(&mut conn, house_user_id).await?;
            log::info!("Commission is credited to house account {house_user_id}");
        }
        Ok(())
    }

    /// Create a transaction of any type
    ///
    /// Deposits and withdrawals start PENDING and need a provider. Every other
    /// type is applied to the wallet and written CONFIRMED in one database
    /// transaction.
    pub async fn create(
        &self,
        user_id: i64,
        kind: TransactionType,
        amount: Money,
        provider: Option<&str>,
    ) -> LedgerResult<Transaction> {
        match kind {
            TransactionType::Deposit => {
                self.request_deposit(user_id, amount, require_provider(provider)?)
                    .await
            }
            TransactionType::Withdrawal => {
                self.request_withdrawal(user_id, amount, require_provider(provider)?)
                    .await
            }
            _ => self.record(LedgerEntry::new(user_id, kind, amount)).await,
        }
    }

    /// Open a PENDING deposit; no money moves until the provider confirms it
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Unknown provider or amount outside its limits
    /// * `LedgerError::NotFound` - The user has no wallet
    pub async fn request_deposit(
        &self,
        user_id: i64,
        amount: Money,
        provider: &str,
    ) -> LedgerResult<Transaction> {
        let provider = self.check_provider_limits(TransactionType::Deposit, amount, provider)?;

        let mut tx = self.pool.begin().await?;
        WalletManager::fetch(&mut tx, user_id).await?;
        let transaction = insert(
            &mut tx,
            user_id,
            TransactionType::Deposit,
            amount,
            TransactionStatus::Pending,
            Some(&provider),
            None,
            None,
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "Deposit {} of {} requested by user {} via {}",
            transaction.id,
            amount,
            user_id,
            provider
        );
        Ok(transaction)
    }

    /// Open a PENDING withdrawal, moving the funds into `locked_balance`
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Unknown provider or amount outside its limits
    /// * `LedgerError::InsufficientFunds` - Not enough spendable balance
    pub async fn request_withdrawal(
        &self,
        user_id: i64,
        amount: Money,
        provider: &str,
    ) -> LedgerResult<Transaction> {
        let provider =
            self.check_provider_limits(TransactionType::Withdrawal, amount, provider)?;

        let mut tx = self.pool.begin().await?;
        WalletManager::lock(&mut tx, user_id, amount).await?;
        let transaction = insert(
            &mut tx,
            user_id,
            TransactionType::Withdrawal,
            amount,
            TransactionStatus::Pending,
            Some(&provider),
            None,
            None,
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "Withdrawal {} of {} requested by user {} via {}",
            transaction.id,
            amount,
            user_id,
            provider
        );
        Ok(transaction)
    }

    /// Apply and record an internal movement in its own database transaction
    pub async fn record(&self, entry: LedgerEntry) -> LedgerResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let (transaction, _) = self.record_in(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    /// Apply and record an internal movement inside the caller's transaction
    ///
    /// Returns the row and the wallet it changed (`None` when the movement has
    /// no wallet effect). COMMISSION rows follow the configured policy and may be
    /// attributed to the house account instead of `entry.user_id`.
    pub(crate) async fn record_in(
        &self,
        conn: &mut PgConnection,
        entry: LedgerEntry,
    ) -> LedgerResult<(Transaction, Option<Wallet>)> {
        if entry.kind.is_external() {
            return Err(LedgerError::invalid(
                "type",
                format!("{} must go through a payment provider", entry.kind),
            ));
        }

        let (owner, description) = match (entry.kind, self.config.commission_policy) {
            (TransactionType::Commission, CommissionPolicy::HouseLedger { house_user_id }) => (
                house_user_id,
                Some(
                    entry
                        .description
                        .unwrap_or_else(|| format!("Commission from user {}", entry.user_id)),
                ),
            ),
            _ => (entry.user_id, entry.description),
        };

        let effect = entry.kind.record_effect(self.config.commission_policy);
        let wallet = apply_effect(conn, effect, owner, entry.amount).await?;

        let transaction = insert(
            conn,
            owner,
            entry.kind,
            entry.amount,
            TransactionStatus::Confirmed,
            None,
            entry.bet_id,
            description.as_deref(),
        )
        .await?;

        log::debug!(
            "Recorded {} {} of {} for user {}",
            transaction.kind,
            transaction.id,
            entry.amount,
            owner
        );
        Ok((transaction, wallet))
    }

    /// Settle a PENDING deposit or withdrawal with the provider's outcome
    ///
    /// The row is locked for the duration, so concurrent or repeated webhook
    /// deliveries serialize and only the first one moves money.
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - Unknown transaction id
    /// * `LedgerError::InvalidState` - The transaction already left PENDING
    /// * `LedgerError::Validation` - Empty or oversized external reference
    pub async fn confirm(
        &self,
        transaction_id: Uuid,
        external_ref: &str,
        outcome: ProviderOutcome,
    ) -> LedgerResult<Transaction> {
        let external_ref = external_ref.trim();
        let mut v = Validator::new();
        v.require_len("externalRef", external_ref, 1, 255);
        v.finish(())?;

        let mut tx = self.pool.begin().await?;
        let pending = fetch_for_update(&mut tx, transaction_id).await?;

        if pending.status.is_terminal() {
            log::warn!(
                "Ignoring {:?} for transaction {}: already {}",
                outcome,
                transaction_id,
                pending.status
            );
            return Err(LedgerError::invalid_state(format!(
                "transaction is already {}",
                pending.status
            )));
        }

        let effect = pending.kind.confirm_effect(outcome);
        apply_effect(&mut tx, effect, pending.user_id, pending.money()?).await?;

        let transaction =
            set_status(&mut tx, transaction_id, outcome.into(), Some(external_ref)).await?;
        tx.commit().await?;

        log::info!(
            "{} {} settled as {} (ref {})",
            transaction.kind,
            transaction.id,
            transaction.status,
            external_ref
        );
        Ok(transaction)
    }

    /// Cancel one of the requester's own PENDING transactions
    ///
    /// Another user's transaction is reported as not found.
    pub async fn cancel(
        &self,
        transaction_id: Uuid,
        requester_id: i64,
    ) -> LedgerResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let pending = fetch_for_update(&mut tx, transaction_id).await?;

        if pending.user_id != requester_id {
            return Err(LedgerError::not_found("Transaction", transaction_id));
        }
        if pending.status.is_terminal() {
            return Err(LedgerError::invalid_state(format!(
                "transaction is already {}",
                pending.status
            )));
        }

        let effect = pending.kind.cancel_effect();
        apply_effect(&mut tx, effect, pending.user_id, pending.money()?).await?;

        let transaction =
            set_status(&mut tx, transaction_id, TransactionStatus::Cancelled, None).await?;
        tx.commit().await?;

        log::info!("{} {} cancelled by owner", transaction.kind, transaction.id);
        Ok(transaction)
    }

    pub async fn get(&self, transaction_id: Uuid) -> LedgerResult<Transaction> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| LedgerError::not_found("Transaction", transaction_id))?;

        Transaction::from_row(&row)
    }

    /// Most recent transactions first; `limit` is clamped to `1..=100`
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(Transaction::from_row).collect()
    }

    /// Transactions linked to one bet, oldest first
    pub async fn list_for_bet(&self, bet_id: i64) -> LedgerResult<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE bet_id = $1
             ORDER BY created_at ASC"
        ))
        .bind(bet_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(Transaction::from_row).collect()
    }

    /// Validate a provider request, returning the normalized provider name
    fn check_provider_limits(
        &self,
        kind: TransactionType,
        amount: Money,
        provider: &str,
    ) -> LedgerResult<String> {
        let name = provider.trim().to_ascii_lowercase();
        let limits = self.config.provider(&name).ok_or_else(|| {
            LedgerError::invalid("provider", format!("unknown payment provider {name:?}"))
        })?;

        let (min, max) = match kind {
            TransactionType::Withdrawal => (limits.min_withdrawal, limits.max_withdrawal),
            _ => (limits.min_deposit, limits.max_deposit),
        };

        let mut v = Validator::new();
        v.require_range("amount", amount.minor_units(), min, max);
        Ok(v.finish(name)?)
    }
}

fn require_provider(provider: Option<&str>) -> LedgerResult<&str> {
    provider.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
        LedgerError::invalid("provider", "is required for deposits and withdrawals")
    })
}

async fn apply_effect(
    conn: &mut PgConnection,
    effect: WalletEffect,
    user_id: i64,
    amount: Money,
) -> LedgerResult<Option<Wallet>> {
    let wallet = match effect {
        WalletEffect::None => return Ok(None),
        WalletEffect::Credit => WalletManager::credit(conn, user_id, amount).await?,
        WalletEffect::Debit => WalletManager::debit(conn, user_id, amount).await?,
        WalletEffect::CreditBonus => WalletManager::credit_bonus(conn, user_id, amount).await?,
        WalletEffect::Lock => WalletManager::lock(conn, user_id, amount).await?,
        WalletEffect::ReleaseLocked => {
            WalletManager::release_locked(conn, user_id, amount).await?
        }
        WalletEffect::SettleLocked => WalletManager::settle_locked(conn, user_id, amount).await?,
    };
    Ok(Some(wallet))
}

#[allow(clippy::too_many_arguments)]
async fn insert(
    conn: &mut PgConnection,
    user_id: i64,
    kind: TransactionType,
    amount: Money,
    status: TransactionStatus,
    provider: Option<&str>,
    bet_id: Option<i64>,
    description: Option<&str>,
) -> LedgerResult<Transaction> {
    let row = sqlx::query(&format!(
        "INSERT INTO transactions (id, user_id, kind, amount, status, provider, bet_id, description)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(kind.as_str())
    .bind(amount.minor_units())
    .bind(status.as_str())
    .bind(provider)
    .bind(bet_id)
    .bind(description)
    .fetch_one(&mut *conn)
    .await?;

    Transaction::from_row(&row)
}

async fn fetch_for_update(
    conn: &mut PgConnection,
    transaction_id: Uuid,
) -> LedgerResult<Transaction> {
    let row = sqlx::query(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
    ))
    .bind(transaction_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| LedgerError::not_found("Transaction", transaction_id))?;

    Transaction::from_row(&row)
}

async fn set_status(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    status: TransactionStatus,
    external_ref: Option<&str>,
) -> LedgerResult<Transaction> {
    let row = sqlx::query(&format!(
        "UPDATE transactions
         SET status = $1, external_ref = COALESCE($2, external_ref), updated_at = NOW()
         WHERE id = $3 AND status = 'PENDING'
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(status.as_str())
    .bind(external_ref)
    .bind(transaction_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| LedgerError::invalid_state("transaction is no longer PENDING"))?;

    Transaction::from_row(&row)
}

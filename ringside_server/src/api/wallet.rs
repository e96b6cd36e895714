//! Wallet API handlers.
//!
//! Deposits and withdrawals open PENDING transactions; the payment provider
//! settles them through the webhook in [`super::payments`].
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/wallet/deposit \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": 5000, "provider": "card"}'
//! ```

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ringside::{
    Money,
    transaction::{Transaction, TransactionType},
    wallet::Wallet,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{AppState, DEFAULT_PAGE_SIZE, error::ApiResult, middleware::AuthUser};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentPayload {
    /// Minor units
    pub amount: i64,
    pub provider: String,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Wallet>> {
    Ok(Json(state.wallet_manager.get_wallet(user.user_id).await?))
}

/// Newest first; `limit` defaults to 50 and is capped at 100
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let transactions = state
        .transaction_manager
        .list_for_user(user.user_id, query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(Json(transactions))
}

/// Open a PENDING deposit; the balance changes only once the provider confirms
pub async fn deposit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PaymentPayload>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let amount = Money::new(payload.amount)?;
    let transaction = state
        .transaction_manager
        .create(
            user.user_id,
            TransactionType::Deposit,
            amount,
            Some(&payload.provider),
        )
        .await?;

    record(&transaction);
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Open a PENDING withdrawal; the amount is locked until the provider answers
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PaymentPayload>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let amount = Money::new(payload.amount)?;
    let transaction = state
        .transaction_manager
        .create(
            user.user_id,
            TransactionType::Withdrawal,
            amount,
            Some(&payload.provider),
        )
        .await?;

    record(&transaction);
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Cancel one of the caller's PENDING transactions
pub async fn cancel_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Transaction>> {
    let transaction = state.transaction_manager.cancel(id, user.user_id).await?;
    record(&transaction);
    Ok(Json(transaction))
}

fn record(transaction: &Transaction) {
    metrics::wallet_transactions_total(transaction.kind.as_str(), transaction.status.as_str());
}

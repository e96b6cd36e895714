//! Payment provider webhook.
//!
//! The provider signs each delivery with
//! `X-Signature: hex(sha256(WEBHOOK_SECRET || body))`. Deliveries may repeat;
//! a redelivered outcome that matches the stored status is acknowledged
//! without moving money again.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use ringside::{
    ledger::LedgerError,
    notify::NotificationKind,
    transaction::{ProviderOutcome, Transaction, TransactionStatus, TransactionType},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{
    AppState,
    client::ClientIp,
    error::{ApiError, ApiResult},
};
use crate::{logging::log_security_event, metrics};

/// Header carrying the hex-encoded body signature
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub transaction_id: Uuid,
    pub external_ref: String,
    pub status: ProviderOutcome,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub transaction: Transaction,
    /// The outcome had already been applied by an earlier delivery
    pub duplicate: bool,
}

/// Hex signature the provider is expected to send for `body`
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Constant-time check of a presented signature
pub fn verify_signature(secret: &str, body: &[u8], presented: &str) -> bool {
    let expected = sign(secret, body);
    let presented = presented.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

pub async fn webhook(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WebhookResponse>)> {
    let presented = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(&state.webhook_secret, &body, presented) {
        log_security_event(
            "webhook_bad_signature",
            None,
            Some(&ip),
            "Payment webhook rejected: signature mismatch",
        );
        return Err(ApiError::Unauthorized);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        LedgerError::invalid("body", format!("malformed webhook payload: {e}"))
    })?;

    let confirmed = state
        .transaction_manager
        .confirm(payload.transaction_id, &payload.external_ref, payload.status)
        .await;

    match confirmed {
        Ok(transaction) => {
            metrics::wallet_transactions_total(
                transaction.kind.as_str(),
                transaction.status.as_str(),
            );
            notify_settled(&state, &transaction).await;
            Ok((
                StatusCode::OK,
                Json(WebhookResponse {
                    transaction,
                    duplicate: false,
                }),
            ))
        }
        Err(LedgerError::InvalidState(reason)) => {
            let transaction = state
                .transaction_manager
                .get(payload.transaction_id)
                .await?;
            if transaction.status != TransactionStatus::from(payload.status) {
                return Err(LedgerError::InvalidState(reason).into());
            }
            tracing::info!(
                transaction_id = %transaction.id,
                "Duplicate webhook delivery acknowledged"
            );
            Ok((
                StatusCode::OK,
                Json(WebhookResponse {
                    transaction,
                    duplicate: true,
                }),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Tell the owner that a deposit or withdrawal reached a final status
pub(crate) async fn notify_settled(state: &AppState, transaction: &Transaction) {
    let Some((kind, title)) = settlement_notice(transaction) else {
        return;
    };
    let body = format!("{} of {} is {}", transaction.kind, transaction.amount, transaction.status);
    state
        .notifications
        .notify(
            transaction.user_id,
            kind,
            title,
            &body,
            json!({ "transactionId": transaction.id, "amount": transaction.amount }),
        )
        .await;
}

fn settlement_notice(transaction: &Transaction) -> Option<(NotificationKind, &'static str)> {
    use TransactionStatus::{Confirmed, Failed};
    use TransactionType::{Deposit, Withdrawal};

    match (transaction.kind, transaction.status) {
        (Deposit, Confirmed) => Some((NotificationKind::DepositConfirmed, "Deposit confirmed")),
        (Deposit, Failed) => Some((NotificationKind::DepositFailed, "Deposit failed")),
        (Withdrawal, Confirmed) => Some((
            NotificationKind::WithdrawalConfirmed,
            "Withdrawal confirmed",
        )),
        (Withdrawal, Failed) => Some((NotificationKind::WithdrawalFailed, "Withdrawal failed")),
        _ => None,
    }
}

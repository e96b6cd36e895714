//! Admin API handlers.
//!
//! Every route here sits behind both the auth and admin middleware.
//!
//! ```text
//! POST /api/v1/admin/fighters                        - Create fighter
//! PUT  /api/v1/admin/fighters/{id}                   - Update fighter
//! POST /api/v1/admin/fights                          - Create fight
//! PUT  /api/v1/admin/fights/{id}/odds                - Replace odds
//! POST /api/v1/admin/fights/{id}/start               - SCHEDULED -> LIVE
//! POST /api/v1/admin/fights/{id}/result              - Record result and settle
//! POST /api/v1/admin/fights/{id}/postpone            - Postpone
//! POST /api/v1/admin/fights/{id}/reschedule          - Back on the schedule
//! POST /api/v1/admin/fights/{id}/cancel              - Cancel and refund
//! GET  /api/v1/admin/fights/{id}/bets                - All bets on a fight
//! GET  /api/v1/admin/fights/{id}/settlement          - Settlement progress
//! POST /api/v1/admin/fights/{id}/settlement/retry    - Resume settlement
//! POST /api/v1/admin/bets/{id}/accept                - PENDING -> ACCEPTED
//! POST /api/v1/admin/bets/{id}/settle                - Settle one bet
//! GET  /api/v1/admin/users                           - List users
//! PUT  /api/v1/admin/users/{id}/active               - Activate / deactivate
//! POST /api/v1/admin/users/{id}/adjustments          - Bonus or penalty
//! POST /api/v1/admin/transactions/{id}/confirm       - Manual provider outcome
//! ```

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use ringside::{
    Corner, LedgerError, Money,
    auth::User,
    betting::{Bet, SettlementReport, SettlementStatus},
    catalog::{Fight, Fighter, FighterUpdate, NewFight, NewFighter},
    notify::NotificationKind,
    transaction::{LedgerEntry, ProviderOutcome, Transaction, TransactionType},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{
    AppState, DEFAULT_PAGE_SIZE, error::ApiResult, middleware::AuthUser,
    payments::notify_settled,
};
use crate::metrics;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsPayload {
    pub odds_a: Decimal,
    pub odds_b: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ResultPayload {
    pub winner: Corner,
    pub method: Option<String>,
    pub round: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReschedulePayload {
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivePayload {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentPayload {
    /// `BONUS` or `PENALTY`
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayload {
    pub external_ref: String,
    pub status: ProviderOutcome,
}

// ============================================================================
// Catalog
// ============================================================================

pub async fn create_fighter(
    State(state): State<AppState>,
    Json(payload): Json<NewFighter>,
) -> ApiResult<(StatusCode, Json<Fighter>)> {
    let fighter = state.catalog_manager.create_fighter(payload).await?;
    Ok((StatusCode::CREATED, Json(fighter)))
}

pub async fn update_fighter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<FighterUpdate>,
) -> ApiResult<Json<Fighter>> {
    Ok(Json(state.catalog_manager.update_fighter(id, payload).await?))
}

pub async fn create_fight(
    State(state): State<AppState>,
    Json(payload): Json<NewFight>,
) -> ApiResult<(StatusCode, Json<Fight>)> {
    let fight = state.catalog_manager.create_fight(payload).await?;
    Ok((StatusCode::CREATED, Json(fight)))
}

/// Existing bets keep the odds they were placed at
pub async fn update_odds(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<OddsPayload>,
) -> ApiResult<Json<Fight>> {
    let fight = state
        .catalog_manager
        .update_odds(id, payload.odds_a, payload.odds_b)
        .await?;
    Ok(Json(fight))
}

pub async fn start_fight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Fight>> {
    Ok(Json(state.catalog_manager.start_fight(id).await?))
}

// ============================================================================
// Fight lifecycle and settlement
// ============================================================================

/// Record the winner and settle every open bet
///
/// Repeating the call with the same winner resumes a partial settlement.
pub async fn record_result(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<ResultPayload>,
) -> ApiResult<Json<SettlementReport>> {
    tracing::info!(admin_id = admin.user_id, fight_id = id, winner = ?payload.winner, "Recording fight result");
    let report = state
        .bet_manager
        .settle_fight(id, payload.winner, payload.method.as_deref(), payload.round)
        .await?;
    record_settlement(&report);
    Ok(Json(report))
}

pub async fn postpone_fight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Fight>> {
    Ok(Json(state.bet_manager.postpone_fight(id).await?))
}

pub async fn reschedule_fight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReschedulePayload>,
) -> ApiResult<Json<Fight>> {
    let fight = state
        .bet_manager
        .reschedule_fight(id, payload.scheduled_at)
        .await?;
    Ok(Json(fight))
}

/// Cancel the fight and refund every open bet
pub async fn cancel_fight(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SettlementReport>> {
    tracing::info!(admin_id = admin.user_id, fight_id = id, "Cancelling fight");
    let report = state.bet_manager.cancel_fight(id).await?;
    record_settlement(&report);
    Ok(Json(report))
}

pub async fn list_fight_bets(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Bet>>> {
    Ok(Json(state.bet_manager.list_for_fight(id).await?))
}

pub async fn settlement_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SettlementStatus>> {
    Ok(Json(state.bet_manager.settlement_status(id).await?))
}

pub async fn retry_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SettlementReport>> {
    let report = state.bet_manager.retry_settlement(id).await?;
    record_settlement(&report);
    Ok(Json(report))
}

pub async fn accept_bet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Bet>> {
    Ok(Json(state.bet_manager.accept_bet(id).await?))
}

pub async fn settle_bet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Bet>> {
    Ok(Json(state.bet_manager.settle_bet(id).await?))
}

fn record_settlement(report: &SettlementReport) {
    metrics::bets_settled_total("won", report.won.len());
    metrics::bets_settled_total("lost", report.lost.len());
    metrics::bets_settled_total("refunded", report.refunded.len());
    metrics::bets_settled_total("failed", report.failures.len());

    if !report.is_complete() {
        tracing::warn!(
            fight_id = report.fight_id,
            failures = report.failures.len(),
            "Settlement left bets open; retry via settlement/retry"
        );
    }
}

// ============================================================================
// Users and money adjustments
// ============================================================================

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state
        .auth_manager
        .list_users(
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(users))
}

/// Deactivating a user also revokes their refresh tokens
pub async fn set_user_active(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<ActivePayload>,
) -> ApiResult<Json<User>> {
    let user = state.auth_manager.set_active(id, payload.active).await?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id = id,
        active = payload.active,
        "User activation changed"
    );
    Ok(Json(user))
}

/// Credit a bonus or debit a penalty, then notify the user
pub async fn adjust_balance(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(payload): Json<AdjustmentPayload>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let (notice, title) = match payload.kind {
        TransactionType::Bonus => (NotificationKind::Bonus, "Bonus credited"),
        TransactionType::Penalty => (NotificationKind::Penalty, "Penalty applied"),
        other => {
            return Err(LedgerError::invalid(
                "type",
                format!("adjustments must be BONUS or PENALTY, got {other}"),
            )
            .into());
        }
    };

    let mut entry = LedgerEntry::new(user_id, payload.kind, Money::new(payload.amount)?);
    if let Some(description) = payload.description.as_deref() {
        entry = entry.with_description(description);
    }
    let transaction = state.transaction_manager.record(entry).await?;

    tracing::info!(
        admin_id = admin.user_id,
        user_id,
        kind = %transaction.kind,
        amount = transaction.amount,
        "Balance adjusted"
    );
    metrics::wallet_transactions_total(transaction.kind.as_str(), transaction.status.as_str());

    let body = payload
        .description
        .unwrap_or_else(|| format!("{} of {}", transaction.kind, transaction.amount));
    state
        .notifications
        .notify(
            user_id,
            notice,
            title,
            &body,
            json!({ "transactionId": transaction.id, "amount": transaction.amount }),
        )
        .await;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Apply a provider outcome by hand, for deliveries that never arrived
pub async fn confirm_transaction(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPayload>,
) -> ApiResult<Json<Transaction>> {
    let transaction = state
        .transaction_manager
        .confirm(id, &payload.external_ref, payload.status)
        .await?;

    tracing::info!(
        admin_id = admin.user_id,
        transaction_id = %id,
        status = %transaction.status,
        "Transaction confirmed manually"
    );
    metrics::wallet_transactions_total(transaction.kind.as_str(), transaction.status.as_str());
    notify_settled(&state, &transaction).await;

    Ok(Json(transaction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_payload_uses_type_field() {
        let payload: AdjustmentPayload =
            serde_json::from_str(r#"{"type":"PENALTY","amount":250}"#).unwrap();
        assert_eq!(payload.kind, TransactionType::Penalty);
        assert!(payload.description.is_none());
    }

    #[test]
    fn test_odds_payload_accepts_decimal_strings() {
        let payload: OddsPayload =
            serde_json::from_str(r#"{"oddsA":"2.5","oddsB":"1.6"}"#).unwrap();
        assert_eq!(payload.odds_a, Decimal::new(25, 1));
        assert_eq!(payload.odds_b, Decimal::new(16, 1));
    }

    #[test]
    fn test_result_payload_optional_fields() {
        let payload: ResultPayload = serde_json::from_str(r#"{"winner":"B"}"#).unwrap();
        assert_eq!(payload.winner, Corner::B);
        assert!(payload.method.is_none() && payload.round.is_none());
    }
}

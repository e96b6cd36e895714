//! Bet API handlers.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/bets \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"fightId": 7, "amount": 1000, "chosenFighter": "A"}'
//! ```

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ringside::{
    Corner, Money,
    betting::{Bet, BetStatus},
};
use serde::Deserialize;

use super::{AppState, DEFAULT_PAGE_SIZE, error::ApiResult, middleware::AuthUser};
use crate::metrics;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetPayload {
    pub fight_id: i64,
    /// Stake in minor units
    pub amount: i64,
    pub chosen_fighter: Corner,
}

#[derive(Debug, Deserialize)]
pub struct BetQuery {
    pub status: Option<BetStatus>,
    pub limit: Option<i64>,
}

/// Stake on a fighter at the fight's current odds
///
/// `409` when the balance does not cover the stake or the fight is closed.
pub async fn place_bet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PlaceBetPayload>,
) -> ApiResult<(StatusCode, Json<Bet>)> {
    let amount = Money::new(payload.amount)?;
    let bet = state
        .bet_manager
        .place_bet(
            user.user_id,
            payload.fight_id,
            amount,
            payload.chosen_fighter,
        )
        .await?;

    metrics::bets_placed_total(bet.chosen_fighter.as_str());
    Ok((StatusCode::CREATED, Json(bet)))
}

pub async fn list_bets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<BetQuery>,
) -> ApiResult<Json<Vec<Bet>>> {
    let bets = state
        .bet_manager
        .list_for_user(
            user.user_id,
            query.status,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(bets))
}

/// Another user's bet is reported as not found
pub async fn get_bet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Bet>> {
    Ok(Json(
        state.bet_manager.get_bet_for_user(id, user.user_id).await?,
    ))
}

/// Cancel a PENDING bet and refund the stake
pub async fn cancel_bet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Bet>> {
    Ok(Json(state.bet_manager.cancel_bet(id, user.user_id).await?))
}

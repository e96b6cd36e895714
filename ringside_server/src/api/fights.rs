//! Public fighter and fight catalog.
//!
//! ```bash
//! curl "http://localhost:8080/api/v1/fights?status=SCHEDULED&limit=20"
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
};
use ringside::catalog::{Fight, FightResult, FightStatus, Fighter};
use serde::{Deserialize, Serialize};

use super::{AppState, DEFAULT_PAGE_SIZE, error::ApiResult};

#[derive(Debug, Deserialize)]
pub struct FighterQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FightQuery {
    pub status: Option<FightStatus>,
    pub limit: Option<i64>,
}

/// A fight together with its recorded result, if any
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FightDetail {
    #[serde(flatten)]
    pub fight: Fight,
    pub result: Option<FightResult>,
}

pub async fn list_fighters(
    State(state): State<AppState>,
    Query(query): Query<FighterQuery>,
) -> ApiResult<Json<Vec<Fighter>>> {
    let fighters = state
        .catalog_manager
        .list_fighters(
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(fighters))
}

pub async fn get_fighter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Fighter>> {
    Ok(Json(state.catalog_manager.get_fighter(id).await?))
}

/// Fights in schedule order, optionally filtered by `status`
pub async fn list_fights(
    State(state): State<AppState>,
    Query(query): Query<FightQuery>,
) -> ApiResult<Json<Vec<Fight>>> {
    let fights = state
        .catalog_manager
        .list_fights(query.status, query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(Json(fights))
}

pub async fn get_fight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<FightDetail>> {
    let fight = state.catalog_manager.get_fight(id).await?;
    let result = state.catalog_manager.get_result(id).await?;
    Ok(Json(FightDetail { fight, result }))
}

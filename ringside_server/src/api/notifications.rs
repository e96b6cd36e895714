//! Notification inbox handlers.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use ringside::notify::Notification;
use serde::{Deserialize, Serialize};

use super::{AppState, DEFAULT_PAGE_SIZE, error::ApiResult, middleware::AuthUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Inbox>> {
    let notifications = state
        .notifications
        .list(
            user.user_id,
            query.unread_only,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    let unread_count = state.notifications.unread_count(user.user_id).await?;

    Ok(Json(Inbox {
        notifications,
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.notifications.mark_read(user.user_id, id).await?))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<MarkedRead>> {
    let updated = state.notifications.mark_all_read(user.user_id).await?;
    Ok(Json(MarkedRead { updated }))
}

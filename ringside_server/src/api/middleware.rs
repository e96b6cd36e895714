//! Authentication and metrics middleware.
//!
//! [`auth_middleware`] validates the `Authorization: Bearer <jwt>` header and
//! stores an [`AuthUser`] in request extensions:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use ringside_server::api::middleware::AuthUser;
//!
//! async fn handler(Extension(user): Extension<AuthUser>) -> String {
//!     format!("Authenticated as {}", user.username)
//! }
//! # let _ = handler;
//! ```

use axum::{
    extract::{MatchedPath, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use ringside::auth::{AccessTokenClaims, UserId};
use std::time::Instant;

use super::{AppState, error::ApiError};
use crate::metrics;

/// Identity taken from a verified access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

impl From<AccessTokenClaims> for AuthUser {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reject requests without a valid access token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or(ApiError::Unauthorized)?;
    let claims = state
        .auth_manager
        .verify_access_token(token)
        .map_err(|_| ApiError::Unauthorized)?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Reject authenticated users without the admin claim
///
/// Must be layered inside [`auth_middleware`].
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(ApiError::Unauthorized)?;

    if !user.is_admin {
        tracing::warn!(user_id = user.user_id, "Non-admin denied admin route");
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Count requests and time them, labelled by route template
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
    metrics::http_requests_total(&method, &path, response.status().as_u16());
    metrics::http_request_duration_ms(&method, &path, elapsed_ms);
    response
}

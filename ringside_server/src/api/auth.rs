//! Authentication API handlers.
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "fan_one", "password": "Knockout99", "displayName": "Fan One"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "fan_one", "password": "Knockout99"}'
//! ```

use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;
use ringside::{
    auth::{AuthError, LoginRequest, RegisterRequest, User},
    security::RateLimitError,
};
use serde::{Deserialize, Serialize};

use super::{
    AppState,
    client::{ClientIp, DeviceFingerprint},
    error::{ApiError, ApiResult},
    middleware::AuthUser,
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Register a new account and log it in
///
/// Returns `201 Created` with a token pair. `400` on weak or malformed input,
/// `409` when the username or email is taken.
pub async fn register(
    State(state): State<AppState>,
    device: DeviceFingerprint,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let login = LoginRequest {
        username: payload.username.clone(),
        password: payload.password.clone(),
    };

    state.auth_manager.register(payload).await?;
    let (user, tokens) = state
        .auth_manager
        .login(login, device.into_string())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            user,
        }),
    ))
}

/// Authenticate and issue a token pair
///
/// Failed attempts are counted per client IP. A blocked client gets `429`
/// with `Retry-After` before its credentials are looked at.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    device: DeviceFingerprint,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let throttle = &state.login_throttle;

    if let Err(limited) = throttle.check(&ip).await {
        metrics::rate_limit_hits_total("login");
        log_security_event(
            "login_throttled",
            None,
            Some(&ip),
            "Login rejected while blocked",
        );
        return Err(limited.into());
    }

    match state
        .auth_manager
        .login(payload, device.into_string())
        .await
    {
        Ok((user, tokens)) => {
            throttle.clear_failed_attempts(&ip).await;
            metrics::login_attempts_total(true);
            Ok(Json(AuthResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_in: tokens.expires_in,
                user,
            }))
        }
        Err(AuthError::InvalidCredentials) => {
            metrics::login_attempts_total(false);
            let status = throttle.record_failed_attempt(&ip).await;
            if status.is_blocked {
                metrics::rate_limit_hits_total("login");
                log_security_event(
                    "login_blocked",
                    None,
                    Some(&ip),
                    &format!("Blocked after {} failed logins", status.count),
                );
                return Err(RateLimitError::new(
                    status.remaining,
                    throttle.config().max_attempts,
                    status.reset_time,
                    Utc::now(),
                )
                .into());
            }
            Err(AuthError::InvalidCredentials.into())
        }
        Err(e) => {
            metrics::login_attempts_total(false);
            Err(e.into())
        }
    }
}

/// Rotate a refresh token; the old one stops working
pub async fn refresh(
    State(state): State<AppState>,
    device: DeviceFingerprint,
    Json(payload): Json<RefreshPayload>,
) -> ApiResult<Json<RefreshResponse>> {
    let tokens = state
        .auth_manager
        .refresh_token(&payload.refresh_token, &device.into_string())
        .await?;

    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    }))
}

/// Revoke one refresh token of the caller
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RefreshPayload>,
) -> ApiResult<StatusCode> {
    state
        .auth_manager
        .logout(user.user_id, &payload.refresh_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    let profile = state
        .auth_manager
        .get_user(user.user_id)
        .await
        .map_err(|e| match e {
            // Token outlived the account row
            AuthError::UserNotFound => ApiError::Unauthorized,
            other => other.into(),
        })?;
    Ok(Json(profile))
}

//! Mapping from library errors to HTTP responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use ringside::{
    auth::AuthError, ledger::LedgerError, security::RateLimitError,
    validation::ValidationErrors,
};
use serde::Serialize;
use thiserror::Error;

/// Every error a handler can return
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Admin privileges required")]
    Forbidden,
}

/// JSON error body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ErrorResponse {
    fn message(error: String) -> Self {
        Self {
            error,
            fields: None,
            retry_after: None,
            remaining: None,
            limit: None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => ledger_status(e),
            ApiError::Auth(e) => match e {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::InvalidCredentials
                | AuthError::InvalidRefreshToken
                | AuthError::SessionExpired
                | AuthError::JwtError(_) => StatusCode::UNAUTHORIZED,
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Ledger(e) => ledger_status(e),
                AuthError::Database(_) | AuthError::HashingFailed => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Client-safe message; internals are never exposed
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Ledger(e) => e.client_message(),
            ApiError::Auth(e) => e.client_message(),
            ApiError::RateLimited(e) => e.client_message(),
            _ => self.to_string(),
        }
    }

    fn field_errors(&self) -> Option<ValidationErrors> {
        match self {
            ApiError::Validation(errors)
            | ApiError::Ledger(LedgerError::Validation(errors))
            | ApiError::Auth(AuthError::Validation(errors))
            | ApiError::Auth(AuthError::Ledger(LedgerError::Validation(errors))) => {
                Some(errors.clone())
            }
            _ => None,
        }
    }
}

fn ledger_status(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InsufficientFunds { .. } | LedgerError::InvalidState(_) => {
            StatusCode::CONFLICT
        }
        LedgerError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Database(_) | LedgerError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, "Request failed: {}", self);
        }

        let mut body = ErrorResponse::message(self.client_message());
        body.fields = self.field_errors();

        let retry_after = match &self {
            ApiError::RateLimited(e) => {
                body.retry_after = Some(e.retry_after_secs);
                body.remaining = Some(e.remaining);
                body.limit = Some(e.limit);
                Some(e.retry_after_secs)
            }
            _ => None,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_ledger_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(LedgerError::not_found("Bet", 9)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::InsufficientFunds {
                available: 5,
                required: 10
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LedgerError::invalid("amount", "too small")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::Database(sqlx::Error::RowNotFound)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::AccountDisabled).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthError::UsernameTaken).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_insufficient_funds_hides_balance() {
        let err = ApiError::from(LedgerError::InsufficientFunds {
            available: 1234,
            required: 5000,
        });
        assert!(!err.client_message().contains("1234"));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let now = Utc::now();
        let err = RateLimitError::new(0, 5, now + chrono::Duration::seconds(7), now);
        let response = ApiError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "7");
    }

    #[test]
    fn test_validation_fields_exposed() {
        let err = ApiError::from(ValidationErrors::single("amount", "must be positive"));
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.fields(), vec!["amount"]);
    }
}

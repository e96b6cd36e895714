//! Ledger error types.

use crate::{db::timeouts::TimeoutError, validation::ValidationErrors};
use thiserror::Error;

/// Errors raised by wallet, transaction, catalog and betting operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or out-of-range input
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A debit would take a balance below zero
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Operation attempted on an entity in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Referenced user, wallet, fight, bet or transaction is absent
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Operation exceeded its time budget and was rolled back
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// A stored value could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        LedgerError::Validation(ValidationErrors::single(field, message))
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        LedgerError::InvalidState(message.into())
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors and record ids are redacted. Insufficient-funds errors only
    /// report the required amount, never a balance.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Corrupt(_) => {
                "Internal server error".to_string()
            }
            LedgerError::InsufficientFunds { required, .. } => {
                format!("Insufficient funds for an amount of {required}")
            }
            LedgerError::NotFound { entity, .. } => format!("{entity} not found"),
            LedgerError::Timeout(_) => "Operation timed out, please retry".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_balance() {
        let err = LedgerError::InsufficientFunds {
            available: 4_321,
            required: 5_000,
        };
        let msg = err.client_message();
        assert!(msg.contains("5000"));
        assert!(!msg.contains("4321"));
    }

    #[test]
    fn test_client_message_hides_ids() {
        let err = LedgerError::not_found("Bet", 42);
        assert_eq!(err.to_string(), "Bet 42 not found");
        assert_eq!(err.client_message(), "Bet not found");
    }

    #[test]
    fn test_database_errors_are_sanitized() {
        let err = LedgerError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
    }
}

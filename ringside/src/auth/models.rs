//! Authentication data models.

use crate::validation::{Validated, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};

/// User ID type
pub type UserId = i64;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            is_active: row.try_get("is_active")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
        })
    }
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub email: Option<String>,
}

impl RegisterRequest {
    /// Check username format, password strength, display name and email
    pub fn validate(&self) -> Validated<()> {
        let mut v = Validator::new();

        let username_len = self.username.chars().count();
        v.check(
            (3..=20).contains(&username_len),
            "username",
            "must be 3-20 characters",
        )
        .check(
            self.username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "username",
            "can only contain letters, numbers, and underscores",
        );

        let has_digit = self.password.chars().any(|c| c.is_ascii_digit());
        let has_upper = self.password.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = self.password.chars().any(|c| c.is_ascii_lowercase());
        v.check(
            self.password.chars().count() >= 8,
            "password",
            "must be at least 8 characters",
        )
        .check(
            has_digit && has_upper && has_lower,
            "password",
            "must contain at least one number, one uppercase and one lowercase letter",
        )
        .require_len("displayName", &self.display_name, 1, 50);

        if let Some(email) = &self.email {
            let well_formed = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            v.check(well_formed, "email", "must be a valid email address")
                .require_len("email", email, 3, 255);
        }

        v.finish(())
    }
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// JWT claims for access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    pub username: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "iron_mike".to_string(),
            password: "Knockout99".to_string(),
            display_name: "Iron Mike".to_string(),
            email: Some("mike@example.com".to_string()),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_username_rules() {
        let short = RegisterRequest {
            username: "ab".to_string(),
            ..request()
        };
        assert_eq!(short.validate().unwrap_err().fields(), vec!["username"]);

        let dashed = RegisterRequest {
            username: "iron-mike".to_string(),
            ..request()
        };
        assert_eq!(dashed.validate().unwrap_err().fields(), vec!["username"]);
    }

    #[test]
    fn test_weak_password_rejected() {
        let weak = RegisterRequest {
            password: "alllowercase".to_string(),
            ..request()
        };
        assert_eq!(weak.validate().unwrap_err().fields(), vec!["password"]);
    }

    #[test]
    fn test_every_bad_field_reported() {
        let bad = RegisterRequest {
            username: "x".to_string(),
            password: "short".to_string(),
            display_name: "   ".to_string(),
            email: Some("nobody".to_string()),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.fields();
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"displayName"));
        assert!(fields.contains(&"email"));
    }

    #[test]
    fn test_email_is_optional() {
        let anonymous = RegisterRequest {
            email: None,
            ..request()
        };
        assert!(anonymous.validate().is_ok());
    }
}

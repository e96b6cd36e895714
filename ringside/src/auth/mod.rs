//! Authentication module providing user registration, login, and session management.
//!
//! This module implements secure authentication with:
//! - Argon2id password hashing with server-side pepper
//! - JWT access tokens (HS256, 15-minute expiry)
//! - Rotating refresh tokens bound to a device fingerprint (7-day expiry)
//! - Wallet provisioning in the same database transaction as the user row
//!
//! Failed logins are not counted here; the HTTP layer wraps [`AuthManager::login`]
//! with the [`crate::security::LoginThrottle`].
//!
//! ## Example
//!
//! ```no_run
//! use ringside::auth::{AuthManager, RegisterRequest};
//! use ringside::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let auth = AuthManager::new(
//!         Arc::new(db.pool().clone()),
//!         "secret_pepper".to_string(),
//!         "jwt_secret".to_string(),
//!     );
//!
//!     let request = RegisterRequest {
//!         username: "iron_mike".to_string(),
//!         password: "Knockout99".to_string(),
//!         display_name: "Iron Mike".to_string(),
//!         email: Some("mike@example.com".to_string()),
//!     };
//!
//!     let user = auth.register(request).await?;
//!     println!("Registered user: {}", user.username);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AuthError, AuthResult};
pub use manager::AuthManager;
pub use models::{AccessTokenClaims, LoginRequest, RegisterRequest, SessionTokens, User, UserId};

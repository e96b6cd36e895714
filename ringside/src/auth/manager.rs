//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, LoginRequest, RegisterRequest, SessionTokens, User, UserId},
};
use crate::wallet::WalletManager;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sqlx::{PgConnection, PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, display_name, email, is_active, is_admin, created_at, last_login";

/// Upper bound for one page of [`AuthManager::list_users`]
pub const MAX_USER_PAGE: i64 = 100;

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    pool: Arc<PgPool>,
    pepper: String,
    jwt_secret: String,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
    initial_balance: i64,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `pepper` - Server-side pepper for password hashing
    /// * `jwt_secret` - Secret key for JWT signing
    pub fn new(pool: Arc<PgPool>, pepper: String, jwt_secret: String) -> Self {
        Self {
            pool,
            pepper,
            jwt_secret,
            access_token_duration: Duration::minutes(15),
            refresh_token_duration: Duration::days(7),
            initial_balance: 0,
        }
    }

    /// Fund new wallets with `amount` minor units at registration
    pub fn with_initial_balance(mut self, amount: i64) -> Self {
        self.initial_balance = amount.max(0);
        self
    }

    /// Register a new user
    ///
    /// The user row and its wallet are inserted in one database transaction.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Username, password, display name or email invalid
    /// * `AuthError::UsernameTaken` - Username already exists
    /// * `AuthError::EmailTaken` - Email already exists
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<User> {
        request.validate()?;

        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase);

        let mut tx = self.pool.begin().await?;

        let existing_user = sqlx::query("SELECT id FROM users WHERE username = $1")
            .bind(&request.username)
            .fetch_optional(&mut *tx)
            .await?;
        if existing_user.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        if let Some(email) = &email {
            let existing_email = sqlx::query("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;
            if existing_email.is_some() {
                return Err(AuthError::EmailTaken);
            }
        }

        let password_hash = self.hash_password(&request.password)?;

        let row = sqlx::query(&format!(
            "INSERT INTO users (username, password_hash, display_name, email)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.username)
        .bind(&password_hash)
        .bind(request.display_name.trim())
        .bind(&email)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation)?;
        let user = User::from_row(&row)?;

        WalletManager::create(&mut tx, user.id, self.initial_balance).await?;
        tx.commit().await?;

        log::info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Login a user
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown user or wrong password
    /// * `AuthError::AccountDisabled` - Correct credentials on a deactivated account
    pub async fn login(
        &self,
        request: LoginRequest,
        device_fingerprint: String,
    ) -> AuthResult<(User, SessionTokens)> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = $1"
        ))
        .bind(request.username.trim())
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let password_hash: String = row.try_get("password_hash")?;
        self.verify_password(&request.password, &password_hash)?;

        let mut user = User::from_row(&row)?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let last_login: DateTime<Utc> = sqlx::query_scalar(
            "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING last_login",
        )
        .bind(user.id)
        .fetch_one(self.pool.as_ref())
        .await?;
        user.last_login = Some(last_login);

        let mut conn = self.pool.acquire().await?;
        let tokens = self.create_session(&mut conn, &user, &device_fingerprint).await?;

        log::info!("User {} logged in", user.id);
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new token pair
    ///
    /// The presented token is consumed. A fingerprint mismatch leaves it in
    /// place and fails like an unknown token.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidRefreshToken` - Unknown token or different device
    /// * `AuthError::SessionExpired` - Refresh token expired
    /// * `AuthError::AccountDisabled` - The user was deactivated
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        device_fingerprint: &str,
    ) -> AuthResult<SessionTokens> {
        let token = parse_refresh_token(refresh_token)?;
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query(
            "DELETE FROM sessions WHERE token = $1
             RETURNING user_id, device_fingerprint, expires_at",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

        let stored_fingerprint: String = session.try_get("device_fingerprint")?;
        if stored_fingerprint != device_fingerprint {
            log::warn!("Refresh token presented from a different device");
            return Err(AuthError::InvalidRefreshToken);
        }

        let expires_at: DateTime<Utc> = session.try_get("expires_at")?;
        if expires_at < Utc::now() {
            tx.commit().await?;
            return Err(AuthError::SessionExpired);
        }

        let user_id: UserId = session.try_get("user_id")?;
        let user = fetch_user(&mut tx, user_id).await?;
        if !user.is_active {
            tx.commit().await?;
            return Err(AuthError::AccountDisabled);
        }

        let tokens = self.create_session(&mut tx, &user, device_fingerprint).await?;
        tx.commit().await?;
        Ok(tokens)
    }

    /// Invalidate one of `user_id`'s refresh tokens
    ///
    /// Unknown tokens are ignored.
    pub async fn logout(&self, user_id: UserId, refresh_token: &str) -> AuthResult<()> {
        let Ok(token) = Uuid::parse_str(refresh_token.trim()) else {
            return Ok(());
        };

        sqlx::query("DELETE FROM sessions WHERE token = $1 AND user_id = $2")
            .bind(token)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    /// Verify an access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(token_data.claims)
    }

    /// Sign a fresh access token for `user`
    pub fn issue_access_token(&self, user: &User) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
            exp: (now + self.access_token_duration).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?)
    }

    pub async fn get_user(&self, user_id: UserId) -> AuthResult<User> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, user_id).await
    }

    /// Page through users by id; `limit` is clamped to `1..=MAX_USER_PAGE`
    pub async fn list_users(&self, limit: i64, offset: i64) -> AuthResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit.clamp(1, MAX_USER_PAGE))
        .bind(offset.max(0))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .iter()
            .map(User::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Activate or deactivate an account
    ///
    /// Deactivation also revokes every refresh token the user holds. Access
    /// tokens already issued stay valid until they expire.
    pub async fn set_active(&self, user_id: UserId, active: bool) -> AuthResult<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::UserNotFound)?;

        if !active {
            sqlx::query("DELETE FROM sessions WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        log::info!("User {user_id} active = {active}");
        Ok(User::from_row(&row)?)
    }

    /// Access token lifetime
    pub fn access_token_duration(&self) -> Duration {
        self.access_token_duration
    }

    async fn create_session(
        &self,
        conn: &mut PgConnection,
        user: &User,
        device_fingerprint: &str,
    ) -> AuthResult<SessionTokens> {
        let access_token = self.issue_access_token(user)?;
        let refresh_token = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO sessions (token, user_id, device_fingerprint, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_token)
        .bind(user.id)
        .bind(device_fingerprint)
        .bind(Utc::now() + self.refresh_token_duration)
        .execute(&mut *conn)
        .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token: refresh_token.to_string(),
            expires_in: self.access_token_duration.num_seconds(),
        })
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

async fn fetch_user(conn: &mut PgConnection, user_id: UserId) -> AuthResult<User> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(User::from_row(&row)?)
}

fn parse_refresh_token(token: &str) -> AuthResult<Uuid> {
    Uuid::parse_str(token.trim()).map_err(|_| AuthError::InvalidRefreshToken)
}

/// Map a lost uniqueness race on insert to the matching taken error
fn unique_violation(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &err {
        match db.constraint() {
            Some("users_username_key") => return AuthError::UsernameTaken,
            Some("users_email_key") => return AuthError::EmailTaken,
            _ => {}
        }
    }
    AuthError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_manager() -> AuthManager {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        AuthManager::new(
            Arc::new(pool),
            "test_pepper_value".to_string(),
            "test_jwt_secret_that_is_long_enough_123".to_string(),
        )
    }

    fn user(is_admin: bool) -> User {
        User {
            id: 42,
            username: "iron_mike".to_string(),
            display_name: "Iron Mike".to_string(),
            email: None,
            is_active: true,
            is_admin,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[tokio::test]
    async fn test_password_hash_verifies_with_same_pepper() {
        let auth = lazy_manager();
        let hash = auth.hash_password("Knockout99").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(auth.verify_password("Knockout99", &hash).is_ok());
        assert!(matches!(
            auth.verify_password("knockout99", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_pepper_is_part_of_the_hash() {
        let auth = lazy_manager();
        let hash = auth.hash_password("Knockout99").unwrap();

        let other = AuthManager {
            pepper: "different_pepper".to_string(),
            ..auth
        };
        assert!(other.verify_password("Knockout99", &hash).is_err());
    }

    #[tokio::test]
    async fn test_access_token_carries_claims() {
        let auth = lazy_manager();
        let token = auth.issue_access_token(&user(true)).unwrap();
        let claims = auth.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "iron_mike");
        assert!(claims.is_admin);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let auth = lazy_manager();
        let token = auth.issue_access_token(&user(false)).unwrap();

        let other = AuthManager {
            jwt_secret: "another_secret_that_is_long_enough_456".to_string(),
            ..auth
        };
        assert!(matches!(
            other.verify_access_token(&token),
            Err(AuthError::JwtError(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let auth = lazy_manager();
        assert!(auth.verify_access_token("not.a.jwt").is_err());
    }

    #[tokio::test]
    async fn test_register_validates_before_touching_database() {
        let auth = lazy_manager();
        let result = auth
            .register(RegisterRequest {
                username: "x".to_string(),
                password: "weak".to_string(),
                display_name: "X".to_string(),
                email: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_malformed_refresh_token_rejected_without_lookup() {
        let auth = lazy_manager();
        assert!(matches!(
            auth.refresh_token("not-a-uuid", "device").await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_negative_initial_balance_clamped() {
        let auth = lazy_manager().with_initial_balance(-5);
        assert_eq!(auth.initial_balance, 0);
    }
}

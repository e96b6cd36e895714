//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use ringside::{
    db::DatabaseConfig,
    ledger::LedgerConfig,
    security::ThrottleConfig,
    validation::ValidationErrors,
};
use std::net::{IpAddr, SocketAddr};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter address; metrics are disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Bet bounds, commission and payment providers
    pub ledger: LedgerConfig,
    /// Failed-login throttle
    pub throttle: ThrottleConfig,
    /// Balance credited to every new wallet
    pub initial_balance: i64,
    /// Reverse proxies whose forwarding headers are believed
    pub trusted_proxies: Vec<IpAddr>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
    /// Shared secret for payment webhook signatures (required)
    pub webhook_secret: String,
}

impl SecurityConfig {
    /// Check secret lengths
    pub fn new(
        jwt_secret: String,
        password_pepper: String,
        webhook_secret: String,
    ) -> Result<Self, ConfigError> {
        require_min_len("JWT_SECRET", &jwt_secret, 32)?;
        require_min_len("PASSWORD_PEPPER", &password_pepper, 16)?;
        require_min_len("WEBHOOK_SECRET", &webhook_secret, 16)?;

        Ok(Self {
            jwt_secret,
            password_pepper,
            webhook_secret,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(
            require_env("JWT_SECRET", "Generate with: openssl rand -hex 32")?,
            require_env("PASSWORD_PEPPER", "Generate with: openssl rand -hex 16")?,
            require_env("WEBHOOK_SECRET", "Use the secret shared with the payment provider")?,
        )
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_addr("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080))),
        };
        let metrics_bind = parse_addr("METRICS_BIND")?;

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let config = ServerConfig {
            bind,
            metrics_bind,
            database,
            security: SecurityConfig::from_env()?,
            ledger: LedgerConfig::from_env(),
            throttle: ThrottleConfig::from_env(),
            initial_balance: parse_env_or("INITIAL_BALANCE", 0),
            trusted_proxies: parse_ip_list("TRUSTED_PROXIES")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger
            .validate()
            .map_err(|errors| ConfigError::from_validation("ledger", errors))?;
        self.throttle
            .validate()
            .map_err(|errors| ConfigError::from_validation("throttle", errors))?;

        if self.initial_balance < 0 {
            return Err(ConfigError::Invalid {
                var: "INITIAL_BALANCE".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    fn from_validation(section: &str, errors: ValidationErrors) -> Self {
        ConfigError::Invalid {
            var: format!("{section}.{}", errors.fields().join(",")),
            reason: errors.to_string(),
        }
    }
}

fn require_env(var: &str, hint: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingRequired {
        var: var.to_string(),
        hint: hint.to_string(),
    })
}

fn require_min_len(var: &str, value: &str, min: usize) -> Result<(), ConfigError> {
    if value.chars().count() < min {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("Must be at least {min} characters"),
        });
    }
    Ok(())
}

/// Unset means `None`; set but unparsable is an error
fn parse_addr(var: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                reason: format!("'{raw}' is not an IP:PORT address"),
            }),
        Err(_) => Ok(None),
    }
}

/// Comma-separated IP addresses; unset or empty means none
fn parse_ip_list(var: &str) -> Result<Vec<IpAddr>, ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                reason: format!("'{entry}' is not an IP address"),
            })
        })
        .collect()
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: None,
            database: DatabaseConfig::development(),
            security: SecurityConfig::new("a".repeat(32), "b".repeat(16), "c".repeat(16))
                .unwrap(),
            ledger: LedgerConfig::default(),
            throttle: ThrottleConfig::default(),
            initial_balance: 0,
            trusted_proxies: Vec::new(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JWT_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_short_secrets_rejected() {
        let err = SecurityConfig::new("short".to_string(), "b".repeat(16), "c".repeat(16))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "JWT_SECRET"));

        let err = SecurityConfig::new("a".repeat(32), "b".repeat(16), "c".repeat(8))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "WEBHOOK_SECRET"));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_inverted_bet_bounds_rejected() {
        let mut config = config();
        config.ledger.min_bet = 5_000;
        config.ledger.max_bet = 100;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_bet"));
    }

    #[test]
    fn test_negative_initial_balance_rejected() {
        let mut config = config();
        config.initial_balance = -1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref var, .. }) if var == "INITIAL_BALANCE"
        ));
    }

    #[test]
    #[serial]
    fn test_trusted_proxies_parsing() {
        unsafe {
            std::env::set_var("TRUSTED_PROXIES", "10.0.0.1, ::1,");
        }
        assert_eq!(
            parse_ip_list("TRUSTED_PROXIES").unwrap(),
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );

        unsafe {
            std::env::set_var("TRUSTED_PROXIES", "10.0.0.0/8");
        }
        assert!(matches!(
            parse_ip_list("TRUSTED_PROXIES"),
            Err(ConfigError::Invalid { ref var, .. }) if var == "TRUSTED_PROXIES"
        ));

        unsafe {
            std::env::remove_var("TRUSTED_PROXIES");
        }
        assert!(parse_ip_list("TRUSTED_PROXIES").unwrap().is_empty());
    }
}

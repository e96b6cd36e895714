//! Ledger configuration: bet bounds, commission and payment provider limits.

use crate::{
    env,
    validation::{ValidationErrors, Validator},
};
use rust_decimal::Decimal;
use std::{collections::HashMap, time::Duration};

/// Platform commission taken on a winning bet's gross payout (10%)
pub const COMMISSION_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Smallest accepted stake, in minor units
pub const MIN_BET_AMOUNT: i64 = 100;

/// Largest accepted stake, in minor units
pub const MAX_BET_AMOUNT: i64 = 1_000_000;

const DEFAULT_PROVIDERS: &str = "card,bank_transfer,crypto";

/// Where a winning bet's commission goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommissionPolicy {
    /// A COMMISSION row is recorded against the bettor with no wallet effect
    #[default]
    Bookkeeping,
    /// A COMMISSION row is recorded against the house account and credits its balance
    HouseLedger { house_user_id: i64 },
}

/// Deposit and withdrawal bounds for one payment provider, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLimits {
    pub min_deposit: i64,
    pub max_deposit: i64,
    pub min_withdrawal: i64,
    pub max_withdrawal: i64,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            min_deposit: 500,
            max_deposit: 10_000_000,
            min_withdrawal: 1_000,
            max_withdrawal: 5_000_000,
        }
    }
}

impl ProviderLimits {
    fn from_env(provider: &str) -> Self {
        let prefix = format!("PROVIDER_{}", provider.to_ascii_uppercase());
        let defaults = Self::default();
        Self {
            min_deposit: env::parse_or(&format!("{prefix}_MIN_DEPOSIT"), defaults.min_deposit),
            max_deposit: env::parse_or(&format!("{prefix}_MAX_DEPOSIT"), defaults.max_deposit),
            min_withdrawal: env::parse_or(
                &format!("{prefix}_MIN_WITHDRAWAL"),
                defaults.min_withdrawal,
            ),
            max_withdrawal: env::parse_or(
                &format!("{prefix}_MAX_WITHDRAWAL"),
                defaults.max_withdrawal,
            ),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Smallest accepted stake
    pub min_bet: i64,

    /// Largest accepted stake
    pub max_bet: i64,

    /// Commission rate applied to gross winnings
    pub commission_rate: Decimal,

    pub commission_policy: CommissionPolicy,

    /// Limits keyed by lowercase provider name
    pub providers: HashMap<String, ProviderLimits>,

    /// Time budget for settling a single bet
    pub settlement_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_bet: MIN_BET_AMOUNT,
            max_bet: MAX_BET_AMOUNT,
            commission_rate: COMMISSION_RATE,
            commission_policy: CommissionPolicy::Bookkeeping,
            providers: DEFAULT_PROVIDERS
                .split(',')
                .map(|p| (p.to_string(), ProviderLimits::default()))
                .collect(),
            settlement_timeout: crate::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

impl LedgerConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `MIN_BET_AMOUNT` (default: 100)
    /// - `MAX_BET_AMOUNT` (default: 1000000)
    /// - `COMMISSION_RATE`: decimal fraction (default: 0.10)
    /// - `HOUSE_USER_ID`: switches commission to the house ledger policy when set
    /// - `PAYMENT_PROVIDERS`: comma-separated names (default: card,bank_transfer,crypto)
    /// - `PROVIDER_<NAME>_{MIN,MAX}_{DEPOSIT,WITHDRAWAL}`: per-provider limits
    /// - `SETTLEMENT_TIMEOUT_SECS` (default: 10)
    ///
    /// Unset or malformed values fall back to defaults; call [`LedgerConfig::validate`]
    /// to reject inconsistent combinations.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let providers = std::env::var("PAYMENT_PROVIDERS")
            .unwrap_or_else(|_| DEFAULT_PROVIDERS.to_string())
            .split(',')
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let limits = ProviderLimits::from_env(&p);
                (p, limits)
            })
            .collect();

        let commission_policy = match env::parse_opt::<i64>("HOUSE_USER_ID") {
            Some(house_user_id) => CommissionPolicy::HouseLedger { house_user_id },
            None => CommissionPolicy::Bookkeeping,
        };

        Self {
            min_bet: env::parse_or("MIN_BET_AMOUNT", defaults.min_bet),
            max_bet: env::parse_or("MAX_BET_AMOUNT", defaults.max_bet),
            commission_rate: env::parse_or("COMMISSION_RATE", defaults.commission_rate),
            commission_policy,
            providers,
            settlement_timeout: Duration::from_secs(env::parse_or(
                "SETTLEMENT_TIMEOUT_SECS",
                defaults.settlement_timeout.as_secs(),
            )),
        }
    }

    /// Reject configurations that would break ledger invariants.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.require_positive("min_bet", self.min_bet)
            .check(self.max_bet >= self.min_bet, "max_bet", "must be >= min_bet")
            .check(
                self.commission_rate >= Decimal::ZERO && self.commission_rate < Decimal::ONE,
                "commission_rate",
                "must be in [0, 1)",
            )
            .check(
                !self.providers.is_empty(),
                "providers",
                "at least one payment provider is required",
            )
            .check(
                !self.settlement_timeout.is_zero(),
                "settlement_timeout",
                "must be non-zero",
            );

        for (name, limits) in &self.providers {
            v.check(
                limits.min_deposit > 0 && limits.min_deposit <= limits.max_deposit,
                &format!("providers.{name}.deposit"),
                "min must be positive and <= max",
            )
            .check(
                limits.min_withdrawal > 0 && limits.min_withdrawal <= limits.max_withdrawal,
                &format!("providers.{name}.withdrawal"),
                "min must be positive and <= max",
            );
        }

        v.finish(())
    }

    /// Limits for a provider name, case-insensitive
    pub fn provider(&self, name: &str) -> Option<&ProviderLimits> {
        self.providers.get(&name.trim().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_commission_rate_constant() {
        assert_eq!(COMMISSION_RATE.to_string(), "0.10");
    }

    #[test]
    fn test_default_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_bet, 100);
        assert_eq!(config.max_bet, 1_000_000);
        assert_eq!(config.commission_policy, CommissionPolicy::Bookkeeping);
        assert!(config.provider("CARD").is_some());
        assert!(config.provider("paypal").is_none());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = LedgerConfig {
            min_bet: 500,
            max_bet: 100,
            commission_rate: Decimal::ONE,
            ..LedgerConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["max_bet", "commission_rate"]);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_providers_and_house() {
        unsafe {
            std::env::set_var("PAYMENT_PROVIDERS", "Card, paypal");
            std::env::set_var("PROVIDER_PAYPAL_MIN_DEPOSIT", "2500");
            std::env::set_var("HOUSE_USER_ID", "1");
            std::env::set_var("COMMISSION_RATE", "0.05");
        }

        let config = LedgerConfig::from_env();

        unsafe {
            std::env::remove_var("PAYMENT_PROVIDERS");
            std::env::remove_var("PROVIDER_PAYPAL_MIN_DEPOSIT");
            std::env::remove_var("HOUSE_USER_ID");
            std::env::remove_var("COMMISSION_RATE");
        }

        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.provider("paypal").unwrap().min_deposit, 2_500);
        assert_eq!(config.provider("card").unwrap().min_deposit, 500);
        assert_eq!(
            config.commission_policy,
            CommissionPolicy::HouseLedger { house_user_id: 1 }
        );
        assert_eq!(config.commission_rate, Decimal::new(5, 2));
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_malformed_values() {
        unsafe {
            std::env::set_var("MIN_BET_AMOUNT", "lots");
        }
        let config = LedgerConfig::from_env();
        unsafe {
            std::env::remove_var("MIN_BET_AMOUNT");
        }
        assert_eq!(config.min_bet, MIN_BET_AMOUNT);
    }
}

//! Ledger primitives shared by the wallet, transaction and betting modules.
//!
//! - [`Money`]: a positive amount in integer minor units
//! - [`payout`] and [`commission`]: exact decimal arithmetic, rounded down
//! - [`LedgerConfig`]: bet bounds, commission policy and payment provider limits
//! - [`LedgerError`]: the error taxonomy for every money-moving operation

pub mod config;
pub mod errors;
pub mod money;

pub use config::{
    COMMISSION_RATE, CommissionPolicy, LedgerConfig, MAX_BET_AMOUNT, MIN_BET_AMOUNT,
    ProviderLimits,
};
pub use errors::{LedgerError, LedgerResult};
pub use money::{Corner, Money, commission, payout, validate_odds};

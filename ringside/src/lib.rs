//! # Ringside
//!
//! Money-handling core of a fight-betting platform: wallets, an append-only
//! transaction log, bet placement and settlement, a fighter/fight catalog,
//! authentication and a login attempt throttle.
//!
//! ## Architecture
//!
//! Components, in dependency order:
//!
//! - **Ledger primitives** ([`ledger`]): positive money amounts, odds payout and
//!   commission arithmetic.
//! - **Wallet store** ([`wallet`]): balance, bonus balance and locked balance per
//!   user. Only the transaction log mutates wallets.
//! - **Transaction log** ([`transaction`]): every money movement is a row with a
//!   `PENDING → CONFIRMED | FAILED | CANCELLED` lifecycle.
//! - **Bet engine** ([`betting`]): placement, acceptance, cancellation and
//!   fail-forward settlement against fight results.
//! - **Login throttle** ([`security`]): per-IP sliding-window failure counter.
//!
//! Supporting modules: [`db`], [`catalog`], [`auth`], [`notify`], [`validation`].
//!
//! All authoritative state lives in PostgreSQL. Every operation that moves money
//! runs inside one `sqlx` transaction, so a balance change and its transaction row
//! commit or roll back together.
//!
//! ## Example
//!
//! ```no_run
//! use ringside::{
//!     betting::BetManager,
//!     catalog::CatalogManager,
//!     db::{Database, DatabaseConfig},
//!     ledger::{Corner, LedgerConfig, Money},
//!     notify::NotificationDispatcher,
//!     transaction::TransactionManager,
//!     wallet::WalletManager,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(&DatabaseConfig::from_env()).await?;
//! let pool = Arc::new(db.pool().clone());
//! let config = LedgerConfig::from_env();
//!
//! let wallets = Arc::new(WalletManager::new(pool.clone()));
//! let transactions = Arc::new(TransactionManager::new(pool.clone(), config.clone()));
//! let notifications = Arc::new(NotificationDispatcher::new(pool.clone()));
//! let catalog = Arc::new(CatalogManager::new(pool.clone()));
//! let bets = BetManager::new(pool, config, transactions, notifications);
//!
//! let bet = bets.place_bet(1, 7, Money::new(1_000)?, Corner::A).await?;
//! println!("potential win: {}", bet.potential_win);
//! # let _ = (wallets, catalog);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod betting;
pub mod catalog;
pub mod db;
mod env;
pub mod ledger;
pub mod notify;
pub mod security;
pub mod transaction;
pub mod validation;
pub mod wallet;

pub use ledger::{Corner, LedgerError, LedgerResult, Money};

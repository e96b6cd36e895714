//! Wallet store: balance, bonus balance and locked balance per user.
//!
//! Reads are public. Every mutator is crate-private and takes an open
//! connection, so the only way to move money is through the transaction log,
//! which writes the balance change and its transaction row in one unit.
//!
//! ## Example
//!
//! ```no_run
//! use ringside::{db::Database, wallet::WalletManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let wallets = WalletManager::new(Arc::new(db.pool().clone()));
//!
//!     let wallet = wallets.get_wallet(1).await?;
//!     println!("available {} locked {}", wallet.balance, wallet.locked_balance);
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::WalletManager;
pub use models::Wallet;

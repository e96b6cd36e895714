//! Transaction log: the append-only record of every money movement.
//!
//! Each row has a `PENDING → CONFIRMED | FAILED | CANCELLED` lifecycle and
//! leaves `PENDING` at most once. Deposits and withdrawals wait in `PENDING`
//! for the payment provider; every other type is applied and confirmed in the
//! same database transaction that writes it.
//!
//! | Type        | On record            | On confirm                   | On fail / cancel    |
//! |-------------|----------------------|------------------------------|---------------------|
//! | DEPOSIT     | nothing              | credit `balance`             | nothing             |
//! | WITHDRAWAL  | `balance` → locked   | locked funds leave           | locked → `balance`  |
//! | BET_PLACED  | debit `balance`      |                              |                     |
//! | BET_WIN     | credit `balance`     |                              |                     |
//! | BET_REFUND  | credit `balance`     |                              |                     |
//! | BONUS       | credit bonus balance |                              |                     |
//! | PENALTY     | debit `balance`      |                              |                     |
//! | COMMISSION  | per [`CommissionPolicy`](crate::ledger::CommissionPolicy) |  |                     |

pub mod manager;
pub mod models;

pub use manager::TransactionManager;
pub use models::{
    LedgerEntry, ProviderOutcome, Transaction, TransactionStatus, TransactionType, WalletEffect,
};

//! Bet engine: placement, acceptance, cancellation and settlement.
//!
//! ```text
//! PENDING ──accept──▶ ACCEPTED ──fight postponed──▶ POSTPONED
//!    │                   │  ▲                          │
//!    │                   │  └──fight rescheduled───────┘
//!    │                   ▼
//!    ├──settle──▶ WON | LOST ◀──settle── (ACCEPTED, POSTPONED)
//!    │
//!    └──cancel / fight cancelled──▶ CANCELLED ◀── fight cancelled (ACCEPTED, POSTPONED)
//! ```
//!
//! Odds are captured when a bet is placed and never recomputed. Settlement of
//! a fight is fail-forward: every bet is settled in its own database
//! transaction with a compare-and-set on its status, so one failing bet stays
//! unsettled while the rest proceed, and a retry picks up only what is left.

pub mod manager;
pub mod models;

pub use manager::BetManager;
pub use models::{
    Bet, BetFailure, BetOutcome, BetStatus, SettlementReport, SettlementStatus, settle_outcome,
};

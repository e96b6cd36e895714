//! Fighter and fight catalog.
//!
//! Fights move through `SCHEDULED → LIVE → FINISHED`, may be postponed and
//! rescheduled before they finish, and can be cancelled at any point before a
//! result exists. A recorded [`FightResult`] is immutable.

pub mod manager;
pub mod models;

pub use manager::CatalogManager;
pub(crate) use manager::FightLock;
pub use models::{
    Fight, FightResult, FightStatus, Fighter, FighterUpdate, NewFight, NewFighter,
};

//! Catalog data models.

use crate::{
    ledger::{Corner, LedgerError, validate_odds},
    validation::{Validated, Validator},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use std::{fmt, str::FromStr};

/// Fight lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FightStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl FightStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FightStatus::Scheduled => "SCHEDULED",
            FightStatus::Live => "LIVE",
            FightStatus::Finished => "FINISHED",
            FightStatus::Postponed => "POSTPONED",
            FightStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FightStatus::Finished | FightStatus::Cancelled)
    }

    /// Whether new bets and odds changes are still accepted
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: FightStatus) -> bool {
        use FightStatus::*;
        matches!(
            (self, next),
            (Scheduled, Live)
                | (Scheduled | Live | Postponed, Finished)
                | (Scheduled | Live, Postponed)
                | (Postponed, Scheduled)
                | (Scheduled | Live | Postponed, Cancelled)
        )
    }
}

impl fmt::Display for FightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FightStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(FightStatus::Scheduled),
            "LIVE" => Ok(FightStatus::Live),
            "FINISHED" => Ok(FightStatus::Finished),
            "POSTPONED" => Ok(FightStatus::Postponed),
            "CANCELLED" => Ok(FightStatus::Cancelled),
            other => Err(LedgerError::invalid(
                "status",
                format!("unknown fight status {other:?}"),
            )),
        }
    }
}

/// Fighter model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fighter {
    pub id: i64,
    pub name: String,
    pub nickname: Option<String>,
    pub weight_class: String,
    pub country: Option<String>,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fighter {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            nickname: row.try_get("nickname")?,
            weight_class: row.try_get("weight_class")?,
            country: row.try_get("country")?,
            wins: row.try_get("wins")?,
            losses: row.try_get("losses")?,
            draws: row.try_get("draws")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Fighter creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFighter {
    pub name: String,
    pub nickname: Option<String>,
    pub weight_class: String,
    pub country: Option<String>,
}

impl NewFighter {
    pub fn validate(self) -> Validated<Self> {
        let mut v = Validator::new();
        v.require_len("name", &self.name, 2, 100)
            .require_len("weightClass", &self.weight_class, 2, 50);
        if let Some(nickname) = &self.nickname {
            v.require_len("nickname", nickname, 1, 100);
        }
        if let Some(country) = &self.country {
            v.require_len("country", country, 2, 100);
        }
        v.finish(self)
    }
}

/// Partial fighter update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FighterUpdate {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub weight_class: Option<String>,
    pub country: Option<String>,
}

impl FighterUpdate {
    pub fn validate(self) -> Validated<Self> {
        let mut v = Validator::new();
        if let Some(name) = &self.name {
            v.require_len("name", name, 2, 100);
        }
        if let Some(weight_class) = &self.weight_class {
            v.require_len("weightClass", weight_class, 2, 50);
        }
        if let Some(nickname) = &self.nickname {
            v.require_len("nickname", nickname, 1, 100);
        }
        if let Some(country) = &self.country {
            v.require_len("country", country, 2, 100);
        }
        v.finish(self)
    }
}

/// Fight model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fight {
    pub id: i64,
    pub event_name: String,
    pub fighter_a_id: i64,
    pub fighter_b_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: FightStatus,
    pub odds_a: Decimal,
    pub odds_b: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fight {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, LedgerError> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            event_name: row.try_get("event_name")?,
            fighter_a_id: row.try_get("fighter_a_id")?,
            fighter_b_id: row.try_get("fighter_b_id")?,
            scheduled_at: row.try_get("scheduled_at")?,
            status: status
                .parse()
                .map_err(|_| LedgerError::Corrupt(format!("fight status {status:?}")))?,
            odds_a: row.try_get("odds_a")?,
            odds_b: row.try_get("odds_b")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Current odds for one corner
    pub fn odds_for(&self, corner: Corner) -> Decimal {
        match corner {
            Corner::A => self.odds_a,
            Corner::B => self.odds_b,
        }
    }

    pub fn fighter_in(&self, corner: Corner) -> i64 {
        match corner {
            Corner::A => self.fighter_a_id,
            Corner::B => self.fighter_b_id,
        }
    }
}

/// Fight creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFight {
    pub event_name: String,
    pub fighter_a_id: i64,
    pub fighter_b_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub odds_a: Decimal,
    pub odds_b: Decimal,
}

impl NewFight {
    pub fn validate(self) -> Validated<Self> {
        let mut v = Validator::new();
        v.require_len("eventName", &self.event_name, 2, 200)
            .require_positive("fighterAId", self.fighter_a_id)
            .require_positive("fighterBId", self.fighter_b_id)
            .check(
                self.fighter_a_id != self.fighter_b_id,
                "fighterBId",
                "must differ from fighterAId",
            );
        v.merge(validate_odds("oddsA", self.odds_a))
            .merge(validate_odds("oddsB", self.odds_b));
        v.finish(self)
    }
}

/// The immutable outcome of a finished fight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightResult {
    pub fight_id: i64,
    pub winner: Corner,
    pub method: Option<String>,
    pub round: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

impl FightResult {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, LedgerError> {
        let winner: String = row.try_get("winner")?;
        Ok(Self {
            fight_id: row.try_get("fight_id")?,
            winner: winner
                .parse()
                .map_err(|_| LedgerError::Corrupt(format!("fight winner {winner:?}")))?,
            method: row.try_get("method")?,
            round: row.try_get("round")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_fight() -> NewFight {
        NewFight {
            event_name: "Fight Night 12".to_string(),
            fighter_a_id: 1,
            fighter_b_id: 2,
            scheduled_at: Utc::now(),
            odds_a: Decimal::from_str("1.85").unwrap(),
            odds_b: Decimal::from_str("2.10").unwrap(),
        }
    }

    #[test]
    fn test_fight_lifecycle() {
        use FightStatus::*;
        assert!(Scheduled.can_transition_to(Live));
        assert!(Live.can_transition_to(Finished));
        assert!(Scheduled.can_transition_to(Postponed));
        assert!(Postponed.can_transition_to(Scheduled));
        assert!(Postponed.can_transition_to(Cancelled));
        assert!(!Finished.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!Live.can_transition_to(Scheduled));
        assert!(!Postponed.can_transition_to(Live));
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("live".parse::<FightStatus>().unwrap(), FightStatus::Live);
        assert!("over".parse::<FightStatus>().is_err());
    }

    #[test]
    fn test_new_fight_validation() {
        assert!(new_fight().validate().is_ok());

        let same_fighters = NewFight {
            fighter_b_id: 1,
            ..new_fight()
        };
        assert_eq!(
            same_fighters.validate().unwrap_err().fields(),
            vec!["fighterBId"]
        );

        let bad_odds = NewFight {
            odds_a: Decimal::ONE,
            odds_b: Decimal::from_str("0.9").unwrap(),
            ..new_fight()
        };
        assert_eq!(bad_odds.validate().unwrap_err().fields(), vec!["oddsA", "oddsB"]);
    }

    #[test]
    fn test_new_fighter_validation() {
        let fighter = NewFighter {
            name: "X".to_string(),
            nickname: None,
            weight_class: "Lightweight".to_string(),
            country: Some("".to_string()),
        };
        assert_eq!(fighter.validate().unwrap_err().fields(), vec!["name", "country"]);
    }
}

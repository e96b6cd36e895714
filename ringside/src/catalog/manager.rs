//! Catalog manager: fighters, fights, odds and results.

use super::models::{
    Fight, FightResult, FightStatus, Fighter, FighterUpdate, NewFight, NewFighter,
};
use crate::{
    ledger::{Corner, LedgerError, LedgerResult, validate_odds},
    validation::Validator,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;

const FIGHTER_COLUMNS: &str =
    "id, name, nickname, weight_class, country, wins, losses, draws, created_at, updated_at";

const FIGHT_COLUMNS: &str = "id, event_name, fighter_a_id, fighter_b_id, scheduled_at, status, \
     odds_a, odds_b, created_at, updated_at";

const RESULT_COLUMNS: &str = "fight_id, winner, method, round, recorded_at";

/// Row lock taken when reading a fight inside a database transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FightLock {
    /// Plain read
    None,
    /// Blocks status changes while bets are placed
    Share,
    /// Serializes status changes
    Update,
}

/// Catalog manager
#[derive(Clone)]
pub struct CatalogManager {
    pool: Arc<PgPool>,
}

impl CatalogManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn create_fighter(&self, fighter: NewFighter) -> LedgerResult<Fighter> {
        let fighter = fighter.validate()?;

        let row = sqlx::query(&format!(
            "INSERT INTO fighters (name, nickname, weight_class, country)
             VALUES ($1, $2, $3, $4)
             RETURNING {FIGHTER_COLUMNS}"
        ))
        .bind(fighter.name.trim())
        .bind(fighter.nickname.as_deref().map(str::trim))
        .bind(fighter.weight_class.trim())
        .bind(fighter.country.as_deref().map(str::trim))
        .fetch_one(self.pool.as_ref())
        .await?;

        let fighter = Fighter::from_row(&row)?;
        log::info!("Created fighter {} ({})", fighter.id, fighter.name);
        Ok(fighter)
    }

    pub async fn update_fighter(&self, id: i64, update: FighterUpdate) -> LedgerResult<Fighter> {
        let update = update.validate()?;

        let row = sqlx::query(&format!(
            "UPDATE fighters SET
                name = COALESCE($1, name),
                nickname = COALESCE($2, nickname),
                weight_class = COALESCE($3, weight_class),
                country = COALESCE($4, country),
                updated_at = NOW()
             WHERE id = $5
             RETURNING {FIGHTER_COLUMNS}"
        ))
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.nickname.as_deref().map(str::trim))
        .bind(update.weight_class.as_deref().map(str::trim))
        .bind(update.country.as_deref().map(str::trim))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| LedgerError::not_found("Fighter", id))?;

        Ok(Fighter::from_row(&row)?)
    }

    pub async fn get_fighter(&self, id: i64) -> LedgerResult<Fighter> {
        let row = sqlx::query(&format!("SELECT {FIGHTER_COLUMNS} FROM fighters WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::not_found("Fighter", id))?;

        Ok(Fighter::from_row(&row)?)
    }

    /// Fighters ordered by name
    pub async fn list_fighters(&self, limit: i64, offset: i64) -> LedgerResult<Vec<Fighter>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIGHTER_COLUMNS} FROM fighters ORDER BY name, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit.clamp(1, 100))
        .bind(offset.max(0))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .iter()
            .map(Fighter::from_row)
            .collect::<Result<_, _>>()?)
    }

    /// Schedule a fight between two existing fighters
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Same fighter twice, odds not above 1, bad event name
    /// * `LedgerError::NotFound` - Either fighter does not exist
    pub async fn create_fight(&self, fight: NewFight) -> LedgerResult<Fight> {
        let fight = fight.validate()?;

        let mut tx = self.pool.begin().await?;
        for fighter_id in [fight.fighter_a_id, fight.fighter_b_id] {
            sqlx::query("SELECT id FROM fighters WHERE id = $1 FOR SHARE")
                .bind(fighter_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| LedgerError::not_found("Fighter", fighter_id))?;
        }

        let row = sqlx::query(&format!(
            "INSERT INTO fights (event_name, fighter_a_id, fighter_b_id, scheduled_at, odds_a, odds_b)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {FIGHT_COLUMNS}"
        ))
        .bind(fight.event_name.trim())
        .bind(fight.fighter_a_id)
        .bind(fight.fighter_b_id)
        .bind(fight.scheduled_at)
        .bind(fight.odds_a)
        .bind(fight.odds_b)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let fight = Fight::from_row(&row)?;
        log::info!(
            "Scheduled fight {} ({} vs {}) at {}",
            fight.id,
            fight.fighter_a_id,
            fight.fighter_b_id,
            fight.scheduled_at
        );
        Ok(fight)
    }

    pub async fn get_fight(&self, id: i64) -> LedgerResult<Fight> {
        let row = sqlx::query(&format!("SELECT {FIGHT_COLUMNS} FROM fights WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::not_found("Fight", id))?;

        Fight::from_row(&row)
    }

    /// Fights in schedule order, optionally filtered by status
    pub async fn list_fights(
        &self,
        status: Option<FightStatus>,
        limit: i64,
    ) -> LedgerResult<Vec<Fight>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIGHT_COLUMNS} FROM fights
             WHERE $1::text IS NULL OR status = $1
             ORDER BY scheduled_at, id
             LIMIT $2"
        ))
        .bind(status.map(FightStatus::as_str))
        .bind(limit.clamp(1, 100))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(Fight::from_row).collect()
    }

    /// Replace both corners' odds on an unfinished fight
    ///
    /// Bets already placed keep the odds they captured.
    pub async fn update_odds(
        &self,
        fight_id: i64,
        odds_a: Decimal,
        odds_b: Decimal,
    ) -> LedgerResult<Fight> {
        let mut v = Validator::new();
        v.merge(validate_odds("oddsA", odds_a))
            .merge(validate_odds("oddsB", odds_b));
        v.finish(())?;

        let mut tx = self.pool.begin().await?;
        let current = Self::fetch_fight(&mut tx, fight_id, FightLock::Update).await?;
        if !current.status.is_open() {
            return Err(LedgerError::invalid_state(format!(
                "cannot change odds of a {} fight",
                current.status
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE fights SET odds_a = $1, odds_b = $2, updated_at = NOW()
             WHERE id = $3
             RETURNING {FIGHT_COLUMNS}"
        ))
        .bind(odds_a)
        .bind(odds_b)
        .bind(fight_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        log::info!("Odds for fight {fight_id} set to {odds_a} / {odds_b}");
        Fight::from_row(&row)
    }

    /// SCHEDULED → LIVE
    pub async fn start_fight(&self, fight_id: i64) -> LedgerResult<Fight> {
        let mut tx = self.pool.begin().await?;
        let fight = Self::transition(&mut tx, fight_id, FightStatus::Live, None).await?;
        tx.commit().await?;
        Ok(fight)
    }

    /// The recorded result, if the fight has finished
    pub async fn get_result(&self, fight_id: i64) -> LedgerResult<Option<FightResult>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_result(&mut conn, fight_id).await
    }

    pub(crate) async fn fetch_fight(
        conn: &mut PgConnection,
        fight_id: i64,
        lock: FightLock,
    ) -> LedgerResult<Fight> {
        let clause = match lock {
            FightLock::None => "",
            FightLock::Share => "FOR SHARE",
            FightLock::Update => "FOR UPDATE",
        };
        let row = sqlx::query(&format!(
            "SELECT {FIGHT_COLUMNS} FROM fights WHERE id = $1 {clause}"
        ))
        .bind(fight_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Fight", fight_id))?;

        Fight::from_row(&row)
    }

    pub(crate) async fn fetch_result(
        conn: &mut PgConnection,
        fight_id: i64,
    ) -> LedgerResult<Option<FightResult>> {
        let row = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM fight_results WHERE fight_id = $1"
        ))
        .bind(fight_id)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(FightResult::from_row).transpose()
    }

    /// Move a fight to `next`, optionally moving its schedule
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidState` - `next` is not reachable from the current status
    pub(crate) async fn transition(
        conn: &mut PgConnection,
        fight_id: i64,
        next: FightStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> LedgerResult<Fight> {
        let current = Self::fetch_fight(conn, fight_id, FightLock::Update).await?;
        if !current.status.can_transition_to(next) {
            return Err(LedgerError::invalid_state(format!(
                "fight cannot move from {} to {}",
                current.status, next
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE fights
             SET status = $1, scheduled_at = COALESCE($2, scheduled_at), updated_at = NOW()
             WHERE id = $3
             RETURNING {FIGHT_COLUMNS}"
        ))
        .bind(next.as_str())
        .bind(scheduled_at)
        .bind(fight_id)
        .fetch_one(&mut *conn)
        .await?;

        log::info!("Fight {} moved {} → {}", fight_id, current.status, next);
        Fight::from_row(&row)
    }

    /// Record a fight's result, finish it and update both fighters' records
    ///
    /// Returns the stored result and whether this call recorded it. Recording the
    /// same winner again is a no-op retry; a different winner is rejected.
    pub(crate) async fn record_result(
        conn: &mut PgConnection,
        fight_id: i64,
        winner: Corner,
        method: Option<&str>,
        round: Option<i32>,
    ) -> LedgerResult<(FightResult, bool)> {
        let fight = Self::fetch_fight(conn, fight_id, FightLock::Update).await?;

        if let Some(existing) = Self::fetch_result(conn, fight_id).await? {
            if existing.winner != winner {
                return Err(LedgerError::invalid_state(format!(
                    "fight result already recorded with winner {}",
                    existing.winner
                )));
            }
            return Ok((existing, false));
        }

        if !fight.status.can_transition_to(FightStatus::Finished) {
            return Err(LedgerError::invalid_state(format!(
                "cannot record a result for a {} fight",
                fight.status
            )));
        }

        let mut v = Validator::new();
        if let Some(round) = round {
            v.require_range("round", i64::from(round), 1, 12);
        }
        if let Some(method) = method {
            v.require_len("method", method, 1, 100);
        }
        v.finish(())?;

        let row = sqlx::query(&format!(
            "INSERT INTO fight_results (fight_id, winner, method, round)
             VALUES ($1, $2, $3, $4)
             RETURNING {RESULT_COLUMNS}"
        ))
        .bind(fight_id)
        .bind(winner.as_str())
        .bind(method.map(str::trim))
        .bind(round)
        .fetch_one(&mut *conn)
        .await?;
        let result = FightResult::from_row(&row)?;

        sqlx::query("UPDATE fights SET status = 'FINISHED', updated_at = NOW() WHERE id = $1")
            .bind(fight_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("UPDATE fighters SET wins = wins + 1, updated_at = NOW() WHERE id = $1")
            .bind(fight.fighter_in(winner))
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE fighters SET losses = losses + 1, updated_at = NOW() WHERE id = $1")
            .bind(fight.fighter_in(winner.opposite()))
            .execute(&mut *conn)
            .await?;

        log::info!("Fight {fight_id} finished, winner {winner}");
        Ok((result, true))
    }
}

//! Bet manager: every bet mutation paired with its transaction-log entry.

use super::models::{
    Bet, BetOutcome, BetStatus, SettlementReport, SettlementStatus, settle_outcome,
};
use crate::{
    catalog::{CatalogManager, Fight, FightLock, FightResult, FightStatus},
    db::timeouts::with_timeout,
    ledger::{Corner, LedgerConfig, LedgerError, LedgerResult, Money, payout},
    notify::{Event, NotificationDispatcher, NotificationKind},
    transaction::{LedgerEntry, TransactionManager, TransactionType},
    validation::Validator,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool, Row};
use std::{collections::BTreeMap, sync::Arc};

const BET_COLUMNS: &str = "id, creator_id, fight_id, amount, chosen_fighter, odds, potential_win, \
     status, actual_win, created_at, updated_at, settled_at";

const OPEN_STATUSES: &str = "('PENDING', 'ACCEPTED', 'POSTPONED')";

/// Bet manager
#[derive(Clone)]
pub struct BetManager {
    pool: Arc<PgPool>,
    config: LedgerConfig,
    transactions: Arc<TransactionManager>,
    notifications: Arc<NotificationDispatcher>,
}

impl BetManager {
    pub fn new(
        pool: Arc<PgPool>,
        config: LedgerConfig,
        transactions: Arc<TransactionManager>,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            pool,
            config,
            transactions,
            notifications,
        }
    }

    /// Place a PENDING bet, debiting the stake in the same database transaction
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Stake outside `[min_bet, max_bet]`, or the
    ///   fight is finished or cancelled
    /// * `LedgerError::NotFound` - Unknown fight
    /// * `LedgerError::InsufficientFunds` - Stake exceeds the spendable balance; nothing is written
    pub async fn place_bet(
        &self,
        creator_id: i64,
        fight_id: i64,
        amount: Money,
        chosen_fighter: Corner,
    ) -> LedgerResult<Bet> {
        let mut v = Validator::new();
        v.require_range(
            "amount",
            amount.minor_units(),
            self.config.min_bet,
            self.config.max_bet,
        );
        v.finish(())?;

        let mut tx = self.pool.begin().await?;

        let fight = CatalogManager::fetch_fight(&mut tx, fight_id, FightLock::Share).await?;
        if !fight.status.is_open() {
            return Err(LedgerError::invalid(
                "fightId",
                format!("fight is {} and not open for betting", fight.status),
            ));
        }

        let odds = fight.odds_for(chosen_fighter);
        let potential_win = payout(amount, odds)?;

        let row = sqlx::query(&format!(
            "INSERT INTO bets (creator_id, fight_id, amount, chosen_fighter, odds, potential_win)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {BET_COLUMNS}"
        ))
        .bind(creator_id)
        .bind(fight_id)
        .bind(amount.minor_units())
        .bind(chosen_fighter.as_str())
        .bind(odds)
        .bind(potential_win)
        .fetch_one(&mut *tx)
        .await?;
        let bet = Bet::from_row(&row)?;

        self.transactions
            .record_in(
                &mut tx,
                LedgerEntry::new(creator_id, TransactionType::BetPlaced, amount)
                    .for_bet(bet.id)
                    .with_description(format!("Bet on fight {fight_id}, corner {chosen_fighter}")),
            )
            .await?;

        tx.commit().await?;

        log::info!(
            "Bet {} placed by user {} on fight {} corner {}: {} at {}",
            bet.id,
            creator_id,
            fight_id,
            chosen_fighter,
            amount,
            odds
        );
        self.publish_update(&bet);
        Ok(bet)
    }

    /// PENDING → ACCEPTED
    pub async fn accept_bet(&self, bet_id: i64) -> LedgerResult<Bet> {
        let row = sqlx::query(&format!(
            "UPDATE bets SET status = 'ACCEPTED', updated_at = NOW()
             WHERE id = $1 AND status = 'PENDING'
             RETURNING {BET_COLUMNS}"
        ))
        .bind(bet_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let bet = match row {
            Some(row) => Bet::from_row(&row)?,
            None => {
                let current = self.get_bet(bet_id).await?;
                return Err(LedgerError::invalid_state(format!(
                    "only PENDING bets can be accepted, bet is {}",
                    current.status
                )));
            }
        };

        log::info!("Bet {bet_id} accepted");
        self.publish_update(&bet);
        self.notifications
            .notify(
                bet.creator_id,
                NotificationKind::BetAccepted,
                "Bet accepted",
                &format!("Your bet of {} on fight {} was accepted", bet.amount, bet.fight_id),
                json!({ "betId": bet.id, "fightId": bet.fight_id }),
            )
            .await;
        Ok(bet)
    }

    /// Cancel one of the requester's PENDING bets and refund the full stake
    ///
    /// Another user's bet is reported as not found.
    pub async fn cancel_bet(&self, bet_id: i64, requester_id: i64) -> LedgerResult<Bet> {
        let mut tx = self.pool.begin().await?;

        let current = fetch_bet_for_update(&mut tx, bet_id).await?;
        if current.creator_id != requester_id {
            return Err(LedgerError::not_found("Bet", bet_id));
        }
        if current.status != BetStatus::Pending {
            return Err(LedgerError::invalid_state(format!(
                "only PENDING bets can be cancelled, bet is {}",
                current.status
            )));
        }

        let bet = self
            .refund_in(&mut tx, &current, "Bet cancelled by user")
            .await?;
        tx.commit().await?;

        log::info!("Bet {bet_id} cancelled by its creator, {} refunded", bet.amount);
        self.publish_update(&bet);
        Ok(bet)
    }

    /// Record a fight's result and settle every open bet on it
    ///
    /// Recording is idempotent for the same winner, so calling this again after
    /// a partial failure resumes settlement. A different winner is rejected.
    /// Bet-level failures are collected in the report rather than returned.
    pub async fn settle_fight(
        &self,
        fight_id: i64,
        winner: Corner,
        method: Option<&str>,
        round: Option<i32>,
    ) -> LedgerResult<SettlementReport> {
        let mut tx = self.pool.begin().await?;
        let (result, recorded) =
            CatalogManager::record_result(&mut tx, fight_id, winner, method, round).await?;
        tx.commit().await?;

        if recorded {
            self.notifications.publish(Event::FightResult {
                fight_id,
                winner: result.winner,
            });
        }

        let mut report = self.settle_open_bets(&result).await?;
        report.result_recorded = recorded;
        Ok(report)
    }

    /// Settle a single open bet against its fight's recorded result
    pub async fn settle_bet(&self, bet_id: i64) -> LedgerResult<Bet> {
        let bet = self.get_bet(bet_id).await?;
        let result = self.get_result(bet.fight_id).await?.ok_or_else(|| {
            LedgerError::invalid_state(format!("fight {} has no result yet", bet.fight_id))
        })?;

        let (bet, outcome) = self.settle_one(bet_id, result.winner).await?;
        self.after_settlement(&bet, outcome).await;
        Ok(bet)
    }

    /// Re-run settlement (or refunds, for a cancelled fight) for the bets left open
    pub async fn retry_settlement(&self, fight_id: i64) -> LedgerResult<SettlementReport> {
        let fight = self.fight(fight_id).await?;
        if fight.status == FightStatus::Cancelled {
            return self.refund_open_bets(fight_id).await;
        }

        let result = self.get_result(fight_id).await?.ok_or_else(|| {
            LedgerError::invalid_state(format!("fight {fight_id} has no result yet"))
        })?;
        self.settle_open_bets(&result).await
    }

    /// Per-status bet counts and the bets still waiting for settlement
    pub async fn settlement_status(&self, fight_id: i64) -> LedgerResult<SettlementStatus> {
        let fight = self.fight(fight_id).await?;
        let result = self.get_result(fight_id).await?;

        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total FROM bets WHERE fight_id = $1 GROUP BY status",
        )
        .bind(fight_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let status: String = row.try_get("status")?;
            let status: BetStatus = status
                .parse()
                .map_err(|_| LedgerError::Corrupt(format!("bet status {status:?}")))?;
            counts.insert(status, row.try_get::<i64, _>("total")?);
        }

        let unsettled_bet_ids = self.open_bet_ids(fight_id).await?;
        let resolved = result.is_some() || fight.status == FightStatus::Cancelled;

        Ok(SettlementStatus {
            fight_id,
            fully_settled: resolved && unsettled_bet_ids.is_empty(),
            result,
            counts,
            unsettled_bet_ids,
        })
    }

    /// Postpone a fight; its ACCEPTED bets become POSTPONED
    pub async fn postpone_fight(&self, fight_id: i64) -> LedgerResult<Fight> {
        let mut tx = self.pool.begin().await?;
        let fight =
            CatalogManager::transition(&mut tx, fight_id, FightStatus::Postponed, None).await?;
        let bets = move_bets(&mut tx, fight_id, BetStatus::Accepted, BetStatus::Postponed).await?;
        tx.commit().await?;

        log::info!("Fight {fight_id} postponed, {} bets postponed", bets.len());
        for bet in &bets {
            self.publish_update(bet);
            self.notifications
                .notify(
                    bet.creator_id,
                    NotificationKind::BetPostponed,
                    "Fight postponed",
                    &format!("Fight {fight_id} was postponed; your bet stays open"),
                    json!({ "betId": bet.id, "fightId": fight_id }),
                )
                .await;
        }
        Ok(fight)
    }

    /// Put a postponed fight back on the schedule; its POSTPONED bets become ACCEPTED
    pub async fn reschedule_fight(
        &self,
        fight_id: i64,
        scheduled_at: DateTime<Utc>,
    ) -> LedgerResult<Fight> {
        let mut tx = self.pool.begin().await?;
        let fight = CatalogManager::transition(
            &mut tx,
            fight_id,
            FightStatus::Scheduled,
            Some(scheduled_at),
        )
        .await?;
        let bets = move_bets(&mut tx, fight_id, BetStatus::Postponed, BetStatus::Accepted).await?;
        tx.commit().await?;

        log::info!(
            "Fight {fight_id} rescheduled for {scheduled_at}, {} bets reinstated",
            bets.len()
        );
        for bet in &bets {
            self.publish_update(bet);
        }
        Ok(fight)
    }

    /// Cancel a fight and refund every open bet on it, fail-forward
    pub async fn cancel_fight(&self, fight_id: i64) -> LedgerResult<SettlementReport> {
        let mut tx = self.pool.begin().await?;
        CatalogManager::transition(&mut tx, fight_id, FightStatus::Cancelled, None).await?;
        tx.commit().await?;

        self.refund_open_bets(fight_id).await
    }

    pub async fn get_bet(&self, bet_id: i64) -> LedgerResult<Bet> {
        let row = sqlx::query(&format!("SELECT {BET_COLUMNS} FROM bets WHERE id = $1"))
            .bind(bet_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::not_found("Bet", bet_id))?;

        Bet::from_row(&row)
    }

    /// A bet as seen by its creator; other users' bets are not found
    pub async fn get_bet_for_user(&self, bet_id: i64, user_id: i64) -> LedgerResult<Bet> {
        let bet = self.get_bet(bet_id).await?;
        if bet.creator_id != user_id {
            return Err(LedgerError::not_found("Bet", bet_id));
        }
        Ok(bet)
    }

    /// The user's bets, newest first, optionally filtered by status
    pub async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<BetStatus>,
        limit: i64,
    ) -> LedgerResult<Vec<Bet>> {
        let rows = sqlx::query(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE creator_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(user_id)
        .bind(status.map(BetStatus::as_str))
        .bind(limit.clamp(1, 100))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(Bet::from_row).collect()
    }

    /// Every bet on a fight, oldest first
    pub async fn list_for_fight(&self, fight_id: i64) -> LedgerResult<Vec<Bet>> {
        let rows = sqlx::query(&format!(
            "SELECT {BET_COLUMNS} FROM bets WHERE fight_id = $1 ORDER BY id"
        ))
        .bind(fight_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(Bet::from_row).collect()
    }

    async fn settle_open_bets(&self, result: &FightResult) -> LedgerResult<SettlementReport> {
        let mut report = SettlementReport::new(result.fight_id, Some(result.winner));

        for bet_id in self.open_bet_ids(result.fight_id).await? {
            match self.settle_one(bet_id, result.winner).await {
                Ok((bet, outcome)) => {
                    report.record(&bet, Some(outcome));
                    self.after_settlement(&bet, outcome).await;
                }
                Err(e) => {
                    log::error!(
                        "Failed to settle bet {} on fight {}: {}",
                        bet_id,
                        result.fight_id,
                        e
                    );
                    report.fail(bet_id, &e);
                }
            }
        }

        log::info!(
            "Fight {} settlement: {} won, {} lost, {} failed, paid {}, commission {}",
            result.fight_id,
            report.won.len(),
            report.lost.len(),
            report.failures.len(),
            report.total_paid,
            report.total_commission
        );
        Ok(report)
    }

    /// Settle one bet in its own database transaction under the settlement timeout
    async fn settle_one(&self, bet_id: i64, winner: Corner) -> LedgerResult<(Bet, BetOutcome)> {
        with_timeout(self.config.settlement_timeout, async {
            let mut tx = self.pool.begin().await?;

            let current = fetch_bet_for_update(&mut tx, bet_id).await?;
            if !BetStatus::OPEN.contains(&current.status) {
                return Err(LedgerError::invalid_state(format!(
                    "bet is already {}",
                    current.status
                )));
            }

            let stake = current.stake()?;
            let outcome = settle_outcome(
                stake,
                current.odds,
                current.chosen_fighter,
                winner,
                self.config.commission_rate,
            )?;

            let row = sqlx::query(&format!(
                "UPDATE bets
                 SET status = $1, actual_win = $2, settled_at = NOW(), updated_at = NOW()
                 WHERE id = $3 AND status IN {OPEN_STATUSES}
                 RETURNING {BET_COLUMNS}"
            ))
            .bind(outcome.status.as_str())
            .bind(outcome.actual_win)
            .bind(bet_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::invalid_state("bet was settled concurrently"))?;
            let bet = Bet::from_row(&row)?;

            if outcome.status == BetStatus::Won {
                let win = Money::new(outcome.actual_win)?;
                self.transactions
                    .record_in(
                        &mut tx,
                        LedgerEntry::new(bet.creator_id, TransactionType::BetWin, win)
                            .for_bet(bet.id)
                            .with_description(format!("Winnings for bet {}", bet.id)),
                    )
                    .await?;

                if outcome.commission > 0 {
                    self.transactions
                        .record_in(
                            &mut tx,
                            LedgerEntry::new(
                                bet.creator_id,
                                TransactionType::Commission,
                                Money::new(outcome.commission)?,
                            )
                            .for_bet(bet.id),
                        )
                        .await?;
                }
            }

            tx.commit().await?;
            Ok::<_, LedgerError>((bet, outcome))
        })
        .await
    }

    async fn refund_open_bets(&self, fight_id: i64) -> LedgerResult<SettlementReport> {
        let mut report = SettlementReport::new(fight_id, None);

        for bet_id in self.open_bet_ids(fight_id).await? {
            match self.refund_one(bet_id).await {
                Ok(bet) => {
                    report.record(&bet, None);
                    self.publish_update(&bet);
                    self.notifications
                        .notify(
                            bet.creator_id,
                            NotificationKind::BetRefunded,
                            "Bet refunded",
                            &format!("Fight {fight_id} was cancelled; {} refunded", bet.amount),
                            json!({ "betId": bet.id, "fightId": fight_id, "amount": bet.amount }),
                        )
                        .await;
                }
                Err(e) => {
                    log::error!("Failed to refund bet {bet_id} on fight {fight_id}: {e}");
                    report.fail(bet_id, &e);
                }
            }
        }

        log::info!(
            "Fight {} cancelled: {} bets refunded ({}), {} failed",
            fight_id,
            report.refunded.len(),
            report.total_refunded,
            report.failures.len()
        );
        Ok(report)
    }

    async fn refund_one(&self, bet_id: i64) -> LedgerResult<Bet> {
        with_timeout(self.config.settlement_timeout, async {
            let mut tx = self.pool.begin().await?;
            let current = fetch_bet_for_update(&mut tx, bet_id).await?;
            if !BetStatus::OPEN.contains(&current.status) {
                return Err(LedgerError::invalid_state(format!(
                    "bet is already {}",
                    current.status
                )));
            }
            let bet = self
                .refund_in(&mut tx, &current, "Refund for cancelled fight")
                .await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(bet)
        })
        .await
    }

    /// Mark an open bet CANCELLED and record a BET_REFUND of its full stake
    async fn refund_in(
        &self,
        conn: &mut PgConnection,
        current: &Bet,
        description: &str,
    ) -> LedgerResult<Bet> {
        let row = sqlx::query(&format!(
            "UPDATE bets SET status = 'CANCELLED', updated_at = NOW()
             WHERE id = $1 AND status IN {OPEN_STATUSES}
             RETURNING {BET_COLUMNS}"
        ))
        .bind(current.id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::invalid_state("bet was settled concurrently"))?;
        let bet = Bet::from_row(&row)?;

        self.transactions
            .record_in(
                conn,
                LedgerEntry::new(bet.creator_id, TransactionType::BetRefund, current.stake()?)
                    .for_bet(bet.id)
                    .with_description(description),
            )
            .await?;

        Ok(bet)
    }

    async fn after_settlement(&self, bet: &Bet, outcome: BetOutcome) {
        self.publish_update(bet);

        let (kind, title, body) = match outcome.status {
            BetStatus::Won => (
                NotificationKind::BetWon,
                "Bet won",
                format!("Your bet on fight {} won {}", bet.fight_id, outcome.actual_win),
            ),
            _ => (
                NotificationKind::BetLost,
                "Bet lost",
                format!("Your bet of {} on fight {} lost", bet.amount, bet.fight_id),
            ),
        };
        self.notifications
            .notify(
                bet.creator_id,
                kind,
                title,
                &body,
                json!({ "betId": bet.id, "fightId": bet.fight_id, "actualWin": outcome.actual_win }),
            )
            .await;
    }

    fn publish_update(&self, bet: &Bet) {
        self.notifications.publish(Event::BetUpdate {
            user_id: bet.creator_id,
            bet_id: bet.id,
            fight_id: bet.fight_id,
            status: bet.status,
            actual_win: bet.actual_win,
        });
    }

    async fn open_bet_ids(&self, fight_id: i64) -> LedgerResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM bets WHERE fight_id = $1 AND status IN {OPEN_STATUSES} ORDER BY id"
        ))
        .bind(fight_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids)
    }

    async fn fight(&self, fight_id: i64) -> LedgerResult<Fight> {
        let mut conn = self.pool.acquire().await?;
        CatalogManager::fetch_fight(&mut conn, fight_id, FightLock::None).await
    }

    async fn get_result(&self, fight_id: i64) -> LedgerResult<Option<FightResult>> {
        let mut conn = self.pool.acquire().await?;
        CatalogManager::fetch_result(&mut conn, fight_id).await
    }
}

async fn fetch_bet_for_update(conn: &mut PgConnection, bet_id: i64) -> LedgerResult<Bet> {
    let row = sqlx::query(&format!(
        "SELECT {BET_COLUMNS} FROM bets WHERE id = $1 FOR UPDATE"
    ))
    .bind(bet_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| LedgerError::not_found("Bet", bet_id))?;

    Bet::from_row(&row)
}

/// Move every bet on a fight from one status to another, returning the moved bets
async fn move_bets(
    conn: &mut PgConnection,
    fight_id: i64,
    from: BetStatus,
    to: BetStatus,
) -> LedgerResult<Vec<Bet>> {
    debug_assert!(from.can_transition_to(to));

    let rows = sqlx::query(&format!(
        "UPDATE bets SET status = $1, updated_at = NOW()
         WHERE fight_id = $2 AND status = $3
         RETURNING {BET_COLUMNS}"
    ))
    .bind(to.as_str())
    .bind(fight_id)
    .bind(from.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Bet::from_row).collect()
}

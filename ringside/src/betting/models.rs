//! Bet data models and settlement arithmetic.

use crate::{
    catalog::FightResult,
    ledger::{Corner, LedgerError, LedgerResult, Money, commission, payout},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Bet lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    Pending,
    Accepted,
    Won,
    Lost,
    Cancelled,
    Postponed,
}

impl BetStatus {
    pub const ALL: [BetStatus; 6] = [
        BetStatus::Pending,
        BetStatus::Accepted,
        BetStatus::Won,
        BetStatus::Lost,
        BetStatus::Cancelled,
        BetStatus::Postponed,
    ];

    /// Statuses a bet can be settled or refunded from
    pub const OPEN: [BetStatus; 3] = [BetStatus::Pending, BetStatus::Accepted, BetStatus::Postponed];

    pub fn as_str(self) -> &'static str {
        match self {
            BetStatus::Pending => "PENDING",
            BetStatus::Accepted => "ACCEPTED",
            BetStatus::Won => "WON",
            BetStatus::Lost => "LOST",
            BetStatus::Cancelled => "CANCELLED",
            BetStatus::Postponed => "POSTPONED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BetStatus::Won | BetStatus::Lost | BetStatus::Cancelled)
    }

    pub fn is_settled(self) -> bool {
        matches!(self, BetStatus::Won | BetStatus::Lost)
    }

    pub fn can_transition_to(self, next: BetStatus) -> bool {
        use BetStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending | Accepted | Postponed, Won | Lost | Cancelled)
                | (Accepted, Postponed)
                | (Postponed, Accepted)
        )
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        BetStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| LedgerError::invalid("status", format!("unknown bet status {s:?}")))
    }
}

/// Bet model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: i64,
    pub creator_id: i64,
    pub fight_id: i64,
    pub amount: i64,
    pub chosen_fighter: Corner,
    /// Odds captured at placement
    pub odds: Decimal,
    /// `floor(amount * odds)`
    pub potential_win: i64,
    pub status: BetStatus,
    /// Gross payout, 0 until the bet is won
    pub actual_win: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, LedgerError> {
        let corner: String = row.try_get("chosen_fighter")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            creator_id: row.try_get("creator_id")?,
            fight_id: row.try_get("fight_id")?,
            amount: row.try_get("amount")?,
            chosen_fighter: corner
                .parse()
                .map_err(|_| LedgerError::Corrupt(format!("bet corner {corner:?}")))?,
            odds: row.try_get("odds")?,
            potential_win: row.try_get("potential_win")?,
            status: status
                .parse()
                .map_err(|_| LedgerError::Corrupt(format!("bet status {status:?}")))?,
            actual_win: row.try_get("actual_win")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            settled_at: row.try_get("settled_at")?,
        })
    }

    pub(crate) fn stake(&self) -> LedgerResult<Money> {
        Money::new(self.amount)
            .map_err(|_| LedgerError::Corrupt(format!("bet {} has amount {}", self.id, self.amount)))
    }
}

/// What settling one bet against a winner produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetOutcome {
    pub status: BetStatus,
    /// Gross payout credited to the bettor
    pub actual_win: i64,
    /// Commission recorded on the payout
    pub commission: i64,
}

/// Settle a bet against `winner` using its captured odds
///
/// A winning bet pays `floor(amount * odds)` in full; commission is
/// `floor(actual_win * rate)` and is recorded separately, never deducted.
pub fn settle_outcome(
    amount: Money,
    odds: Decimal,
    chosen: Corner,
    winner: Corner,
    commission_rate: Decimal,
) -> LedgerResult<BetOutcome> {
    if chosen != winner {
        return Ok(BetOutcome {
            status: BetStatus::Lost,
            actual_win: 0,
            commission: 0,
        });
    }

    let actual_win = payout(amount, odds)?;
    Ok(BetOutcome {
        status: BetStatus::Won,
        actual_win,
        commission: commission(actual_win, commission_rate)?,
    })
}

/// A bet that could not be settled or refunded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetFailure {
    pub bet_id: i64,
    pub error: String,
}

/// Outcome of settling (or refunding) every open bet on a fight
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub fight_id: i64,
    /// `None` when the fight was cancelled and bets were refunded
    pub winner: Option<Corner>,
    /// Whether this call recorded the fight result
    pub result_recorded: bool,
    pub won: Vec<i64>,
    pub lost: Vec<i64>,
    pub refunded: Vec<i64>,
    pub failures: Vec<BetFailure>,
    pub total_paid: i64,
    pub total_commission: i64,
    pub total_refunded: i64,
}

impl SettlementReport {
    pub fn new(fight_id: i64, winner: Option<Corner>) -> Self {
        Self {
            fight_id,
            winner,
            ..Self::default()
        }
    }

    pub fn processed(&self) -> usize {
        self.won.len() + self.lost.len() + self.refunded.len()
    }

    /// True when no bet was left behind
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(&mut self, bet: &Bet, outcome: Option<BetOutcome>) {
        match bet.status {
            BetStatus::Won => {
                self.won.push(bet.id);
                self.total_paid += bet.actual_win;
                self.total_commission += outcome.map_or(0, |o| o.commission);
            }
            BetStatus::Lost => self.lost.push(bet.id),
            BetStatus::Cancelled => {
                self.refunded.push(bet.id);
                self.total_refunded += bet.amount;
            }
            _ => {}
        }
    }

    pub(crate) fn fail(&mut self, bet_id: i64, error: &LedgerError) {
        self.failures.push(BetFailure {
            bet_id,
            error: error.client_message(),
        });
    }
}

/// Settlement progress of one fight, for operators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementStatus {
    pub fight_id: i64,
    pub result: Option<FightResult>,
    /// Bet counts keyed by status
    pub counts: BTreeMap<BetStatus, i64>,
    /// Bets still PENDING, ACCEPTED or POSTPONED
    pub unsettled_bet_ids: Vec<i64>,
    /// A result or cancellation exists and no open bet remains
    pub fully_settled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_winning_bet_pays_full_gross() {
        let outcome = settle_outcome(
            Money::new(1_000).unwrap(),
            dec("2.5"),
            Corner::A,
            Corner::A,
            dec("0.10"),
        )
        .unwrap();
        assert_eq!(
            outcome,
            BetOutcome {
                status: BetStatus::Won,
                actual_win: 2_500,
                commission: 250,
            }
        );
    }

    #[test]
    fn test_losing_bet_pays_nothing() {
        let outcome = settle_outcome(
            Money::new(1_000).unwrap(),
            dec("2.5"),
            Corner::A,
            Corner::B,
            dec("0.10"),
        )
        .unwrap();
        assert_eq!(outcome.status, BetStatus::Lost);
        assert_eq!(outcome.actual_win, 0);
        assert_eq!(outcome.commission, 0);
    }

    #[test]
    fn test_fractional_payout_rounds_down() {
        let outcome = settle_outcome(
            Money::new(777).unwrap(),
            dec("1.333"),
            Corner::B,
            Corner::B,
            dec("0.10"),
        )
        .unwrap();
        // 777 * 1.333 = 1035.741
        assert_eq!(outcome.actual_win, 1_035);
        assert_eq!(outcome.commission, 103);
    }

    #[test]
    fn test_state_machine() {
        use BetStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Accepted.can_transition_to(Won));
        assert!(Accepted.can_transition_to(Postponed));
        assert!(Postponed.can_transition_to(Accepted));
        assert!(Postponed.can_transition_to(Lost));

        for terminal in [Won, Lost, Cancelled] {
            assert!(terminal.is_terminal());
            for next in BetStatus::ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
        assert!(!Accepted.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Postponed));
    }

    #[test]
    fn test_open_statuses_are_not_terminal() {
        for status in BetStatus::OPEN {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("won".parse::<BetStatus>().unwrap(), BetStatus::Won);
        assert!("VOID".parse::<BetStatus>().is_err());
    }

    #[test]
    fn test_report_totals() {
        let now = Utc::now();
        let mut bet = Bet {
            id: 1,
            creator_id: 1,
            fight_id: 1,
            amount: 1_000,
            chosen_fighter: Corner::A,
            odds: dec("2.5"),
            potential_win: 2_500,
            status: BetStatus::Won,
            actual_win: 2_500,
            created_at: now,
            updated_at: now,
            settled_at: Some(now),
        };
        let mut report = SettlementReport::new(1, Some(Corner::A));
        report.record(
            &bet,
            Some(BetOutcome {
                status: BetStatus::Won,
                actual_win: 2_500,
                commission: 250,
            }),
        );

        bet.id = 2;
        bet.status = BetStatus::Lost;
        bet.actual_win = 0;
        report.record(&bet, None);
        report.fail(3, &LedgerError::invalid_state("bet is already WON"));

        assert_eq!(report.won, vec![1]);
        assert_eq!(report.lost, vec![2]);
        assert_eq!(report.total_paid, 2_500);
        assert_eq!(report.total_commission, 250);
        assert_eq!(report.processed(), 2);
        assert!(!report.is_complete());
    }
}

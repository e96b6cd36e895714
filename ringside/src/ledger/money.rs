//! Money, odds and commission arithmetic.
//!
//! Amounts are integer minor units. Odds are decimals captured when a bet is
//! placed; multiplying them out always goes through `rust_decimal` and rounds
//! down, so a payout never exceeds `amount * odds`.

use super::errors::{LedgerError, LedgerResult};
use crate::validation::ValidationErrors;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A strictly positive amount in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Build an amount, rejecting zero and negatives
    pub fn new(minor_units: i64) -> LedgerResult<Self> {
        if minor_units <= 0 {
            return Err(LedgerError::invalid("amount", "must be a positive integer"));
        }
        Ok(Self(minor_units))
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl TryFrom<i64> for Money {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which fighter a bet backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    A,
    B,
}

impl Corner {
    pub fn as_str(self) -> &'static str {
        match self {
            Corner::A => "A",
            Corner::B => "B",
        }
    }

    pub fn opposite(self) -> Corner {
        match self {
            Corner::A => Corner::B,
            Corner::B => Corner::A,
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Corner {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Corner::A),
            "B" | "b" => Ok(Corner::B),
            other => Err(LedgerError::invalid(
                "chosen_fighter",
                format!("must be A or B, got {other:?}"),
            )),
        }
    }
}

/// Gross payout of a winning stake: `floor(amount * odds)`
///
/// # Example
///
/// ```
/// use ringside::ledger::{Money, payout};
/// use rust_decimal::Decimal;
///
/// let win = payout(Money::new(1_000).unwrap(), Decimal::new(25, 1)).unwrap();
/// assert_eq!(win, 2_500);
/// ```
pub fn payout(amount: Money, odds: Decimal) -> LedgerResult<i64> {
    Decimal::from(amount.minor_units())
        .checked_mul(odds)
        .map(|gross| gross.floor())
        .and_then(|gross| gross.to_i64())
        .ok_or_else(|| LedgerError::invalid("amount", "payout exceeds the representable range"))
}

/// Platform commission on a gross win: `floor(gross_win * rate)`
pub fn commission(gross_win: i64, rate: Decimal) -> LedgerResult<i64> {
    if gross_win <= 0 || rate <= Decimal::ZERO {
        return Ok(0);
    }
    Decimal::from(gross_win)
        .checked_mul(rate)
        .map(|c| c.floor())
        .and_then(|c| c.to_i64())
        .ok_or_else(|| LedgerError::invalid("commission", "exceeds the representable range"))
}

/// Odds must be strictly above 1 (a winning bet returns more than the stake),
/// at most 1000, with no more than 4 decimal places.
pub fn validate_odds(field: &str, odds: Decimal) -> Result<(), ValidationErrors> {
    if odds <= Decimal::ONE {
        return Err(ValidationErrors::single(field, "must be greater than 1"));
    }
    if odds > Decimal::from(1_000) {
        return Err(ValidationErrors::single(field, "must be at most 1000"));
    }
    if odds.normalize().scale() > 4 {
        return Err(ValidationErrors::single(field, "must have at most 4 decimal places"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn odds(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_money_rejects_non_positive() {
        assert!(Money::new(0).is_err());
        assert!(Money::new(-1).is_err());
        assert_eq!(Money::new(1).unwrap().minor_units(), 1);
    }

    #[test]
    fn test_money_checked_add_overflow() {
        let max = Money::new(i64::MAX).unwrap();
        assert!(max.checked_add(Money::new(1).unwrap()).is_none());
    }

    #[test]
    fn test_payout_exact() {
        let amount = Money::new(1_000).unwrap();
        assert_eq!(payout(amount, odds("2.5")).unwrap(), 2_500);
    }

    #[test]
    fn test_payout_rounds_down() {
        let amount = Money::new(333).unwrap();
        // 333 * 1.85 = 616.05
        assert_eq!(payout(amount, odds("1.85")).unwrap(), 616);
        // 101 * 1.999 = 201.899
        assert_eq!(payout(Money::new(101).unwrap(), odds("1.999")).unwrap(), 201);
    }

    #[test]
    fn test_payout_overflow_is_rejected() {
        let amount = Money::new(i64::MAX).unwrap();
        assert!(payout(amount, odds("2")).is_err());
    }

    #[test]
    fn test_commission_ten_percent() {
        let rate = odds("0.10");
        assert_eq!(commission(2_500, rate).unwrap(), 250);
        assert_eq!(commission(2_509, rate).unwrap(), 250);
        assert_eq!(commission(9, rate).unwrap(), 0);
        assert_eq!(commission(0, rate).unwrap(), 0);
    }

    #[test]
    fn test_corner_parse() {
        assert_eq!("A".parse::<Corner>().unwrap(), Corner::A);
        assert_eq!("b".parse::<Corner>().unwrap(), Corner::B);
        assert!("C".parse::<Corner>().is_err());
        assert_eq!(Corner::A.opposite(), Corner::B);
    }

    #[test]
    fn test_validate_odds() {
        assert!(validate_odds("odds_a", odds("1.01")).is_ok());
        assert!(validate_odds("odds_a", odds("1")).is_err());
        assert!(validate_odds("odds_a", odds("0.5")).is_err());
        assert!(validate_odds("odds_a", odds("1001")).is_err());
        assert!(validate_odds("odds_a", odds("1.23456")).is_err());
        assert!(validate_odds("odds_a", odds("1.2300000")).is_ok());
    }

    proptest! {
        #[test]
        fn prop_payout_bounded_by_exact_product(amount in 1i64..10_000_000, bps in 10_001i64..1_000_000) {
            let o = Decimal::new(bps, 4);
            let win = payout(Money::new(amount).unwrap(), o).unwrap();
            let exact = Decimal::from(amount) * o;
            prop_assert!(Decimal::from(win) <= exact);
            prop_assert!(exact - Decimal::from(win) < Decimal::ONE);
            prop_assert!(win >= amount);
        }

        #[test]
        fn prop_commission_never_exceeds_win(win in 0i64..1_000_000_000) {
            let c = commission(win, COMMISSION_FOR_TEST).unwrap();
            prop_assert!(c >= 0);
            prop_assert!(c <= win / 10);
        }
    }

    const COMMISSION_FOR_TEST: Decimal = crate::ledger::COMMISSION_RATE;
}

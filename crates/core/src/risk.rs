//! Loan-to-value math over position snapshots.
//!
//! All functions are pure. A metric that cannot be computed (zero
//! denominator, overflow, out-of-range target) is `None`, never a panic.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::Position;

/// Current LTV as a percentage rounded to 2 decimals.
///
/// `None` when either the borrow value or the borrow limit is zero.
pub fn current_ltv(position: &Position) -> Option<Decimal> {
    if position.borrow_value.is_zero() || position.borrow_limit.is_zero() {
        return None;
    }
    let ltv = position
        .borrow_value
        .checked_mul(Decimal::ONE_HUNDRED)?
        .checked_div(position.borrow_limit)?;
    Some(ltv.round_dp(2))
}

/// uusd to repay to bring the position down to `target_ltv`.
///
/// Negative results mean the position is already below target.
pub fn amount_to_repay(position: &Position, target_ltv: Decimal) -> Option<i128> {
    let target_value = target_borrow_value(position, target_ltv)?;
    position
        .borrow_value
        .checked_sub(target_value)?
        .trunc()
        .to_i128()
}

/// uusd that can be borrowed to bring the position up to `target_ltv`.
///
/// Negative results mean the position is already above target.
pub fn amount_to_borrow(position: &Position, target_ltv: Decimal) -> Option<i128> {
    let target_value = target_borrow_value(position, target_ltv)?;
    target_value
        .checked_sub(position.borrow_value)?
        .trunc()
        .to_i128()
}

/// Borrow value at which the position sits exactly at `target_ltv`.
fn target_borrow_value(position: &Position, target_ltv: Decimal) -> Option<Decimal> {
    if target_ltv.is_sign_negative() || target_ltv > Decimal::ONE_HUNDRED {
        return None;
    }
    position
        .borrow_limit
        .checked_mul(target_ltv)?
        .checked_div(Decimal::ONE_HUNDRED)
}

/// Direction of a loan adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentKind {
    Repay,
    Borrow,
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repay => write!(f, "repay"),
            Self::Borrow => write!(f, "borrow"),
        }
    }
}

/// Loan adjustment in uusd (smallest denomination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountAdjustment {
    pub kind: AdjustmentKind,
    pub amount: i128,
}

impl AmountAdjustment {
    /// Only strictly positive amounts call for a transaction.
    pub fn is_actionable(&self) -> bool {
        self.amount > 0
    }
}

/// LTV snapshot of a position against a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub wallet_address: String,
    pub block_height: u64,
    pub current_ltv: Option<Decimal>,
    pub target_ltv: Decimal,
    pub repay: Option<AmountAdjustment>,
    pub borrow: Option<AmountAdjustment>,
}

impl RiskAssessment {
    /// The single adjustment that moves the position toward target, if any.
    pub fn adjustment(&self) -> Option<AmountAdjustment> {
        self.repay
            .filter(AmountAdjustment::is_actionable)
            .or_else(|| self.borrow.filter(AmountAdjustment::is_actionable))
    }

    /// Whether the LTV is strictly above `threshold`.
    pub fn is_above(&self, threshold: Decimal) -> bool {
        self.current_ltv.map_or(false, |ltv| ltv > threshold)
    }

    /// Whether the LTV is strictly below `threshold`. A position without
    /// debt counts as 0%.
    pub fn is_below(&self, threshold: Decimal) -> bool {
        self.current_ltv.unwrap_or(Decimal::ZERO) < threshold
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current_ltv {
            Some(ltv) => write!(f, "LTV {}% (target {}%)", ltv, self.target_ltv),
            None => write!(f, "LTV metric unavailable (target {}%)", self.target_ltv),
        }
    }
}

/// Assess `position` against `target_ltv`.
pub fn assess(position: &Position, target_ltv: Decimal) -> RiskAssessment {
    RiskAssessment {
        wallet_address: position.wallet_address.clone(),
        block_height: position.block_height,
        current_ltv: current_ltv(position),
        target_ltv,
        repay: amount_to_repay(position, target_ltv).map(|amount| AmountAdjustment {
            kind: AdjustmentKind::Repay,
            amount,
        }),
        borrow: amount_to_borrow(position, target_ltv).map(|amount| AmountAdjustment {
            kind: AdjustmentKind::Borrow,
            amount,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(borrow_value: Decimal, borrow_limit: Decimal) -> Position {
        Position {
            wallet_address: "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v".to_string(),
            borrow_value,
            borrow_limit,
            collateral_balance: Decimal::ZERO,
            pending_rewards: Decimal::ZERO,
            block_height: 1,
        }
    }

    #[test]
    fn test_current_ltv_half() {
        let p = position(Decimal::from(1000), Decimal::from(2000));
        assert_eq!(current_ltv(&p), Some(Decimal::new(5000, 2)));
    }

    #[test]
    fn test_current_ltv_rounds_to_two_places() {
        let p = position(Decimal::from(1), Decimal::from(3));
        assert_eq!(current_ltv(&p), Some(Decimal::new(3333, 2)));

        let p = position(Decimal::from(2), Decimal::from(3));
        assert_eq!(current_ltv(&p), Some(Decimal::new(6667, 2)));
    }

    #[test]
    fn test_current_ltv_zero_denominator() {
        assert_eq!(current_ltv(&position(Decimal::from(1000), Decimal::ZERO)), None);
        assert_eq!(current_ltv(&position(Decimal::ZERO, Decimal::from(2000))), None);
    }

    #[test]
    fn test_amount_to_repay_example() {
        let p = position(Decimal::from(1000), Decimal::from(2000));
        assert_eq!(amount_to_repay(&p, Decimal::from(40)), Some(200));
        assert_eq!(amount_to_borrow(&p, Decimal::from(40)), Some(-200));
    }

    #[test]
    fn test_repay_and_borrow_are_inverse() {
        let cases = [
            (Decimal::from(1000), Decimal::from(2000), Decimal::from(40)),
            (Decimal::new(123_456_789, 3), Decimal::new(987_654_321, 2), Decimal::new(455, 1)),
            (Decimal::new(1, 1), Decimal::from(7), Decimal::from(33)),
            (Decimal::ZERO, Decimal::from(5_000_000), Decimal::from(60)),
        ];
        for (value, limit, target) in cases {
            let p = position(value, limit);
            let repay = amount_to_repay(&p, target).unwrap();
            let borrow = amount_to_borrow(&p, target).unwrap();
            assert_eq!(repay + borrow, 0, "value={} limit={} target={}", value, limit, target);
        }
    }

    #[test]
    fn test_out_of_range_target_unavailable() {
        let p = position(Decimal::from(1000), Decimal::from(2000));
        assert_eq!(amount_to_repay(&p, Decimal::from(-1)), None);
        assert_eq!(amount_to_borrow(&p, Decimal::from(101)), None);
    }

    #[test]
    fn test_overflow_is_unavailable() {
        let p = position(Decimal::MAX, Decimal::MAX);
        assert_eq!(current_ltv(&p), None);
        assert_eq!(amount_to_repay(&p, Decimal::from(50)), None);
    }

    #[test]
    fn test_assess_picks_direction() {
        let over = assess(&position(Decimal::from(1000), Decimal::from(2000)), Decimal::from(40));
        assert_eq!(
            over.adjustment(),
            Some(AmountAdjustment { kind: AdjustmentKind::Repay, amount: 200 })
        );
        assert!(over.is_above(Decimal::from(45)));

        let under = assess(&position(Decimal::from(500), Decimal::from(2000)), Decimal::from(40));
        assert_eq!(
            under.adjustment(),
            Some(AmountAdjustment { kind: AdjustmentKind::Borrow, amount: 300 })
        );

        let on_target = assess(&position(Decimal::from(800), Decimal::from(2000)), Decimal::from(40));
        assert_eq!(on_target.adjustment(), None);
    }

    #[test]
    fn test_unavailable_ltv_display() {
        let a = assess(&position(Decimal::ZERO, Decimal::ZERO), Decimal::from(40));
        assert_eq!(a.current_ltv, None);
        assert!(a.is_below(Decimal::from(10)));
        assert!(!a.is_above(Decimal::ZERO));
        assert_eq!(a.to_string(), "LTV metric unavailable (target 40%)");
    }
}

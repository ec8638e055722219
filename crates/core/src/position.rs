//! Position snapshots for Anchor borrowers and depositors.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Borrow-side snapshot of a wallet, read at a single block height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Borrower address
    pub wallet_address: String,
    /// Outstanding loan (uusd)
    pub borrow_value: Decimal,
    /// Maximum borrowable against posted collateral (uusd)
    pub borrow_limit: Decimal,
    /// Collateral locked in custody (smallest collateral unit)
    pub collateral_balance: Decimal,
    /// Unclaimed ANC rewards
    pub pending_rewards: Decimal,
    /// Height the height-sensitive fields were read at
    pub block_height: u64,
}

impl Position {
    /// Whether the wallet has an outstanding loan.
    pub fn has_debt(&self) -> bool {
        self.borrow_value > Decimal::ZERO
    }

    /// Whether a newer height than this snapshot's has been observed.
    #[inline]
    pub fn is_stale(&self, latest_height: u64) -> bool {
        latest_height > self.block_height
    }
}

/// Earn-side (deposit) snapshot of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnPosition {
    /// Depositor address
    pub wallet_address: String,
    /// aTerra held
    pub aterra_balance: Decimal,
    /// uusd per aTerra
    pub exchange_rate: Decimal,
}

impl EarnPosition {
    /// Deposit value in uusd (`aterra_balance × exchange_rate`).
    ///
    /// `None` if the product overflows.
    pub fn deposit_value(&self) -> Option<Decimal> {
        self.aterra_balance.checked_mul(self.exchange_rate)
    }

    /// aTerra needed to redeem `uusd` at the current exchange rate,
    /// rounded up so the redemption covers the full amount.
    pub fn aterra_for(&self, uusd: Decimal) -> Option<Decimal> {
        if self.exchange_rate <= Decimal::ZERO {
            return None;
        }
        uusd.checked_div(self.exchange_rate).map(|a| a.ceil())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earn(balance: i64, rate: Decimal) -> EarnPosition {
        EarnPosition {
            wallet_address: "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v".to_string(),
            aterra_balance: Decimal::from(balance),
            exchange_rate: rate,
        }
    }

    #[test]
    fn test_staleness() {
        let position = Position {
            wallet_address: "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v".to_string(),
            borrow_value: Decimal::from(1000),
            borrow_limit: Decimal::from(2000),
            collateral_balance: Decimal::from(10),
            pending_rewards: Decimal::ZERO,
            block_height: 100,
        };
        assert!(position.has_debt());
        assert!(!position.is_stale(100));
        assert!(!position.is_stale(99));
        assert!(position.is_stale(101));
    }

    #[test]
    fn test_deposit_value() {
        let position = earn(1_000_000, Decimal::new(12, 1));
        assert_eq!(position.deposit_value(), Some(Decimal::from(1_200_000)));
    }

    #[test]
    fn test_aterra_for_rounds_up() {
        let position = earn(1_000_000, Decimal::new(12, 1));
        // 100 / 1.2 = 83.33.. -> 84 aTerra
        assert_eq!(position.aterra_for(Decimal::from(100)), Some(Decimal::from(84)));
        assert_eq!(earn(1, Decimal::ZERO).aterra_for(Decimal::ONE), None);
    }
}

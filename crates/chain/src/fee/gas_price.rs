//! Gas-price based fee estimation.
//!
//! Gas is budgeted per message (Anchor money-market calls have a stable
//! footprint) and priced with a configured gas price, which an external
//! override may replace up to a hard cap.

use super::{Fee, FeeEstimator, GasPrice};
use crate::error::RemoteError;
use crate::msgs::{Coin, ExecuteMsg};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Fixed overhead of any transaction (signature verification, tx size).
const DEFAULT_BASE_GAS: u64 = 100_000;

/// Budget for a single money-market execute message.
const DEFAULT_GAS_PER_MSG: u64 = 450_000;

/// Fee estimator that multiplies a gas budget by a gas price.
#[derive(Debug, Clone)]
pub struct GasPriceFeeEstimator {
    /// Default gas price.
    default_gas_price: GasPrice,
    /// Maximum accepted gas price (same denom as the default).
    max_gas_price: Decimal,
    /// Gas added once per transaction.
    base_gas: u64,
    /// Gas added per message.
    gas_per_msg: u64,
    /// Safety multiplier on the gas budget (e.g. 1.4).
    gas_adjustment: Decimal,
}

impl GasPriceFeeEstimator {
    /// Create a new estimator.
    ///
    /// # Arguments
    /// * `default_gas_price` - Price used when no override is supplied
    /// * `max_gas_price` - Cap applied to overrides
    pub fn new(default_gas_price: GasPrice, max_gas_price: Decimal) -> Self {
        Self {
            default_gas_price,
            max_gas_price,
            base_gas: DEFAULT_BASE_GAS,
            gas_per_msg: DEFAULT_GAS_PER_MSG,
            gas_adjustment: Decimal::new(14, 1),
        }
    }

    /// Set the per-transaction and per-message gas budget.
    pub fn with_gas_budget(mut self, base_gas: u64, gas_per_msg: u64) -> Self {
        self.base_gas = base_gas;
        self.gas_per_msg = gas_per_msg;
        self
    }

    /// Set the gas adjustment multiplier.
    pub fn with_gas_adjustment(mut self, gas_adjustment: Decimal) -> Self {
        self.gas_adjustment = gas_adjustment;
        self
    }

    /// Gas limit for `msg_count` messages, adjustment applied and rounded up.
    pub fn gas_limit(&self, msg_count: usize) -> Result<u64, RemoteError> {
        let raw = self
            .gas_per_msg
            .checked_mul(msg_count as u64)
            .and_then(|g| g.checked_add(self.base_gas))
            .ok_or_else(|| RemoteError::unknown("gas budget overflow"))?;

        (Decimal::from(raw) * self.gas_adjustment)
            .ceil()
            .to_u64()
            .ok_or_else(|| RemoteError::unknown("gas limit out of range"))
    }

    /// Resolve the gas price to use, capping overrides at the maximum.
    fn effective_price(&self, gas_price_override: Option<&GasPrice>) -> GasPrice {
        match gas_price_override {
            Some(price) if price.denom != self.default_gas_price.denom => {
                warn!(
                    denom = %price.denom,
                    expected = %self.default_gas_price.denom,
                    "Gas price override in unexpected denom, using default"
                );
                self.default_gas_price.clone()
            }
            Some(price) if price.amount > self.max_gas_price => {
                warn!(
                    requested = %price.amount,
                    max = %self.max_gas_price,
                    "Gas price override above cap, capping"
                );
                GasPrice::new(price.denom.clone(), self.max_gas_price)
            }
            Some(price) => price.clone(),
            None => self.default_gas_price.clone(),
        }
    }
}

#[async_trait]
impl FeeEstimator for GasPriceFeeEstimator {
    async fn estimate(
        &self,
        sender: &str,
        msgs: &[ExecuteMsg],
        gas_price_override: Option<&GasPrice>,
    ) -> Result<Fee, RemoteError> {
        if msgs.is_empty() {
            return Err(RemoteError::unknown("cannot estimate fee for empty message list"));
        }

        let gas_limit = self.gas_limit(msgs.len())?;
        let price = self.effective_price(gas_price_override);
        let amount = (Decimal::from(gas_limit) * price.amount)
            .ceil()
            .to_u128()
            .ok_or_else(|| RemoteError::unknown("fee amount out of range"))?;

        debug!(
            sender = sender,
            msg_count = msgs.len(),
            gas_limit = gas_limit,
            gas_price = %price.amount,
            fee = amount,
            "Fee estimated"
        );

        Ok(Fee {
            gas_limit,
            amount: vec![Coin::new(price.denom, amount)],
        })
    }

    fn estimator_name(&self) -> &'static str {
        "GasPrice"
    }
}

//! Fee estimation abstraction.
//!
//! The executor asks a [`FeeEstimator`] for a fee exactly once per submission
//! and signs the final transaction with it.
//!
//! # Example
//!
//! ```rust,ignore
//! use keeper_chain::fee::{FeeEstimator, GasPrice, GasPriceFeeEstimator};
//!
//! let estimator = GasPriceFeeEstimator::new(GasPrice::uusd(dec!(0.15)), dec!(0.5));
//! let fee = estimator.estimate(sender, &msgs, None).await?;
//! ```

mod gas_price;

pub use gas_price::GasPriceFeeEstimator;

use crate::error::RemoteError;
use crate::msgs::{Coin, ExecuteMsg, UUSD};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Price of one unit of gas in a given denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrice {
    pub denom: String,
    pub amount: Decimal,
}

impl GasPrice {
    pub fn new(denom: impl Into<String>, amount: Decimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn uusd(amount: Decimal) -> Self {
        Self::new(UUSD, amount)
    }
}

/// Fee attached to a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub gas_limit: u64,
    pub amount: Vec<Coin>,
}

/// Trait for fee estimation strategies.
#[async_trait]
pub trait FeeEstimator: Send + Sync + Debug {
    /// Estimate the fee for `msgs` sent by `sender`.
    ///
    /// `gas_price_override` replaces the estimator's default price when
    /// supplied (subject to the estimator's cap).
    async fn estimate(
        &self,
        sender: &str,
        msgs: &[ExecuteMsg],
        gas_price_override: Option<&GasPrice>,
    ) -> Result<Fee, RemoteError>;

    /// Get the estimator name for logging.
    fn estimator_name(&self) -> &'static str;
}

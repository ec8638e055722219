//! Off-chain statistics sources used for rate computation.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Debug;

use crate::anchor::{AnchorApiClient, DistributionStats};
use crate::mantle::MantleClient;

/// Denomination of the money market's stablecoin reserves.
const MARKET_DENOM: &str = "uusd";

/// Source of off-chain market statistics.
#[async_trait]
pub trait StatsProvider: Send + Sync + Debug {
    /// Current ANC distribution APY and total liabilities.
    async fn distribution_stats(&self) -> Result<DistributionStats>;

    /// Stablecoin bank balance held by the market contract.
    async fn market_balance(&self, market_contract: &str) -> Result<Decimal>;
}

/// [`StatsProvider`] backed by the Anchor API and a Mantle endpoint.
#[derive(Debug, Clone)]
pub struct HttpStatsProvider {
    anchor: AnchorApiClient,
    mantle: MantleClient,
}

impl HttpStatsProvider {
    pub fn new(anchor: AnchorApiClient, mantle: MantleClient) -> Self {
        Self { anchor, mantle }
    }
}

#[async_trait]
impl StatsProvider for HttpStatsProvider {
    async fn distribution_stats(&self) -> Result<DistributionStats> {
        self.anchor.fetch_distribution_stats().await
    }

    async fn market_balance(&self, market_contract: &str) -> Result<Decimal> {
        self.mantle.fetch_balance(market_contract, MARKET_DENOM).await
    }
}

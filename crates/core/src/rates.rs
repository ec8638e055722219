//! Earn and borrow APY computation.

use keeper_api::StatsProvider;
use keeper_chain::response::decimal_field;
use keeper_chain::{ChainError, ChainQueryClient, RemoteError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::ContractAddresses;

/// Annualized market rates, in percent rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRates {
    pub earn_apy: Decimal,
    pub borrow_apy: Decimal,
}

/// Computes Anchor's earn and net borrow APY.
#[derive(Debug, Clone)]
pub struct RateService {
    client: Arc<dyn ChainQueryClient>,
    stats: Arc<dyn StatsProvider>,
    contracts: Arc<ContractAddresses>,
    blocks_per_year: Decimal,
}

impl RateService {
    pub fn new(
        client: Arc<dyn ChainQueryClient>,
        stats: Arc<dyn StatsProvider>,
        contracts: Arc<ContractAddresses>,
        blocks_per_year: u64,
    ) -> Self {
        Self {
            client,
            stats,
            contracts,
            blocks_per_year: Decimal::from(blocks_per_year),
        }
    }

    /// Deposit APY: per-block deposit rate annualized.
    #[instrument(skip(self))]
    pub async fn earn_apy(&self) -> Result<Decimal, ChainError> {
        const ACTION: &str = "get_earn_apy";

        let response = self
            .query(ACTION, &self.contracts.overseer, &json!({ "epoch_state": {} }))
            .await?;
        let deposit_rate = decimal_field(&response, "deposit_rate", ACTION)?;

        let apy = self
            .annualize(deposit_rate)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| ChainError::malformed(ACTION, "deposit rate overflow"))?
            .round_dp(2);

        debug!(deposit_rate = %deposit_rate, earn_apy = %apy, "Computed earn APY");
        Ok(apy)
    }

    /// Net borrow APY: ANC distribution APY minus the annualized borrow rate.
    ///
    /// Positive values mean rewards outweigh interest.
    #[instrument(skip(self))]
    pub async fn borrow_apy(&self) -> Result<Decimal, ChainError> {
        const ACTION: &str = "get_borrow_apy";

        let market_balance = self
            .stats
            .market_balance(&self.contracts.market)
            .await
            .map_err(|e| stats_error("get_market_balance", e))?;

        let stats = self
            .stats
            .distribution_stats()
            .await
            .map_err(|e| stats_error("get_distribution_apy", e))?;

        let state = self
            .query(ACTION, &self.contracts.market, &json!({ "state": {} }))
            .await?;
        let total_reserves = decimal_field(&state, "total_reserves", ACTION)?;

        let query = json!({
            "borrow_rate": {
                "market_balance": market_balance.to_string(),
                "total_liabilities": stats.total_liabilities.to_string(),
                "total_reserves": total_reserves.to_string(),
            }
        });
        let response = self
            .query(ACTION, &self.contracts.interest_model, &query)
            .await?;
        let rate = decimal_field(&response, "rate", ACTION)?;

        let apy = self
            .annualize(rate)
            .and_then(|borrow_rate| stats.distribution_apy.checked_sub(borrow_rate))
            .and_then(|net| net.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| ChainError::malformed(ACTION, "borrow rate overflow"))?
            .round_dp(2);

        debug!(
            market_balance = %market_balance,
            total_liabilities = %stats.total_liabilities,
            total_reserves = %total_reserves,
            borrow_rate = %rate,
            distribution_apy = %stats.distribution_apy,
            borrow_apy = %apy,
            "Computed borrow APY"
        );
        Ok(apy)
    }

    /// Both rates, fetched concurrently.
    pub async fn market_rates(&self) -> Result<MarketRates, ChainError> {
        let (earn_apy, borrow_apy) = tokio::try_join!(self.earn_apy(), self.borrow_apy())?;
        Ok(MarketRates {
            earn_apy,
            borrow_apy,
        })
    }

    fn annualize(&self, per_block: Decimal) -> Option<Decimal> {
        per_block.checked_mul(self.blocks_per_year)
    }

    async fn query(&self, action: &str, contract: &str, query: &Value) -> Result<Value, ChainError> {
        self.client
            .query(contract, query)
            .await
            .map_err(|e| ChainError::query(action, e))
    }
}

/// HTTP lookups carry no remote error code.
fn stats_error(action: &str, err: anyhow::Error) -> ChainError {
    ChainError::query(action, RemoteError::unknown(format!("{:#}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::mainnet_contracts;
    use crate::reader::tests::StubChain;
    use async_trait::async_trait;
    use keeper_api::DistributionStats;

    #[derive(Debug, Default)]
    struct FakeStats {
        fail_stats: bool,
        fail_balance: bool,
    }

    #[async_trait]
    impl StatsProvider for FakeStats {
        async fn distribution_stats(&self) -> anyhow::Result<DistributionStats> {
            if self.fail_stats {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(DistributionStats {
                height: Some(5_000_000),
                distribution_apy: Decimal::new(25, 2),
                total_liabilities: Decimal::from(1_000_000_000u64),
            })
        }

        async fn market_balance(&self, _market: &str) -> anyhow::Result<Decimal> {
            if self.fail_balance {
                anyhow::bail!("Mantle query failed: rate limited");
            }
            Ok(Decimal::from(2_000_000_000u64))
        }
    }

    fn service(chain: Arc<StubChain>, stats: FakeStats) -> RateService {
        RateService::new(
            chain,
            Arc::new(stats),
            Arc::new(mainnet_contracts()),
            4_656_810,
        )
    }

    #[tokio::test]
    async fn test_earn_apy() {
        // 0.000000041 * 4_656_810 * 100 = 19.092921
        let chain = Arc::new(StubChain::new("0", "0"));
        let apy = service(chain, FakeStats::default()).earn_apy().await.unwrap();
        assert_eq!(apy, Decimal::new(1909, 2));
    }

    #[tokio::test]
    async fn test_borrow_apy() {
        // (0.25 - 0.000000035 * 4_656_810) * 100 = 8.701165
        let chain = Arc::new(StubChain::new("0", "0"));
        let apy = service(chain.clone(), FakeStats::default()).borrow_apy().await.unwrap();
        assert_eq!(apy, Decimal::new(870, 2));

        let queries = chain.queries.lock();
        let (contract, query) = queries
            .iter()
            .find(|(_, q)| q.get("borrow_rate").is_some())
            .unwrap();
        assert_eq!(contract, &mainnet_contracts().interest_model);
        assert_eq!(query["borrow_rate"]["market_balance"], json!("2000000000"));
        assert_eq!(query["borrow_rate"]["total_liabilities"], json!("1000000000"));
        assert_eq!(query["borrow_rate"]["total_reserves"], json!("5000000.5"));
    }

    #[tokio::test]
    async fn test_stats_failure_names_step() {
        let chain = Arc::new(StubChain::new("0", "0"));
        let stats = FakeStats {
            fail_stats: true,
            ..Default::default()
        };
        let err = service(chain, stats).borrow_apy().await.unwrap_err();
        assert_eq!(err.action(), Some("get_distribution_apy"));
        assert!(err.to_string().contains("-1 : 503 Service Unavailable"));
    }

    #[tokio::test]
    async fn test_market_balance_failure_aborts_first() {
        let chain = Arc::new(StubChain::new("0", "0"));
        let stats = FakeStats {
            fail_balance: true,
            ..Default::default()
        };
        let err = service(chain.clone(), stats).borrow_apy().await.unwrap_err();
        assert_eq!(err.action(), Some("get_market_balance"));
        assert!(err.to_string().contains("rate limited"));
        assert!(chain.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_market_state_failure_aborts() {
        let chain = Arc::new(StubChain::new("0", "0").failing_on("state"));
        let err = service(chain.clone(), FakeStats::default())
            .borrow_apy()
            .await
            .unwrap_err();
        assert_eq!(err.action(), Some("get_borrow_apy"));
        assert!(chain
            .queries
            .lock()
            .iter()
            .all(|(_, q)| q.get("borrow_rate").is_none()));
    }

    #[tokio::test]
    async fn test_interest_model_failure_aborts() {
        let chain = Arc::new(StubChain::new("0", "0").failing_on("borrow_rate"));
        let err = service(chain, FakeStats::default())
            .borrow_apy()
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::Query {
                action: "get_borrow_apy".to_string(),
                code: 3,
                message: "contract query failed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_market_rates() {
        let chain = Arc::new(StubChain::new("0", "0"));
        let rates = service(chain, FakeStats::default()).market_rates().await.unwrap();
        assert_eq!(rates.earn_apy, Decimal::new(1909, 2));
        assert_eq!(rates.borrow_apy, Decimal::new(870, 2));
    }
}

//! On-chain position reads against the Anchor contracts.

use keeper_chain::response::decimal_field;
use keeper_chain::{ChainError, ChainQueryClient, UUSD};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::ContractAddresses;
use crate::position::{EarnPosition, Position};

/// Reads borrower and depositor state from the Anchor contracts.
#[derive(Debug, Clone)]
pub struct PositionReader {
    client: Arc<dyn ChainQueryClient>,
    contracts: Arc<ContractAddresses>,
}

impl PositionReader {
    pub fn new(client: Arc<dyn ChainQueryClient>, contracts: Arc<ContractAddresses>) -> Self {
        Self { client, contracts }
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    /// Latest block height.
    pub async fn block_height(&self) -> Result<u64, ChainError> {
        self.client
            .block_height()
            .await
            .map_err(|e| ChainError::query("get_block_height", e))
    }

    /// Read a borrower snapshot.
    ///
    /// The height is fetched once and used for both the loan and the
    /// borrow-limit query, so the two are coherent. The snapshot is not
    /// re-read if the chain advances while the queries are in flight.
    #[instrument(skip(self))]
    pub async fn read_position(&self, wallet: &str) -> Result<Position, ChainError> {
        let height = self.block_height().await?;

        let ((borrow_value, pending_rewards), borrow_limit, collateral_balance) = tokio::try_join!(
            self.borrower_info(wallet, height),
            self.borrow_limit(wallet, height),
            self.collateral_balance(wallet),
        )?;

        debug!(
            wallet = wallet,
            height = height,
            borrow_value = %borrow_value,
            borrow_limit = %borrow_limit,
            "Read position"
        );

        Ok(Position {
            wallet_address: wallet.to_string(),
            borrow_value,
            borrow_limit,
            collateral_balance,
            pending_rewards,
            block_height: height,
        })
    }

    /// Read a depositor's aTerra balance and the current exchange rate.
    #[instrument(skip(self))]
    pub async fn read_earn_position(&self, wallet: &str) -> Result<EarnPosition, ChainError> {
        let (aterra_balance, exchange_rate) =
            tokio::try_join!(self.earn_balance(wallet), self.exchange_rate())?;

        Ok(EarnPosition {
            wallet_address: wallet.to_string(),
            aterra_balance,
            exchange_rate,
        })
    }

    /// Oracle price of the collateral token in uusd.
    pub async fn collateral_price(&self) -> Result<Decimal, ChainError> {
        let query = json!({
            "price": {
                "base": self.contracts.collateral_token,
                "quote": UUSD,
            }
        });
        let response = self
            .query("get_collateral_price", &self.contracts.oracle, &query)
            .await?;
        decimal_field(&response, "rate", "get_collateral_price")
    }

    /// uusd per aTerra from the market's epoch state.
    pub async fn exchange_rate(&self) -> Result<Decimal, ChainError> {
        let query = json!({ "epoch_state": {} });
        let response = self
            .query("get_exchange_rate", &self.contracts.market, &query)
            .await?;
        decimal_field(&response, "exchange_rate", "get_exchange_rate")
    }

    async fn earn_balance(&self, wallet: &str) -> Result<Decimal, ChainError> {
        let query = json!({ "balance": { "address": wallet } });
        let response = self
            .query("get_balance_on_earn", &self.contracts.aterra, &query)
            .await?;
        decimal_field(&response, "balance", "get_balance_on_earn")
    }

    async fn borrower_info(&self, wallet: &str, height: u64) -> Result<(Decimal, Decimal), ChainError> {
        const ACTION: &str = "get_borrow_value";
        let query = json!({
            "borrower_info": {
                "borrower": wallet,
                "block_height": height,
            }
        });
        let response = self.query(ACTION, &self.contracts.market, &query).await?;
        Ok((
            decimal_field(&response, "loan_amount", ACTION)?,
            decimal_field(&response, "pending_rewards", ACTION)?,
        ))
    }

    async fn borrow_limit(&self, wallet: &str, height: u64) -> Result<Decimal, ChainError> {
        let query = json!({
            "borrow_limit": {
                "borrower": wallet,
                "block_time": height,
            }
        });
        let response = self
            .query("get_borrow_limit", &self.contracts.overseer, &query)
            .await?;
        decimal_field(&response, "borrow_limit", "get_borrow_limit")
    }

    async fn collateral_balance(&self, wallet: &str) -> Result<Decimal, ChainError> {
        let query = json!({ "borrower": { "address": wallet } });
        let response = self
            .query("get_collateral_balance", &self.contracts.custody, &query)
            .await?;
        decimal_field(&response, "balance", "get_collateral_balance")
    }

    async fn query(&self, action: &str, contract: &str, query: &Value) -> Result<Value, ChainError> {
        self.client
            .query(contract, query)
            .await
            .map_err(|e| ChainError::query(action, e))
    }
}

//! Mantle (GraphQL indexer) client for bank balances of contracts.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use keeper_chain::response::parse_decimal_str;

/// Mantle indexing endpoint client.
#[derive(Debug, Clone)]
pub struct MantleClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<BalancesData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BalancesData {
    #[serde(rename = "marketBalances")]
    market_balances: BankBalances,
}

#[derive(Debug, Deserialize)]
struct BankBalances {
    #[serde(rename = "Result")]
    result: Vec<BankBalance>,
}

#[derive(Debug, Deserialize)]
struct BankBalance {
    #[serde(rename = "Denom")]
    denom: String,
    #[serde(rename = "Amount")]
    amount: String,
}

impl MantleClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Mantle HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the `denom` bank balance held by `address`.
    #[instrument(skip(self))]
    pub async fn fetch_balance(&self, address: &str, denom: &str) -> Result<Decimal> {
        let response: GraphQlResponse = self
            .client
            .post(&self.endpoint)
            .form(&[("query", balances_query(address))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Failed to decode Mantle response")?;

        let balance = extract_balance(response, denom)?;
        debug!(address = address, denom = denom, balance = %balance, "Fetched bank balance");
        Ok(balance)
    }
}

fn balances_query(address: &str) -> String {
    format!(
        "{{\n  marketBalances: BankBalancesAddress(Address: \"{}\") {{\n    Result {{\n      Denom\n      Amount\n    }}\n  }}\n}}\n",
        address
    )
}

fn extract_balance(response: GraphQlResponse, denom: &str) -> Result<Decimal> {
    if let Some(err) = response.errors.first() {
        anyhow::bail!("Mantle query failed: {}", err.message);
    }

    let data = response
        .data
        .ok_or_else(|| anyhow::anyhow!("Mantle response without data"))?;

    let entry = data
        .market_balances
        .result
        .into_iter()
        .find(|b| b.denom == denom)
        .ok_or_else(|| anyhow::anyhow!("No {} balance in Mantle response", denom))?;

    parse_decimal_str(&entry.amount)
        .ok_or_else(|| anyhow::anyhow!("Invalid balance amount '{}'", entry.amount))
}

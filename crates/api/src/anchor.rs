//! Anchor statistics API client.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::de::deserialize_decimal;

/// Public Anchor API.
pub const DEFAULT_ANCHOR_API_URL: &str = "https://api.anchorprotocol.com";

/// ANC distribution figures published by the Anchor API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DistributionStats {
    /// Block height the figures were computed at
    #[serde(default)]
    pub height: Option<u64>,

    /// Annualized ANC distribution APY (decimal, e.g. 0.25 = 25%)
    #[serde(deserialize_with = "deserialize_decimal")]
    pub distribution_apy: Decimal,

    /// Total stablecoin liabilities of the money market (uusd)
    #[serde(deserialize_with = "deserialize_decimal")]
    pub total_liabilities: Decimal,
}

/// Anchor statistics API client.
#[derive(Debug, Clone)]
pub struct AnchorApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnchorApiClient {
    /// Create a client for the public API.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_ANCHOR_API_URL)
    }

    /// Create a client with custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Anchor API HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current distribution APY and total liabilities.
    #[instrument(skip(self))]
    pub async fn fetch_distribution_stats(&self) -> Result<DistributionStats> {
        let url = format!("{}/api/v2/distribution-apy", self.base_url);

        let stats: DistributionStats = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Failed to decode distribution-apy response")?;

        debug!(
            distribution_apy = %stats.distribution_apy,
            total_liabilities = %stats.total_liabilities,
            "Fetched distribution stats"
        );
        Ok(stats)
    }
}

//! Anchor contract address table.

use anyhow::{bail, Result};
use keeper_chain::{is_valid_address, ChainError, ChainQueryClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

/// Addresses of the Anchor contracts the keeper talks to.
///
/// Field names follow the keys the contracts themselves use in their
/// `config` responses, so [`ContractAddresses::discover`] can adopt them
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// Money market (borrow/repay/deposit)
    #[serde(rename = "market_contract")]
    pub market: String,
    /// Overseer (borrow limits, epoch state)
    #[serde(rename = "overseer_contract")]
    pub overseer: String,
    /// Price oracle
    #[serde(rename = "oracle_contract")]
    pub oracle: String,
    /// Collateral custody (bLuna)
    #[serde(rename = "mmCustody")]
    pub custody: String,
    /// aTerra deposit token
    #[serde(rename = "aterra_contract")]
    pub aterra: String,
    /// Borrow interest model
    pub interest_model: String,
    /// Collateral token (bLuna)
    pub collateral_token: String,
}

impl ContractAddresses {
    /// Named entries, for validation and logging.
    pub fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("market_contract", &self.market),
            ("overseer_contract", &self.overseer),
            ("oracle_contract", &self.oracle),
            ("mmCustody", &self.custody),
            ("aterra_contract", &self.aterra),
            ("interest_model", &self.interest_model),
            ("collateral_token", &self.collateral_token),
        ]
    }

    /// Check every address is a well-formed Terra account.
    pub fn validate(&self) -> Result<()> {
        for (name, address) in self.entries() {
            if !is_valid_address(address) {
                bail!("Invalid {} address: '{}'", name, address);
            }
        }
        Ok(())
    }

    /// Query `source`'s `{"config":{}}` and return a copy of this table
    /// with every known field replaced by the Terra address the contract
    /// reports for it. Unknown keys and non-address values are ignored.
    #[instrument(skip(self, client))]
    pub async fn discover(
        &self,
        client: &dyn ChainQueryClient,
        source: &str,
    ) -> Result<Self, ChainError> {
        const ACTION: &str = "get_config";

        let response = client
            .query(source, &json!({ "config": {} }))
            .await
            .map_err(|e| ChainError::query(ACTION, e))?;

        let reported = response
            .as_object()
            .ok_or_else(|| ChainError::malformed(ACTION, "config response is not an object"))?;

        let mut table = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => return Err(ChainError::malformed(ACTION, "address table is not an object")),
        };

        let mut adopted = 0usize;
        for (key, value) in reported {
            let Some(address) = value.as_str() else {
                continue;
            };
            if !address.contains("terra") {
                continue;
            }
            match table.get_mut(key) {
                Some(slot) => {
                    if slot.as_str() != Some(address) {
                        debug!(key = %key, address = address, "Adopting discovered address");
                        adopted += 1;
                    }
                    *slot = Value::String(address.to_string());
                }
                None => debug!(key = %key, "Ignoring unknown config address"),
            }
        }

        let discovered: Self = serde_json::from_value(Value::Object(table))
            .map_err(|e| ChainError::malformed(ACTION, e.to_string()))?;

        info!(source = source, adopted = adopted, "Contract discovery complete");
        Ok(discovered)
    }
}

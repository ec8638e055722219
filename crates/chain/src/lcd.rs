//! LCD (REST) implementation of [`ChainQueryClient`].

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::client::{BroadcastResult, ChainQueryClient, SignedTx};
use crate::error::RemoteError;

/// Default request timeout for LCD calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// LCD client over HTTP.
#[derive(Debug, Clone)]
pub struct LcdClient {
    client: reqwest::Client,
    base_url: String,
}

impl LcdClient {
    /// Create a client with the default timeout.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn smart_query_url(&self, contract: &str, query: &Value) -> String {
        format!(
            "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
            self.base_url,
            contract,
            URL_SAFE.encode(query.to_string())
        )
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(parse_error_body(status.as_u16(), &body))
    }
}

#[async_trait]
impl ChainQueryClient for LcdClient {
    #[instrument(skip(self, query))]
    async fn query(&self, contract: &str, query: &Value) -> Result<Value, RemoteError> {
        let url = self.smart_query_url(contract, query);
        let response = self.client.get(&url).send().await?;
        let mut body = Self::read_json(response).await?;

        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(RemoteError::unknown("smart query response without data")),
        }
    }

    async fn block_height(&self) -> Result<u64, RemoteError> {
        let url = format!("{}/cosmos/base/tendermint/v1beta1/blocks/latest", self.base_url);
        let response = self.client.get(&url).send().await?;
        let body = Self::read_json(response).await?;
        parse_block_height(&body)
    }

    #[instrument(skip(self, tx), fields(tx_size = tx.size()))]
    async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, RemoteError> {
        let url = format!("{}/cosmos/tx/v1beta1/txs", self.base_url);
        let payload = json!({
            "tx_bytes": STANDARD.encode(&tx.tx_bytes),
            "mode": "BROADCAST_MODE_SYNC",
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let body = Self::read_json(response).await?;
        let result = parse_broadcast(&body)?;

        debug!(
            tx_hash = %result.tx_hash,
            code = result.error_code,
            "Broadcast accepted by node"
        );
        Ok(result)
    }
}

/// Error body returned by the gRPC gateway.
#[derive(Debug, Deserialize)]
struct GatewayError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

fn parse_error_body(status: u16, body: &str) -> RemoteError {
    match serde_json::from_str::<GatewayError>(body) {
        Ok(GatewayError {
            code,
            message: Some(message),
        }) => RemoteError::new(code.unwrap_or(i64::from(status)), message),
        _ => {
            warn!(status = status, "LCD returned non-JSON error body");
            RemoteError::new(i64::from(status), body.trim().to_string())
        }
    }
}

fn parse_block_height(body: &Value) -> Result<u64, RemoteError> {
    let height = &body["block"]["header"]["height"];
    match height {
        Value::String(s) => s
            .parse()
            .map_err(|e| RemoteError::unknown(format!("invalid block height '{}': {}", s, e))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| RemoteError::unknown(format!("invalid block height {}", n))),
        _ => Err(RemoteError::unknown("block response without header height")),
    }
}

/// `tx_response` of a sync broadcast.
#[derive(Debug, Deserialize)]
struct TxResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

fn parse_broadcast(body: &Value) -> Result<BroadcastResult, RemoteError> {
    let tx_response = body
        .get("tx_response")
        .cloned()
        .ok_or_else(|| RemoteError::unknown("broadcast response without tx_response"))?;
    let tx: TxResponse = serde_json::from_value(tx_response)
        .map_err(|e| RemoteError::unknown(format!("malformed tx_response: {}", e)))?;

    match hex::decode(&tx.txhash) {
        Ok(bytes) if bytes.len() == 32 => {}
        _ => {
            return Err(RemoteError::unknown(format!(
                "broadcast returned invalid tx hash '{}'",
                tx.txhash
            )))
        }
    }

    Ok(BroadcastResult {
        tx_hash: tx.txhash,
        is_error: tx.code != 0,
        error_code: tx.code,
        raw_log: tx.raw_log,
    })
}

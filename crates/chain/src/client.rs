//! Read/broadcast interface to the chain.

use crate::error::RemoteError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::fee::Fee;

/// Encoded, signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// Protobuf-encoded `TxRaw`.
    pub tx_bytes: Vec<u8>,
    /// Fee the signature commits to (`None` for a draft).
    pub fee: Option<Fee>,
}

impl SignedTx {
    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.tx_bytes.len()
    }
}

/// Outcome of a broadcast accepted by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub is_error: bool,
    pub error_code: u32,
    pub raw_log: String,
}

/// Chain query client.
///
/// Implementations own transport concerns (timeouts, endpoints); every
/// failure is reported as a [`RemoteError`].
#[async_trait]
pub trait ChainQueryClient: Send + Sync + Debug {
    /// Run a smart query against `contract` and return the decoded JSON.
    async fn query(&self, contract: &str, query: &Value) -> Result<Value, RemoteError>;

    /// Latest block height.
    async fn block_height(&self) -> Result<u64, RemoteError>;

    /// Broadcast a signed transaction.
    async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, RemoteError>;
}

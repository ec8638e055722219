//! Wallet signing interface.
//!
//! Key management lives outside the keeper; the executor only needs a wallet
//! that can produce signed transactions for a message list.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::client::SignedTx;
use crate::error::RemoteError;
use crate::fee::Fee;
use crate::msgs::ExecuteMsg;

/// A wallet able to sign transactions.
#[async_trait]
pub trait WalletSigner: Send + Sync + Debug {
    /// Bech32 account address of the wallet.
    fn address(&self) -> &str;

    /// Build and sign a transaction carrying `msgs`.
    ///
    /// With `fee == None` the result is a draft: correctly sized, but not
    /// valid for broadcast.
    async fn create_and_sign(
        &self,
        msgs: &[ExecuteMsg],
        fee: Option<&Fee>,
    ) -> Result<SignedTx, RemoteError>;
}

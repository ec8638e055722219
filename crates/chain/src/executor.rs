//! Transaction submission pipeline.
//!
//! ```text
//! Built (draft signature) → FeeEstimated → Signed (fee-inclusive) → Broadcast → Confirmed | Rejected
//! ```
//!
//! Each stage is a private type that can only be produced from the previous
//! one, so a transaction signed before fee estimation can never reach
//! [`ChainQueryClient::broadcast`]. Failures abort the attempt; retrying with
//! a fresh build is the caller's decision.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::builder::{TxBuilder, TxIntent};
use crate::client::{ChainQueryClient, SignedTx};
use crate::error::ChainError;
use crate::fee::{Fee, FeeEstimator, GasPrice};
use crate::msgs::ExecuteMsg;
use crate::signer::WalletSigner;

/// Lifecycle stage of a submission, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Built,
    FeeEstimated,
    Signed,
    Broadcast,
    Confirmed,
    Rejected,
}

impl SubmissionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::FeeEstimated => "fee_estimated",
            Self::Signed => "signed",
            Self::Broadcast => "broadcast",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a submission: a hash on success or an error on failure, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub hash: Option<String>,
    pub error: Option<ChainError>,
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        self.hash.is_some()
    }
}

impl From<Result<String, ChainError>> for TxResult {
    fn from(result: Result<String, ChainError>) -> Self {
        match result {
            Ok(hash) => Self {
                hash: Some(hash),
                error: None,
            },
            Err(e) => Self {
                hash: None,
                error: Some(e),
            },
        }
    }
}

/// Messages with a draft (fee-less) signature, used only for sizing.
struct DraftTx {
    msgs: Vec<ExecuteMsg>,
    draft_size: usize,
}

/// Messages with an estimated fee; the draft signature is gone.
struct PricedTx {
    msgs: Vec<ExecuteMsg>,
    fee: Fee,
}

/// Transaction signed over the estimated fee; the only broadcastable form.
struct FinalTx {
    signed: SignedTx,
}

/// Signs and broadcasts transactions for one wallet.
#[derive(Debug, Clone)]
pub struct TransactionExecutor {
    client: Arc<dyn ChainQueryClient>,
    signer: Arc<dyn WalletSigner>,
    fee_estimator: Arc<dyn FeeEstimator>,
}

impl TransactionExecutor {
    pub fn new(
        client: Arc<dyn ChainQueryClient>,
        signer: Arc<dyn WalletSigner>,
        fee_estimator: Arc<dyn FeeEstimator>,
    ) -> Self {
        info!(
            wallet = signer.address(),
            fee_estimator = fee_estimator.estimator_name(),
            "Transaction executor initialized"
        );
        Self {
            client,
            signer,
            fee_estimator,
        }
    }

    /// Address of the signing wallet.
    pub fn wallet(&self) -> &str {
        self.signer.address()
    }

    /// Build messages for `intents`, submit them as one transaction and
    /// report the result.
    ///
    /// Every intent must belong to the signing wallet.
    pub async fn execute_intents(
        &self,
        builder: &TxBuilder,
        intents: &[TxIntent],
        gas_price_override: Option<&GasPrice>,
    ) -> TxResult {
        let result = match self.build_intents(builder, intents) {
            Ok(msgs) => self.execute(msgs, gas_price_override).await,
            Err(e) => Err(e),
        };
        result.into()
    }

    fn build_intents(
        &self,
        builder: &TxBuilder,
        intents: &[TxIntent],
    ) -> Result<Vec<ExecuteMsg>, ChainError> {
        intents
            .iter()
            .map(|intent| {
                if intent.wallet() != self.wallet() {
                    return Err(ChainError::invalid_intent(format!(
                        "{} does not belong to signer {}",
                        intent,
                        self.wallet()
                    )));
                }
                builder.build(intent)
            })
            .collect()
    }

    /// Submit `msgs` and return the transaction hash.
    #[instrument(skip(self, msgs, gas_price_override), fields(wallet = self.wallet(), msg_count = msgs.len()))]
    pub async fn execute(
        &self,
        msgs: Vec<ExecuteMsg>,
        gas_price_override: Option<&GasPrice>,
    ) -> Result<String, ChainError> {
        if msgs.is_empty() {
            return Err(ChainError::invalid_intent("no messages to submit"));
        }
        let start = Instant::now();

        let draft = self.build_draft(msgs).await?;
        let priced = self.estimate_fee(draft, gas_price_override).await?;
        let signed = self.sign_final(priced).await?;
        let hash = self.broadcast(signed).await?;

        info!(
            tx_hash = %hash,
            total_ms = start.elapsed().as_millis(),
            stage = %SubmissionStage::Confirmed,
            "Transaction confirmed"
        );
        Ok(hash)
    }

    async fn build_draft(&self, msgs: Vec<ExecuteMsg>) -> Result<DraftTx, ChainError> {
        let draft = self
            .signer
            .create_and_sign(&msgs, None)
            .await
            .map_err(|e| ChainError::query("create_draft_tx", e))?;

        debug!(
            draft_size = draft.size(),
            stage = %SubmissionStage::Built,
            "Draft transaction built"
        );
        Ok(DraftTx {
            msgs,
            draft_size: draft.size(),
        })
    }

    async fn estimate_fee(
        &self,
        draft: DraftTx,
        gas_price_override: Option<&GasPrice>,
    ) -> Result<PricedTx, ChainError> {
        let fee = self
            .fee_estimator
            .estimate(self.wallet(), &draft.msgs, gas_price_override)
            .await
            .map_err(|e| ChainError::query("estimate_fee", e))?;

        debug!(
            gas_limit = fee.gas_limit,
            fee = ?fee.amount,
            draft_size = draft.draft_size,
            stage = %SubmissionStage::FeeEstimated,
            "Fee estimated"
        );
        Ok(PricedTx {
            msgs: draft.msgs,
            fee,
        })
    }

    async fn sign_final(&self, priced: PricedTx) -> Result<FinalTx, ChainError> {
        let signed = self
            .signer
            .create_and_sign(&priced.msgs, Some(&priced.fee))
            .await
            .map_err(|e| ChainError::query("sign_tx", e))?;

        if signed.fee.as_ref() != Some(&priced.fee) {
            return Err(ChainError::malformed(
                "sign_tx",
                "signer did not commit to the estimated fee",
            ));
        }

        debug!(
            tx_size = signed.size(),
            stage = %SubmissionStage::Signed,
            "Transaction signed with fee"
        );
        Ok(FinalTx { signed })
    }

    async fn broadcast(&self, tx: FinalTx) -> Result<String, ChainError> {
        let result = self
            .client
            .broadcast(&tx.signed)
            .await
            .map_err(|e| ChainError::query("broadcast_tx", e))?;

        debug!(
            tx_hash = %result.tx_hash,
            stage = %SubmissionStage::Broadcast,
            "Transaction broadcast"
        );

        if result.is_error {
            warn!(
                tx_hash = %result.tx_hash,
                code = result.error_code,
                raw_log = %result.raw_log,
                stage = %SubmissionStage::Rejected,
                "Transaction rejected"
            );
            return Err(ChainError::TxRejected {
                code: result.error_code,
                raw_log: result.raw_log,
            });
        }

        Ok(result.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BroadcastResult;
    use crate::error::RemoteError;
    use crate::msgs::Coin;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WALLET: &str = "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v";
    const MARKET: &str = "terra1sepfj7s0aeg5967uxnfk4thzlerrsktkpelm5s";
    const ATERRA: &str = "terra1hzh9vpxhsk8253se0vv5jj6etdvxu3nv8z07zu";

    #[derive(Debug)]
    struct FakeClient {
        result: Result<BroadcastResult, RemoteError>,
        broadcasts: Mutex<Vec<SignedTx>>,
    }

    impl FakeClient {
        fn returning(result: Result<BroadcastResult, RemoteError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                broadcasts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChainQueryClient for FakeClient {
        async fn query(&self, _contract: &str, _query: &Value) -> Result<Value, RemoteError> {
            Ok(Value::Null)
        }

        async fn block_height(&self) -> Result<u64, RemoteError> {
            Ok(1)
        }

        async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, RemoteError> {
            self.broadcasts.lock().push(tx.clone());
            self.result.clone()
        }
    }

    /// Encodes the message count and fee into the payload so drafts and
    /// final transactions differ whenever the fee is non-zero.
    #[derive(Debug, Default)]
    struct FakeSigner {
        signed: Mutex<Vec<SignedTx>>,
    }

    #[async_trait]
    impl WalletSigner for FakeSigner {
        fn address(&self) -> &str {
            WALLET
        }

        async fn create_and_sign(
            &self,
            msgs: &[ExecuteMsg],
            fee: Option<&Fee>,
        ) -> Result<SignedTx, RemoteError> {
            let fee_amount = fee
                .map(|f| f.amount.iter().map(|c| c.amount).sum::<u128>())
                .unwrap_or(0);
            let mut tx_bytes = vec![msgs.len() as u8];
            tx_bytes.extend_from_slice(&fee_amount.to_be_bytes());
            let tx = SignedTx {
                tx_bytes,
                fee: fee.cloned(),
            };
            self.signed.lock().push(tx.clone());
            Ok(tx)
        }
    }

    #[derive(Debug)]
    struct FakeEstimator {
        calls: AtomicUsize,
        fee: Result<Fee, RemoteError>,
    }

    impl FakeEstimator {
        fn returning(fee: Result<Fee, RemoteError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fee,
            })
        }
    }

    #[async_trait]
    impl FeeEstimator for FakeEstimator {
        async fn estimate(
            &self,
            _sender: &str,
            _msgs: &[ExecuteMsg],
            _gas_price_override: Option<&GasPrice>,
        ) -> Result<Fee, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.fee.clone()
        }

        fn estimator_name(&self) -> &'static str {
            "Fake"
        }
    }

    fn fee() -> Fee {
        Fee {
            gas_limit: 770_000,
            amount: vec![Coin::uusd(115_500)],
        }
    }

    fn ok_broadcast() -> BroadcastResult {
        BroadcastResult {
            tx_hash: "ABCD".to_string(),
            is_error: false,
            error_code: 0,
            raw_log: String::new(),
        }
    }

    fn repay_msg() -> ExecuteMsg {
        TxBuilder::new(MARKET, ATERRA).build_repay(WALLET, 200).unwrap()
    }

    #[tokio::test]
    async fn test_execute_confirms_and_returns_hash() {
        let client = FakeClient::returning(Ok(ok_broadcast()));
        let signer = Arc::new(FakeSigner::default());
        let estimator = FakeEstimator::returning(Ok(fee()));
        let executor = TransactionExecutor::new(client.clone(), signer.clone(), estimator.clone());

        let hash = executor.execute(vec![repay_msg()], None).await.unwrap();
        assert_eq!(hash, "ABCD");
        assert_eq!(estimator.calls.load(Ordering::SeqCst), 1);

        // Draft then final signature; only the final one is broadcast.
        let signed = signer.signed.lock().clone();
        assert_eq!(signed.len(), 2);
        assert!(signed[0].fee.is_none());
        let broadcasts = client.broadcasts.lock().clone();
        assert_eq!(broadcasts.len(), 1);
        assert_ne!(broadcasts[0].tx_bytes, signed[0].tx_bytes);
        assert_eq!(broadcasts[0].fee, Some(fee()));
    }

    #[tokio::test]
    async fn test_tx_error_becomes_rejected() {
        let client = FakeClient::returning(Ok(BroadcastResult {
            tx_hash: "ABCD".to_string(),
            is_error: true,
            error_code: 5,
            raw_log: "insufficient funds".to_string(),
        }));
        let executor = TransactionExecutor::new(
            client,
            Arc::new(FakeSigner::default()),
            FakeEstimator::returning(Ok(fee())),
        );

        let err = executor.execute(vec![repay_msg()], None).await.unwrap_err();
        assert_eq!(
            err,
            ChainError::TxRejected {
                code: 5,
                raw_log: "insufficient funds".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fee_failure_aborts_before_broadcast() {
        let client = FakeClient::returning(Ok(ok_broadcast()));
        let signer = Arc::new(FakeSigner::default());
        let executor = TransactionExecutor::new(
            client.clone(),
            signer.clone(),
            FakeEstimator::returning(Err(RemoteError::new(13, "out of gas"))),
        );

        let err = executor.execute(vec![repay_msg()], None).await.unwrap_err();
        assert_eq!(err.action(), Some("estimate_fee"));
        assert!(client.broadcasts.lock().is_empty());
        assert_eq!(signer.signed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_failure_is_query_error() {
        let client = FakeClient::returning(Err(RemoteError::new(503, "unavailable")));
        let executor = TransactionExecutor::new(
            client,
            Arc::new(FakeSigner::default()),
            FakeEstimator::returning(Ok(fee())),
        );

        let err = executor.execute(vec![repay_msg()], None).await.unwrap_err();
        assert_eq!(
            err,
            ChainError::Query {
                action: "broadcast_tx".to_string(),
                code: 503,
                message: "unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_intents_for_other_wallet_rejected() {
        let executor = TransactionExecutor::new(
            FakeClient::returning(Ok(ok_broadcast())),
            Arc::new(FakeSigner::default()),
            FakeEstimator::returning(Ok(fee())),
        );
        let intent = TxIntent::ClaimRewards {
            wallet: MARKET.to_string(),
        };

        let result = executor
            .execute_intents(&TxBuilder::new(MARKET, ATERRA), &[intent], None)
            .await;
        assert!(!result.is_success());
        assert!(matches!(result.error, Some(ChainError::InvalidIntent { .. })));
    }

    #[tokio::test]
    async fn test_execute_intents_reports_hash() {
        let client = FakeClient::returning(Ok(ok_broadcast()));
        let executor = TransactionExecutor::new(
            client.clone(),
            Arc::new(FakeSigner::default()),
            FakeEstimator::returning(Ok(fee())),
        );
        let intents = [
            TxIntent::WithdrawFromEarn {
                wallet: WALLET.to_string(),
                amount: 167,
            },
            TxIntent::Repay {
                wallet: WALLET.to_string(),
                amount: 200,
            },
        ];

        let result = executor
            .execute_intents(&TxBuilder::new(MARKET, ATERRA), &intents, None)
            .await;
        assert_eq!(result.hash.as_deref(), Some("ABCD"));
        assert!(result.error.is_none());
        assert_eq!(client.broadcasts.lock().len(), 1);
    }

    /// Returns a transaction without the fee it was asked to sign over.
    #[derive(Debug, Default)]
    struct FeeIgnoringSigner;

    #[async_trait]
    impl WalletSigner for FeeIgnoringSigner {
        fn address(&self) -> &str {
            WALLET
        }

        async fn create_and_sign(
            &self,
            msgs: &[ExecuteMsg],
            _fee: Option<&Fee>,
        ) -> Result<SignedTx, RemoteError> {
            Ok(SignedTx {
                tx_bytes: vec![msgs.len() as u8],
                fee: None,
            })
        }
    }

    #[tokio::test]
    async fn test_signature_without_fee_never_broadcast() {
        let client = FakeClient::returning(Ok(ok_broadcast()));
        let executor = TransactionExecutor::new(
            client.clone(),
            Arc::new(FeeIgnoringSigner),
            FakeEstimator::returning(Ok(fee())),
        );

        let err = executor.execute(vec![repay_msg()], None).await.unwrap_err();
        assert_eq!(err.action(), Some("sign_tx"));
        assert!(client.broadcasts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_submission_rejected() {
        let executor = TransactionExecutor::new(
            FakeClient::returning(Ok(ok_broadcast())),
            Arc::new(FakeSigner::default()),
            FakeEstimator::returning(Ok(fee())),
        );
        assert!(executor.execute(Vec::new(), None).await.is_err());
    }

    #[test]
    fn test_tx_result_from_result() {
        let ok: TxResult = Ok::<_, ChainError>("ABCD".to_string()).into();
        assert!(ok.is_success());
        assert!(ok.error.is_none());

        let err: TxResult = Err(ChainError::invalid_intent("bad")).into();
        assert!(!err.is_success());
        assert!(err.error.is_some());
    }
}

//! Automation loop keeping managed wallets inside their LTV band.
//!
//! Each round reads every configured wallet concurrently, assesses it
//! against its [`WalletPolicy`], and repays or borrows back to target when
//! the LTV leaves the band. Without an executor the monitor only reports.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use keeper_chain::{ChainError, GasPrice, TransactionExecutor, TxBuilder, TxIntent, TxResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{MonitorSettings, WalletPolicy};
use crate::position::Position;
use crate::rates::RateService;
use crate::reader::PositionReader;
use crate::risk::{assess, RiskAssessment};

/// What the monitor decided to do for a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// LTV is inside the band
    Hold,
    /// Repay `amount` uusd, redeeming `from_earn` aTerra first if set
    Repay { amount: i128, from_earn: Option<i128> },
    /// Borrow `amount` uusd
    Borrow { amount: i128 },
}

impl Action {
    /// Intents realizing this action, in submission order.
    pub fn intents(&self, wallet: &str) -> Vec<TxIntent> {
        match *self {
            Self::Hold => Vec::new(),
            Self::Repay { amount, from_earn } => {
                let mut intents = Vec::with_capacity(2);
                if let Some(aterra) = from_earn {
                    intents.push(TxIntent::WithdrawFromEarn {
                        wallet: wallet.to_string(),
                        amount: aterra,
                    });
                }
                intents.push(TxIntent::Repay {
                    wallet: wallet.to_string(),
                    amount,
                });
                intents
            }
            Self::Borrow { amount } => vec![TxIntent::Borrow {
                wallet: wallet.to_string(),
                amount,
            }],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hold => write!(f, "hold"),
            Self::Repay { amount, from_earn: Some(aterra) } => {
                write!(f, "repay {} uusd (redeeming {} aTerra)", amount, aterra)
            }
            Self::Repay { amount, from_earn: None } => write!(f, "repay {} uusd", amount),
            Self::Borrow { amount } => write!(f, "borrow {} uusd", amount),
        }
    }
}

/// Result of acting (or not) on a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do
    NoAction,
    /// Action decided but not submitted (dry-run or watch-only wallet)
    DryRun,
    /// A newer height was already observed for this wallet
    Stale { latest_height: u64 },
    /// Transaction broadcast and accepted
    Submitted { tx_hash: String },
    /// Read or submission failed
    Failed { error: ChainError },
}

impl From<TxResult> for Outcome {
    fn from(result: TxResult) -> Self {
        match (result.hash, result.error) {
            (_, Some(error)) => Outcome::Failed { error },
            (Some(tx_hash), None) => Outcome::Submitted { tx_hash },
            (None, None) => Outcome::Failed {
                error: ChainError::invalid_intent("submission reported neither hash nor error"),
            },
        }
    }
}

/// Per-wallet report of one monitor round.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub wallet: String,
    pub evaluated_at: DateTime<Utc>,
    pub assessment: Option<RiskAssessment>,
    pub action: Action,
    pub outcome: Outcome,
}

impl Evaluation {
    fn failed(wallet: &str, assessment: Option<RiskAssessment>, action: Action, error: ChainError) -> Self {
        Self {
            wallet: wallet.to_string(),
            evaluated_at: Utc::now(),
            assessment,
            action,
            outcome: Outcome::Failed { error },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Choose the action for `assessment` under `policy`, ignoring Earn funding.
pub fn decide(policy: &WalletPolicy, assessment: &RiskAssessment) -> Action {
    if assessment.is_above(policy.trigger_ltv) {
        if let Some(adj) = assessment.repay.filter(|a| a.is_actionable()) {
            return Action::Repay {
                amount: adj.amount,
                from_earn: None,
            };
        }
    }

    if let Some(borrow_ltv) = policy.borrow_ltv {
        if assessment.is_below(borrow_ltv) {
            if let Some(adj) = assessment.borrow.filter(|a| a.is_actionable()) {
                return Action::Borrow { amount: adj.amount };
            }
        }
    }

    Action::Hold
}

/// Position keeper for a set of wallets.
pub struct Monitor {
    reader: PositionReader,
    builder: TxBuilder,
    executor: Option<Arc<TransactionExecutor>>,
    rates: Option<RateService>,
    policies: Vec<WalletPolicy>,
    settings: MonitorSettings,
    gas_price: Option<GasPrice>,
    /// Highest block height observed per wallet
    heights: DashMap<String, u64>,
}

impl Monitor {
    pub fn new(
        reader: PositionReader,
        builder: TxBuilder,
        policies: Vec<WalletPolicy>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            reader,
            builder,
            executor: None,
            rates: None,
            policies,
            settings,
            gas_price: None,
            heights: DashMap::new(),
        }
    }

    /// Enable transaction submission for the executor's wallet.
    pub fn with_executor(mut self, executor: Arc<TransactionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Report market rates every round.
    pub fn with_rates(mut self, rates: RateService) -> Self {
        self.rates = Some(rates);
        self
    }

    /// Override the estimator's default gas price.
    pub fn with_gas_price(mut self, gas_price: GasPrice) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Record an observed block height for `wallet`. Returns the highest
    /// height known for it afterwards.
    pub fn observe_height(&self, wallet: &str, height: u64) -> u64 {
        let mut entry = self.heights.entry(wallet.to_string()).or_insert(height);
        if height > *entry {
            *entry = height;
        }
        *entry
    }

    /// Highest block height observed for `wallet`.
    pub fn latest_height(&self, wallet: &str) -> Option<u64> {
        self.heights.get(wallet).map(|h| *h)
    }

    fn can_submit(&self, wallet: &str) -> Option<&TransactionExecutor> {
        if self.settings.dry_run {
            return None;
        }
        self.executor
            .as_deref()
            .filter(|executor| executor.wallet() == wallet)
    }

    /// Run forever, one round per configured interval.
    pub async fn run(&self) {
        info!(
            wallets = self.policies.len(),
            interval_secs = self.settings.interval_secs,
            dry_run = self.settings.dry_run || self.executor.is_none(),
            "Starting monitor loop"
        );

        let mut ticker = interval(self.settings.interval());
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// Evaluate every wallet once.
    pub async fn run_once(&self) -> Vec<Evaluation> {
        if self.settings.report_rates {
            self.report_rates().await;
        }

        let evaluations: Vec<Evaluation> = stream::iter(self.policies.iter())
            .map(|policy| self.evaluate(policy))
            .buffer_unordered(self.settings.max_concurrent)
            .collect()
            .await;

        for evaluation in &evaluations {
            log_evaluation(evaluation);
        }

        let failures = evaluations.iter().filter(|e| e.is_failure()).count();
        info!(
            evaluated = evaluations.len(),
            failures = failures,
            "Monitor round complete"
        );
        evaluations
    }

    /// Read, assess and (if allowed) act on one wallet.
    #[instrument(skip(self, policy), fields(wallet = %policy.address))]
    pub async fn evaluate(&self, policy: &WalletPolicy) -> Evaluation {
        let wallet = policy.address.as_str();

        let position = match self.reader.read_position(wallet).await {
            Ok(position) => position,
            Err(error) => return Evaluation::failed(wallet, None, Action::Hold, error),
        };

        let assessment = assess(&position, policy.target_ltv);
        let mut action = decide(policy, &assessment);

        if let Some(latest_height) = self.stale_height(&position) {
            return Evaluation {
                wallet: wallet.to_string(),
                evaluated_at: Utc::now(),
                assessment: Some(assessment),
                action: Action::Hold,
                outcome: Outcome::Stale { latest_height },
            };
        }

        if let Action::Repay { amount, .. } = action {
            if policy.repay_from_earn {
                match self.earn_funding(wallet, amount).await {
                    Ok(from_earn) => action = Action::Repay { amount, from_earn },
                    Err(error) => return Evaluation::failed(wallet, Some(assessment), action, error),
                }
            }
        }

        let outcome = self.act(wallet, &action).await;
        Evaluation {
            wallet: wallet.to_string(),
            evaluated_at: Utc::now(),
            assessment: Some(assessment),
            action,
            outcome,
        }
    }

    /// Record `position`'s height and return the newer height if the
    /// snapshot is already behind one observed for the same wallet.
    fn stale_height(&self, position: &Position) -> Option<u64> {
        let latest = self.observe_height(&position.wallet_address, position.block_height);
        position.is_stale(latest).then_some(latest)
    }

    /// aTerra to redeem to cover `amount` uusd, capped at the wallet's
    /// Earn balance. `None` when there is nothing to redeem.
    async fn earn_funding(&self, wallet: &str, amount: i128) -> Result<Option<i128>, ChainError> {
        let earn = self.reader.read_earn_position(wallet).await?;
        let needed = earn
            .aterra_for(Decimal::from(amount))
            .ok_or_else(|| ChainError::malformed("get_exchange_rate", "exchange rate is zero"))?;
        let aterra = needed.min(earn.aterra_balance.trunc());

        debug!(
            wallet = wallet,
            needed = %needed,
            available = %earn.aterra_balance,
            "Earn funding for repay"
        );
        Ok(aterra.to_i128().filter(|a| *a > 0))
    }

    async fn act(&self, wallet: &str, action: &Action) -> Outcome {
        if *action == Action::Hold {
            return Outcome::NoAction;
        }

        let Some(executor) = self.can_submit(wallet) else {
            return Outcome::DryRun;
        };

        let intents = action.intents(wallet);
        executor
            .execute_intents(&self.builder, &intents, self.gas_price.as_ref())
            .await
            .into()
    }

    async fn report_rates(&self) {
        let Some(rates) = &self.rates else {
            return;
        };
        match rates.market_rates().await {
            Ok(r) => info!(earn_apy = %r.earn_apy, borrow_apy = %r.borrow_apy, "Market rates"),
            Err(e) => warn!(error = %e, "Failed to fetch market rates"),
        }
    }
}

fn log_evaluation(evaluation: &Evaluation) {
    let ltv = evaluation
        .assessment
        .as_ref()
        .and_then(|a| a.current_ltv)
        .map(|ltv| ltv.to_string())
        .unwrap_or_else(|| "unavailable".to_string());

    match &evaluation.outcome {
        Outcome::NoAction => debug!(wallet = %evaluation.wallet, ltv = %ltv, "Within band"),
        Outcome::DryRun => info!(
            wallet = %evaluation.wallet,
            ltv = %ltv,
            action = %evaluation.action,
            "Dry run: action not submitted"
        ),
        Outcome::Stale { latest_height } => warn!(
            wallet = %evaluation.wallet,
            latest_height = latest_height,
            "Snapshot behind observed height, skipping"
        ),
        Outcome::Submitted { tx_hash } => info!(
            wallet = %evaluation.wallet,
            ltv = %ltv,
            action = %evaluation.action,
            tx_hash = %tx_hash,
            "Position adjusted"
        ),
        Outcome::Failed { error } => error!(
            wallet = %evaluation.wallet,
            action = %evaluation.action,
            error = %error,
            "Evaluation failed"
        ),
    }
}

//! Money-market message construction.
//!
//! Every constructor is pure: it validates the wallet address and amount and
//! returns the execute message, without touching the network.
//!
//! # Example
//!
//! ```rust,ignore
//! let builder = TxBuilder::new(market, aterra);
//! let msg = builder.build(&TxIntent::Repay { wallet, amount: 200_000_000 })?;
//! executor.execute(vec![msg], None).await?;
//! ```

use std::fmt;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex_lite::Regex;
use serde_json::json;

use crate::error::ChainError;
use crate::msgs::{Coin, ExecuteMsg};

/// Bech32 account (38 data chars) or contract (58 data chars) address.
fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^terra1[02-9ac-hj-np-z]{38}(?:[02-9ac-hj-np-z]{20})?$")
            .expect("address pattern is valid")
    })
}

/// Check that `address` is a well-formed `terra1…` bech32 address.
pub fn is_valid_address(address: &str) -> bool {
    address_regex().is_match(address)
}

fn validate_address(field: &str, address: &str) -> Result<(), ChainError> {
    if is_valid_address(address) {
        Ok(())
    } else {
        Err(ChainError::invalid_intent(format!(
            "{} '{}' is not a terra address",
            field, address
        )))
    }
}

fn validate_amount(amount: i128) -> Result<u128, ChainError> {
    u128::try_from(amount)
        .map_err(|_| ChainError::invalid_intent(format!("amount {} is negative", amount)))
}

/// A requested position change, consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxIntent {
    Repay { wallet: String, amount: i128 },
    Borrow { wallet: String, amount: i128 },
    DepositToEarn { wallet: String, amount: i128 },
    /// `amount` is in aTerra (the yield-bearing token), not uusd.
    WithdrawFromEarn { wallet: String, amount: i128 },
    ClaimRewards { wallet: String },
}

impl TxIntent {
    pub fn wallet(&self) -> &str {
        match self {
            Self::Repay { wallet, .. }
            | Self::Borrow { wallet, .. }
            | Self::DepositToEarn { wallet, .. }
            | Self::WithdrawFromEarn { wallet, .. }
            | Self::ClaimRewards { wallet } => wallet,
        }
    }

    pub fn amount(&self) -> Option<i128> {
        match self {
            Self::Repay { amount, .. }
            | Self::Borrow { amount, .. }
            | Self::DepositToEarn { amount, .. }
            | Self::WithdrawFromEarn { amount, .. } => Some(*amount),
            Self::ClaimRewards { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Repay { .. } => "repay",
            Self::Borrow { .. } => "borrow",
            Self::DepositToEarn { .. } => "deposit",
            Self::WithdrawFromEarn { .. } => "withdraw",
            Self::ClaimRewards { .. } => "claim_rewards",
        }
    }
}

impl fmt::Display for TxIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount() {
            Some(amount) => write!(f, "{} {} for {}", self.name(), amount, self.wallet()),
            None => write!(f, "{} for {}", self.name(), self.wallet()),
        }
    }
}

/// Builds Anchor money-market messages.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    market_contract: String,
    aterra_contract: String,
}

impl TxBuilder {
    pub fn new(market_contract: impl Into<String>, aterra_contract: impl Into<String>) -> Self {
        Self {
            market_contract: market_contract.into(),
            aterra_contract: aterra_contract.into(),
        }
    }

    /// Build the message for any intent.
    pub fn build(&self, intent: &TxIntent) -> Result<ExecuteMsg, ChainError> {
        match intent {
            TxIntent::Repay { wallet, amount } => self.build_repay(wallet, *amount),
            TxIntent::Borrow { wallet, amount } => self.build_borrow(wallet, *amount),
            TxIntent::DepositToEarn { wallet, amount } => self.build_deposit(wallet, *amount),
            TxIntent::WithdrawFromEarn { wallet, amount } => self.build_withdraw(wallet, *amount),
            TxIntent::ClaimRewards { wallet } => self.build_claim_rewards(wallet),
        }
    }

    /// Repay `amount` uusd of stable debt.
    pub fn build_repay(&self, wallet: &str, amount: i128) -> Result<ExecuteMsg, ChainError> {
        validate_address("wallet", wallet)?;
        let amount = validate_amount(amount)?;

        Ok(
            ExecuteMsg::new(wallet, &self.market_contract, json!({"repay_stable": {}}))
                .with_coin(Coin::uusd(amount)),
        )
    }

    /// Borrow `amount` uusd to the wallet itself.
    pub fn build_borrow(&self, wallet: &str, amount: i128) -> Result<ExecuteMsg, ChainError> {
        validate_address("wallet", wallet)?;
        let amount = validate_amount(amount)?;

        Ok(ExecuteMsg::new(
            wallet,
            &self.market_contract,
            json!({
                "borrow_stable": {
                    "borrow_amount": amount.to_string(),
                    "to": wallet,
                }
            }),
        ))
    }

    /// Deposit `amount` uusd into Earn.
    pub fn build_deposit(&self, wallet: &str, amount: i128) -> Result<ExecuteMsg, ChainError> {
        validate_address("wallet", wallet)?;
        let amount = validate_amount(amount)?;

        Ok(
            ExecuteMsg::new(wallet, &self.market_contract, json!({"deposit_stable": {}}))
                .with_coin(Coin::uusd(amount)),
        )
    }

    /// Redeem `amount` aTerra from Earn.
    ///
    /// aTerra is a CW20 token: the redeem instruction is JSON-encoded, base64
    /// wrapped and handed to the market through a CW20 `send` on the aTerra
    /// contract, which forwards it as a receive hook.
    pub fn build_withdraw(&self, wallet: &str, amount: i128) -> Result<ExecuteMsg, ChainError> {
        validate_address("wallet", wallet)?;
        let amount = validate_amount(amount)?;

        let inner = STANDARD.encode(json!({"redeem_stable": {}}).to_string());
        Ok(ExecuteMsg::new(
            wallet,
            &self.aterra_contract,
            json!({
                "send": {
                    "contract": self.market_contract,
                    "amount": amount.to_string(),
                    "msg": inner,
                }
            }),
        ))
    }

    /// Claim pending ANC rewards to the wallet.
    pub fn build_claim_rewards(&self, wallet: &str) -> Result<ExecuteMsg, ChainError> {
        validate_address("wallet", wallet)?;

        Ok(ExecuteMsg::new(
            wallet,
            &self.market_contract,
            json!({"claim_rewards": {"to": wallet}}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const WALLET: &str = "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v";
    const MARKET: &str = "terra1sepfj7s0aeg5967uxnfk4thzlerrsktkpelm5s";
    const ATERRA: &str = "terra1hzh9vpxhsk8253se0vv5jj6etdvxu3nv8z07zu";

    fn builder() -> TxBuilder {
        TxBuilder::new(MARKET, ATERRA)
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(WALLET));
        assert!(is_valid_address(
            "terra14hj2tavq8fpesdwxxcu44rty3hh90vhujrvcmstl4zr3txmfvw9ssrc8au"
        ));
        assert!(!is_valid_address("terra1short"));
        assert!(!is_valid_address("cosmos1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v"));
        // 'b' is not in the bech32 charset
        assert!(!is_valid_address("terra1b46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v"));
    }

    #[test]
    fn test_build_repay() {
        let msg = builder().build_repay(WALLET, 200).unwrap();
        assert_eq!(msg.contract, MARKET);
        assert_eq!(msg.sender, WALLET);
        assert_eq!(msg.msg, json!({"repay_stable": {}}));
        assert_eq!(msg.coins.as_slice(), &[Coin::uusd(200)]);
    }

    #[test]
    fn test_build_borrow() {
        let msg = builder().build_borrow(WALLET, 1_000_000).unwrap();
        assert_eq!(
            msg.msg,
            json!({"borrow_stable": {"borrow_amount": "1000000", "to": WALLET}})
        );
        assert!(msg.coins.is_empty());
    }

    #[test]
    fn test_build_deposit() {
        let msg = builder().build_deposit(WALLET, 50).unwrap();
        assert_eq!(msg.contract, MARKET);
        assert_eq!(msg.action(), Some("deposit_stable"));
        assert_eq!(msg.coins.as_slice(), &[Coin::uusd(50)]);
    }

    #[test]
    fn test_build_withdraw_nests_redeem_instruction() {
        let msg = builder().build_withdraw(WALLET, 42).unwrap();
        assert_eq!(msg.contract, ATERRA);

        let send = &msg.msg["send"];
        assert_eq!(send["contract"], MARKET);
        assert_eq!(send["amount"], "42");

        let blob = send["msg"].as_str().unwrap();
        let decoded: Value = serde_json::from_slice(&STANDARD.decode(blob).unwrap()).unwrap();
        assert_eq!(decoded, json!({"redeem_stable": {}}));
    }

    #[test]
    fn test_build_claim_rewards() {
        let msg = builder().build_claim_rewards(WALLET).unwrap();
        assert_eq!(msg.msg, json!({"claim_rewards": {"to": WALLET}}));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = builder().build_repay(WALLET, -1).unwrap_err();
        assert!(matches!(err, ChainError::InvalidIntent { .. }));
    }

    #[test]
    fn test_malformed_wallet_rejected() {
        let err = builder().build_claim_rewards("not-an-address").unwrap_err();
        assert!(matches!(err, ChainError::InvalidIntent { .. }));
    }

    #[test]
    fn test_build_dispatches_on_intent() {
        let intent = TxIntent::WithdrawFromEarn {
            wallet: WALLET.to_string(),
            amount: 7,
        };
        assert_eq!(builder().build(&intent).unwrap().action(), Some("send"));
        assert_eq!(intent.to_string(), format!("withdraw 7 for {}", WALLET));
    }
}

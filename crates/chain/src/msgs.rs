//! Wire types for CosmWasm execute messages and coins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;

/// Stablecoin denomination used for all Anchor money-market amounts.
pub const UUSD: &str = "uusd";

/// A denominated amount in the chain's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    /// Serialized as a string, as the chain's JSON encoding expects.
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn uusd(amount: u128) -> Self {
        Self::new(UUSD, amount)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// `MsgExecuteContract`: call `contract` with JSON `msg`, attaching `coins`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteMsg {
    pub sender: String,
    pub contract: String,
    #[serde(rename = "execute_msg")]
    pub msg: Value,
    #[serde(default)]
    pub coins: SmallVec<[Coin; 1]>,
}

impl ExecuteMsg {
    pub fn new(sender: impl Into<String>, contract: impl Into<String>, msg: Value) -> Self {
        Self {
            sender: sender.into(),
            contract: contract.into(),
            msg,
            coins: SmallVec::new(),
        }
    }

    pub fn with_coin(mut self, coin: Coin) -> Self {
        self.coins.push(coin);
        self
    }

    /// Name of the contract entry point (the single top-level key of `msg`).
    pub fn action(&self) -> Option<&str> {
        self.msg
            .as_object()
            .and_then(|obj| obj.keys().next())
            .map(String::as_str)
    }
}

mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Keeper configuration.
//!
//! This module provides:
//! - Contract address table with on-chain discovery
//! - Runtime configuration (chain access, protocol constants, monitor timing)
//! - Per-wallet LTV policies

mod contracts;
mod keeper;

pub use contracts::ContractAddresses;
pub use keeper::{
    ChainSettings, KeeperConfig, MonitorSettings, ProtocolSettings, WalletPolicy,
    DEFAULT_BLOCKS_PER_YEAR, DEFAULT_CONFIG_PATH,
};

#[cfg(test)]
pub(crate) use contracts::tests::mainnet as mainnet_contracts;

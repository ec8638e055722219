//! Anchor keeper core logic.
//!
//! This crate provides the position-risk engine:
//! - Configuration with contract discovery
//! - Same-height position snapshots from the Anchor contracts
//! - LTV and repay/borrow amount calculation
//! - Earn and borrow APY
//! - Monitor loop keeping wallets inside their LTV band

pub mod config;
mod monitor;
mod position;
mod rates;
mod reader;
pub mod risk;

pub use config::{
    ChainSettings, ContractAddresses, KeeperConfig, MonitorSettings, ProtocolSettings,
    WalletPolicy,
};
pub use monitor::{decide, Action, Evaluation, Monitor, Outcome};
pub use position::{EarnPosition, Position};
pub use rates::{MarketRates, RateService};
pub use reader::PositionReader;
pub use risk::{
    amount_to_borrow, amount_to_repay, assess, current_ltv, AdjustmentKind, AmountAdjustment,
    RiskAssessment,
};

//! Anchor keeper API clients for off-chain data.
//!
//! This crate provides HTTP clients for:
//! - Anchor API: ANC distribution APY and total liabilities
//! - Mantle: bank balances of the money-market contract

mod anchor;
mod de;
mod mantle;
mod provider;

pub use anchor::{AnchorApiClient, DistributionStats, DEFAULT_ANCHOR_API_URL};
pub use mantle::MantleClient;
pub use provider::{HttpStatsProvider, StatsProvider};

//! Keeper chain interaction layer.
//!
//! This crate provides:
//! - The `ChainQueryClient` interface and its LCD (REST) implementation
//! - Wallet signing and fee estimation interfaces
//! - Anchor money-market message construction
//! - The draft → fee → sign → broadcast transaction pipeline
//! - The shared error taxonomy

mod builder;
mod client;
mod error;
mod executor;
pub mod fee;
mod lcd;
mod msgs;
pub mod response;
mod signer;

pub use builder::{is_valid_address, TxBuilder, TxIntent};
pub use client::{BroadcastResult, ChainQueryClient, SignedTx};
pub use error::{ChainError, RemoteError, UNKNOWN_ERROR_CODE};
pub use executor::{SubmissionStage, TransactionExecutor, TxResult};
pub use fee::{Fee, FeeEstimator, GasPrice, GasPriceFeeEstimator};
pub use lcd::LcdClient;
pub use msgs::{Coin, ExecuteMsg, UUSD};
pub use signer::WalletSigner;

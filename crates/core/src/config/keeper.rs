//! Keeper runtime configuration loaded from TOML.

use anyhow::{bail, Context, Result};
use keeper_api::DEFAULT_ANCHOR_API_URL;
use keeper_chain::{is_valid_address, GasPrice, GasPriceFeeEstimator};
use regex_lite::{Captures, Regex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

use super::ContractAddresses;

/// Default config file location, overridden by `CONFIG_PATH`.
pub const DEFAULT_CONFIG_PATH: &str = "config/keeper.toml";

/// Anchor's blocks-per-year constant used to annualize per-block rates.
pub const DEFAULT_BLOCKS_PER_YEAR: u64 = 4_656_810;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// LCD endpoint and gas pricing
    pub chain: ChainSettings,

    /// Anchor contract addresses
    pub contracts: ContractAddresses,

    /// Protocol constants and off-chain endpoints
    #[serde(default)]
    pub protocol: ProtocolSettings,

    /// Automation loop settings
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Managed wallets
    #[serde(default)]
    pub wallets: Vec<WalletPolicy>,
}

/// Chain access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    /// LCD REST endpoint
    pub lcd_url: String,

    /// Chain ID (e.g., "columbus-5")
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Default gas price in uusd
    #[serde(default = "default_gas_price")]
    pub gas_price_uusd: Decimal,

    /// Maximum gas price willing to pay in uusd
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_uusd: Decimal,

    /// Gas limit multiplier (e.g., 1.4 for 40% buffer)
    #[serde(default = "default_gas_adjustment")]
    pub gas_adjustment: Decimal,
}

impl ChainSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fee estimator priced from these settings.
    ///
    /// The binary runs watch-only; a signer integration passes this to
    /// `TransactionExecutor::new` and hands the executor to
    /// `Monitor::with_executor`.
    pub fn fee_estimator(&self) -> GasPriceFeeEstimator {
        GasPriceFeeEstimator::new(GasPrice::uusd(self.gas_price_uusd), self.max_gas_price_uusd)
            .with_gas_adjustment(self.gas_adjustment)
    }
}

fn default_chain_id() -> String {
    "columbus-5".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_gas_price() -> Decimal {
    Decimal::new(15, 2)
}

fn default_max_gas_price() -> Decimal {
    Decimal::new(5, 1)
}

fn default_gas_adjustment() -> Decimal {
    Decimal::new(14, 1)
}

/// Protocol constants and off-chain data endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Blocks per year used to annualize per-block rates
    #[serde(default = "default_blocks_per_year")]
    pub blocks_per_year: u64,

    /// Anchor statistics API base URL
    #[serde(default = "default_stats_api_url")]
    pub stats_api_url: String,

    /// Mantle GraphQL endpoint
    #[serde(default = "default_mantle_endpoint")]
    pub mantle_endpoint: String,

    /// Contracts whose `config` is queried at startup to refresh addresses
    #[serde(default)]
    pub discover_from: Vec<String>,
}

fn default_blocks_per_year() -> u64 {
    DEFAULT_BLOCKS_PER_YEAR
}

fn default_stats_api_url() -> String {
    DEFAULT_ANCHOR_API_URL.to_string()
}

fn default_mantle_endpoint() -> String {
    "https://mantle.terra.dev".to_string()
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            blocks_per_year: default_blocks_per_year(),
            stats_api_url: default_stats_api_url(),
            mantle_endpoint: default_mantle_endpoint(),
            discover_from: Vec::new(),
        }
    }
}

/// Automation loop timing and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between evaluation rounds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum wallets evaluated concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Only report decisions, never submit transactions
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Log earn/borrow APY every round
    #[serde(default)]
    pub report_rates: bool,
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    4
}

fn default_dry_run() -> bool {
    true
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_concurrent: default_max_concurrent(),
            dry_run: default_dry_run(),
            report_rates: false,
        }
    }
}

/// LTV policy for one managed wallet. All LTVs are percentages (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPolicy {
    /// Wallet address
    pub address: String,

    /// LTV the keeper steers back to
    pub target_ltv: Decimal,

    /// Repay down to target when LTV exceeds this
    pub trigger_ltv: Decimal,

    /// Borrow up to target when LTV falls below this (disabled if unset)
    #[serde(default)]
    pub borrow_ltv: Option<Decimal>,

    /// Fund repays by redeeming aTerra from Earn in the same transaction
    #[serde(default)]
    pub repay_from_earn: bool,
}

impl KeeperConfig {
    /// Load configuration from a TOML file, expanding `${VAR}` references.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {:?}", path))
    }

    /// Parse configuration from TOML text, expanding `${VAR}` references.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(&expand_env(content))?;
        Ok(config)
    }

    /// Load from `CONFIG_PATH`, or the default location.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        info!(path = %path, "Loading keeper configuration");
        let config = Self::from_file(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the keeper cannot act on safely.
    pub fn validate(&self) -> Result<()> {
        if self.chain.lcd_url.contains("${") {
            bail!("Unresolved environment reference in lcd_url: {}", self.chain.lcd_url);
        }
        if self.chain.gas_price_uusd <= Decimal::ZERO {
            bail!("gas_price_uusd must be positive");
        }
        if self.chain.max_gas_price_uusd < self.chain.gas_price_uusd {
            bail!("max_gas_price_uusd is below gas_price_uusd");
        }
        if self.chain.gas_adjustment < Decimal::ONE {
            bail!("gas_adjustment must be at least 1.0");
        }

        self.contracts.validate()?;
        for source in &self.protocol.discover_from {
            if !is_valid_address(source) {
                bail!("Invalid discovery source address: '{}'", source);
            }
        }

        if self.protocol.blocks_per_year == 0 {
            bail!("blocks_per_year must be positive");
        }
        if self.monitor.interval_secs == 0 {
            bail!("monitor.interval_secs must be positive");
        }
        if self.monitor.max_concurrent == 0 {
            bail!("monitor.max_concurrent must be positive");
        }

        let mut seen = HashSet::new();
        for wallet in &self.wallets {
            wallet.validate()?;
            if !seen.insert(wallet.address.as_str()) {
                bail!("Wallet {} configured twice", wallet.address);
            }
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!(
            lcd = %self.chain.lcd_url,
            chain_id = %self.chain.chain_id,
            gas_price = %self.chain.gas_price_uusd,
            max_gas_price = %self.chain.max_gas_price_uusd,
            "Chain settings"
        );
        for (name, address) in self.contracts.entries() {
            info!(contract = name, address = address, "Contract address");
        }
        info!(
            interval_secs = self.monitor.interval_secs,
            max_concurrent = self.monitor.max_concurrent,
            dry_run = self.monitor.dry_run,
            wallets = self.wallets.len(),
            "Monitor settings"
        );
        for wallet in &self.wallets {
            info!(
                wallet = %wallet.address,
                target_ltv = %wallet.target_ltv,
                trigger_ltv = %wallet.trigger_ltv,
                borrow_ltv = ?wallet.borrow_ltv,
                repay_from_earn = wallet.repay_from_earn,
                "Wallet policy"
            );
        }
    }
}

impl WalletPolicy {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_address(&self.address) {
            bail!("Invalid wallet address: '{}'", self.address);
        }

        let hundred = Decimal::ONE_HUNDRED;
        let in_range = |v: Decimal| v > Decimal::ZERO && v < hundred;
        if !in_range(self.target_ltv) || !in_range(self.trigger_ltv) {
            bail!("{}: LTV thresholds must be between 0 and 100", self.address);
        }
        if self.trigger_ltv <= self.target_ltv {
            bail!(
                "{}: trigger_ltv ({}) must exceed target_ltv ({})",
                self.address,
                self.trigger_ltv,
                self.target_ltv
            );
        }
        if let Some(borrow_ltv) = self.borrow_ltv {
            if borrow_ltv < Decimal::ZERO || borrow_ltv >= self.target_ltv {
                bail!(
                    "{}: borrow_ltv ({}) must be below target_ltv ({})",
                    self.address,
                    borrow_ltv,
                    self.target_ltv
                );
            }
        }
        Ok(())
    }
}

/// Replace every `${VAR}` with the variable's value. Unset variables are
/// left as written so validation can report them.
fn expand_env(input: &str) -> String {
    env_ref_regex()
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn env_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env pattern is valid"))
}

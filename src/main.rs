//! Anchor position keeper
//!
//! Watches Anchor borrowers on Terra and keeps each configured wallet
//! inside its LTV band.
//! Features:
//! - Same-height position snapshots read over the LCD REST API
//! - Repay/borrow decisions against per-wallet target, trigger and borrow LTVs
//! - Earn and borrow APY reporting
//! - Optional contract address discovery from on-chain `config` queries

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keeper_api::{AnchorApiClient, HttpStatsProvider, MantleClient};
use keeper_chain::{ChainQueryClient, LcdClient, TxBuilder};
use keeper_core::{ContractAddresses, KeeperConfig, Monitor, PositionReader, RateService};

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,keeper_core=debug,keeper_chain=debug")),
        )
        .init();

    // CONFIG_PATH selects the file; defaults to config/keeper.toml
    let config = KeeperConfig::load().context("Failed to load keeper configuration")?;
    config.log_config();

    info!("Starting Anchor keeper");
    info!(chain_id = %config.chain.chain_id, "Chain: Terra");

    let client: Arc<dyn ChainQueryClient> = Arc::new(
        LcdClient::with_timeout(&config.chain.lcd_url, config.chain.request_timeout())
            .context("Failed to create LCD client")?,
    );

    let height = client
        .block_height()
        .await
        .map_err(|e| anyhow::anyhow!("LCD health check failed: {}", e))?;
    info!(lcd = %config.chain.lcd_url, height = height, "LCD reachable");

    let contracts = Arc::new(resolve_contracts(&config, client.as_ref()).await?);

    let stats = Arc::new(HttpStatsProvider::new(
        AnchorApiClient::with_base_url(&config.protocol.stats_api_url)?,
        MantleClient::new(&config.protocol.mantle_endpoint)?,
    ));
    let rates = RateService::new(
        client.clone(),
        stats,
        contracts.clone(),
        config.protocol.blocks_per_year,
    );

    match rates.market_rates().await {
        Ok(r) => info!(earn_apy = %r.earn_apy, borrow_apy = %r.borrow_apy, "Market rates"),
        Err(e) => warn!(error = %e, "Market rates unavailable"),
    }

    if config.wallets.is_empty() {
        warn!("No wallets configured, nothing to monitor");
        return Ok(());
    }

    // Signing happens outside this process; without a signer the monitor
    // only reports what it would do.
    if !config.monitor.dry_run {
        warn!("No wallet signer available, running in watch-only mode");
    }

    let reader = PositionReader::new(client.clone(), contracts.clone());
    let builder = TxBuilder::new(contracts.market.clone(), contracts.aterra.clone());
    let monitor = Monitor::new(
        reader,
        builder,
        config.wallets.clone(),
        config.monitor.clone(),
    )
    .with_rates(rates);

    tokio::select! {
        _ = monitor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping");
        }
    }

    Ok(())
}

/// Configured addresses, refreshed from each discovery source in turn.
async fn resolve_contracts(
    config: &KeeperConfig,
    client: &dyn ChainQueryClient,
) -> Result<ContractAddresses> {
    let mut contracts = config.contracts.clone();
    for source in &config.protocol.discover_from {
        contracts = contracts
            .discover(client, source)
            .await
            .with_context(|| format!("Contract discovery from {} failed", source))?;
    }
    contracts.validate()?;
    Ok(contracts)
}

fn print_banner() {
    println!(r#"
    ╔═╗┌┐┌┌─┐┬ ┬┌─┐┬─┐  ╦╔═┌─┐┌─┐┌─┐┌─┐┬─┐
    ╠═╣││││  ├─┤│ │├┬┘  ╠╩╗├┤ ├┤ ├─┘├┤ ├┬┘
    ╩ ╩┘└┘└─┘┴ ┴└─┘┴└─  ╩ ╩└─┘└─┘┴  └─┘┴└─
    Position Keeper v0.1.0
    "#);
}

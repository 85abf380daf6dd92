//! R2 testnet automation bot
//!
//! Command line entry point. `simulate` drives the full pipeline against the
//! in-memory chain; `balances` reads live balances over JSON-RPC.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use alloy_primitives::utils::format_ether;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use r2_autobot::actions::{format_base_units, ActionKind};
use r2_autobot::config::{Config, NetworkConfig};
use r2_autobot::endpoints;
use r2_autobot::rpc::{JsonRpcConnection, NetworkConnection};
use r2_autobot::scheduler::{AutoPlan, NetworkHandle, WalletScheduler};
use r2_autobot::simulation::{seed_wallets, simulated_network_config, SimulatedBackend, SimulatedNetwork};
use r2_autobot::types::{LiquidityPool, NetworkId, SwapPair, Wallet};
use r2_autobot::wallet::WalletSet;
use r2_autobot::Address;

/// Number of placeholder wallets used by `simulate` when none are configured
const DEFAULT_SIMULATED_WALLETS: u8 = 3;

/// How long shutdown waits for in-flight transactions to resolve
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Metrics port, overrides the configured one
    #[arg(long)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an auto action against the simulated chain
    Simulate {
        /// Network name as configured
        #[arg(short, long, default_value = "Sepolia")]
        network: String,

        #[arg(short, long, value_enum, default_value_t = PlanArg::SwapR2usdUsdc)]
        action: PlanArg,

        /// Iterations per wallet for swap actions
        #[arg(short, long, default_value_t = 3)]
        iterations: u32,

        /// Fixed amount for stake and liquidity actions
        #[arg(long, default_value_t = 1.0)]
        amount: f64,
    },

    /// Print native and token balances of configured wallets
    Balances {
        #[arg(short, long, default_value = "Sepolia")]
        network: String,

        /// Only this wallet, 1-based
        #[arg(short, long)]
        wallet: Option<usize>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PlanArg {
    SwapR2usdUsdc,
    SwapR2Usdc,
    SwapR2R2usd,
    Stake,
    AddLpR2Usdc,
    AddLpR2R2usd,
    AddLpR2usdSr2usd,
    AddLpUsdcR2usd,
}

impl PlanArg {
    fn into_plan(self, iterations: u32, amount: f64) -> AutoPlan {
        let swap = |pair| AutoPlan::AlternatingSwap { pair, iterations };
        let lp = |pool| AutoPlan::Once(ActionKind::add_liquidity(pool, amount));
        match self {
            PlanArg::SwapR2usdUsdc => swap(SwapPair::R2usdUsdc),
            PlanArg::SwapR2Usdc => swap(SwapPair::R2Usdc),
            PlanArg::SwapR2R2usd => swap(SwapPair::R2R2usd),
            PlanArg::Stake => AutoPlan::Once(ActionKind::stake(amount)),
            PlanArg::AddLpR2Usdc => lp(LiquidityPool::R2Usdc),
            PlanArg::AddLpR2R2usd => lp(LiquidityPool::R2R2usd),
            PlanArg::AddLpR2usdSr2usd => lp(LiquidityPool::R2usdSr2usd),
            PlanArg::AddLpUsdcR2usd => lp(LiquidityPool::UsdcR2usd),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    info!("Starting r2-autobot {}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    if let Some(port) = args.metrics_port {
        config.monitoring.metrics_port = port;
    }
    config.validate().context("Invalid configuration")?;

    match args.command {
        Command::Simulate {
            network,
            action,
            iterations,
            amount,
        } => {
            let plan = action.into_plan(iterations, amount);
            simulate(config, NetworkId::new(network), plan).await
        }
        Command::Balances { network, wallet } => balances(config, NetworkId::new(network), wallet).await,
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "r2_autobot=debug,info"
    } else {
        "r2_autobot=info,warn,error"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        let mut config = Config::default();
        dotenvy::dotenv().ok();
        config.apply_env_overrides()?;
        Ok(config)
    }
}

fn network_config<'a>(config: &'a Config, name: &NetworkId) -> Result<&'a NetworkConfig> {
    match config.network(name) {
        Some(network) => Ok(network),
        None => bail!(
            "Unknown network '{}', configured: {}",
            name,
            config
                .networks
                .iter()
                .map(|n| n.name.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

async fn simulate(config: Config, name: NetworkId, plan: AutoPlan) -> Result<()> {
    let net_config = simulated_network_config(network_config(&config, &name)?.clone());

    let mut wallets = config.wallet_list();
    if wallets.is_empty() {
        warn!("No wallets configured, simulating {} placeholder wallets", DEFAULT_SIMULATED_WALLETS);
        wallets = (1..=DEFAULT_SIMULATED_WALLETS)
            .map(|i| Wallet::new(format!("Wallet {}", i), Address::with_last_byte(i)))
            .collect();
    }

    let chain = Arc::new(SimulatedNetwork::new(Duration::from_millis(
        config.simulation.block_time_ms,
    )));
    seed_wallets(&chain, &net_config, &wallets, &config.simulation);

    let backend = Arc::new(SimulatedBackend::new(chain.clone(), config.trading.max_slippage_bps));
    let scheduler = WalletScheduler::new(
        config.scheduler.clone(),
        &config.trading,
        vec![NetworkHandle::new(net_config, chain.clone())],
        backend,
    );

    if config.monitoring.enable_metrics {
        let port = config.monitoring.metrics_port;
        info!("Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    info!("Running '{}' for {} wallets on {}", plan.name(), wallets.len(), name);
    let mut run = {
        let scheduler = scheduler.clone();
        let name = name.clone();
        tokio::spawn(async move { scheduler.run_plan(&name, plan, &wallets).await })
    };

    tokio::select! {
        joined = &mut run => {
            let summary = joined.context("Run task panicked")??;
            info!(
                started = summary.started,
                skipped = summary.skipped,
                confirmed = summary.confirmed,
                unconfirmed = summary.unconfirmed,
                stopped = summary.stopped,
                "Run finished"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let flagged = scheduler.stop(&name);
            info!("Stop requested for {} wallet runs", flagged);
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut run).await.is_err() {
                warn!("Run did not stop within {}s, aborting", DRAIN_TIMEOUT.as_secs());
                run.abort();
            }
        }
    }

    let stats = scheduler.nonce_stats();
    info!(
        reservations = stats.reservations,
        resyncs = stats.resyncs,
        invalidations = stats.invalidations,
        submitted = chain.submitted().len(),
        "Nonce cache summary"
    );
    if !scheduler.board().is_empty() {
        warn!("Transactions still on the board:\n{}", scheduler.board().render());
    }
    Ok(())
}

async fn balances(config: Config, name: NetworkId, position: Option<usize>) -> Result<()> {
    let net_config = network_config(&config, &name)?;
    let mut wallets = WalletSet::from_config(&config)?;
    let selected: Vec<Wallet> = match position {
        Some(position) => vec![wallets.select(position)?.clone()],
        None => wallets.all().to_vec(),
    };

    let connection = JsonRpcConnection::new(&net_config.rpc_url, &config.rpc)?;
    info!(endpoint = connection.url(), "Reading balances on {}", name);
    for wallet in &selected {
        let native = connection.balance(wallet.address).await?;
        info!(
            "{} ({}): {} ETH",
            wallet.label,
            wallet.short_address(),
            format_ether(native)
        );
        for (token, address) in &net_config.tokens {
            match connection.token_balance(*address, wallet.address).await {
                Ok(balance) => info!("    {}: {}", token, format_base_units(balance, *token)),
                Err(e) => warn!("    {}: unavailable ({})", token, e),
            }
        }
    }
    Ok(())
}

//! Configuration module for the bot
//!
//! This module handles configuration loading from TOML files and environment
//! variables, and provides the structured configuration types the scheduler,
//! the RPC layer and the simulated chain are built from.

use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{NetworkId, SwapPair, Token, Wallet};

/// Environment variable overriding the configured wallet list (comma-separated addresses)
pub const WALLETS_ENV: &str = "R2_WALLETS";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// JSON-RPC client settings
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Wallets cycled by the auto actions
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,

    /// Networks and their contract addresses
    #[serde(default = "default_networks")]
    pub networks: Vec<NetworkConfig>,

    /// Queue and auto-loop timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Slippage and random amount ranges
    #[serde(default)]
    pub trading: TradingConfig,

    /// In-memory chain used by the `simulate` command
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Rate limit per endpoint (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,

    /// Interval between receipt polls while waiting for confirmation
    #[serde(default = "default_receipt_poll_interval")]
    pub receipt_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    /// Optional display label, defaults to "Wallet N"
    #[serde(default)]
    pub label: Option<String>,

    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: NetworkId,

    pub rpc_url: String,

    pub chain_id: u64,

    /// ERC-20 token contracts deployed on this network
    #[serde(default)]
    pub tokens: BTreeMap<Token, Address>,

    #[serde(default)]
    pub contracts: ContractAddresses,
}

/// Protocol contracts; an operation is only available where its contract is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default)]
    pub router: Option<Address>,

    #[serde(default)]
    pub staking: Option<Address>,

    #[serde(default)]
    pub lp_r2usd_sr2usd: Option<Address>,

    #[serde(default)]
    pub lp_usdc_r2usd: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Lower bound of the random delay between auto-loop iterations
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: u64,

    /// Upper bound (exclusive) of the random delay
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// How often a delay wait checks for a stop request
    #[serde(default = "default_cancel_poll_interval")]
    pub cancel_poll_interval_ms: u64,

    /// Bound on waiting for a receipt; 0 waits forever
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Maximum slippage tolerance (basis points)
    #[serde(default = "default_max_slippage")]
    pub max_slippage_bps: u16,

    /// Random amount range per swap pair
    #[serde(default = "default_amount_ranges")]
    pub amount_ranges: BTreeMap<SwapPair, RangeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Time between submission and receipt
    #[serde(default = "default_block_time")]
    pub block_time_ms: u64,

    /// Native balance seeded into every wallet (in ether)
    #[serde(default = "default_native_balance")]
    pub initial_native_balance: f64,

    /// Balance of every token seeded into every wallet (in whole tokens)
    #[serde(default = "default_token_balance")]
    pub initial_token_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_rpc_timeout() -> u64 { 30 }
fn default_rate_limit() -> u32 { 10 }
fn default_receipt_poll_interval() -> u64 { 1_000 }
fn default_min_delay() -> u64 { 30 }
fn default_max_delay() -> u64 { 60 }
fn default_cancel_poll_interval() -> u64 { 100 }
fn default_confirmation_timeout() -> u64 { 300 }
fn default_max_slippage() -> u16 { 100 }
fn default_block_time() -> u64 { 1_500 }
fn default_native_balance() -> f64 { 1.0 }
fn default_token_balance() -> f64 { 1_000.0 }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

fn default_amount_ranges() -> BTreeMap<SwapPair, RangeConfig> {
    SwapPair::ALL
        .into_iter()
        .map(|pair| (pair, RangeConfig { min: 1.0, max: 5.0 }))
        .collect()
}

fn default_networks() -> Vec<NetworkConfig> {
    ["Sepolia", "Sepolia R2"]
        .into_iter()
        .map(|name| NetworkConfig {
            name: NetworkId::from(name),
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
            chain_id: 11_155_111,
            tokens: BTreeMap::new(),
            contracts: ContractAddresses::default(),
        })
        .collect()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_rpc_timeout(),
            rate_limit_rps: default_rate_limit(),
            receipt_poll_interval_ms: default_receipt_poll_interval(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            cancel_poll_interval_ms: default_cancel_poll_interval(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn delay_window(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.min_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }

    pub fn cancel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        (self.confirmation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.confirmation_timeout_secs))
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            max_slippage_bps: default_max_slippage(),
            amount_ranges: default_amount_ranges(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            block_time_ms: default_block_time(),
            initial_native_balance: default_native_balance(),
            initial_token_balance: default_token_balance(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            wallets: Vec::new(),
            networks: default_networks(),
            scheduler: SchedulerConfig::default(),
            trading: TradingConfig::default(),
            simulation: SimulationConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `R2_WALLETS` if set
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(WALLETS_ENV) {
            self.wallets = parse_wallet_list(&raw)?;
        }
        Ok(())
    }

    pub fn network(&self, name: &NetworkId) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| &n.name == name)
    }

    /// Wallets in configuration order, labelled "Wallet N" when unnamed
    pub fn wallet_list(&self) -> Vec<Wallet> {
        self.wallets
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let label = entry
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("Wallet {}", i + 1));
                Wallet::new(label, entry.address)
            })
            .collect()
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            bail!("at least one network must be configured");
        }

        let mut seen = std::collections::HashSet::new();
        for network in &self.networks {
            if !seen.insert(&network.name) {
                bail!("duplicate network name: {}", network.name);
            }
            if network.rpc_url.trim().is_empty() {
                bail!("network {} has an empty rpc_url", network.name);
            }
        }

        let s = &self.scheduler;
        if s.min_delay_secs >= s.max_delay_secs {
            bail!(
                "scheduler.min_delay_secs ({}) must be below max_delay_secs ({})",
                s.min_delay_secs,
                s.max_delay_secs
            );
        }
        if s.cancel_poll_interval_ms == 0 {
            bail!("scheduler.cancel_poll_interval_ms must be greater than 0");
        }

        if self.trading.max_slippage_bps > 10_000 {
            bail!("trading.max_slippage_bps must be at most 10000");
        }
        for (pair, range) in &self.trading.amount_ranges {
            if !range.min.is_finite() || !range.max.is_finite() || range.min < 0.0 || range.max < range.min {
                return Err(anyhow!(
                    "invalid amount range for {}: min {} max {}",
                    pair,
                    range.min,
                    range.max
                ));
            }
        }

        Ok(())
    }
}

fn parse_wallet_list(raw: &str) -> Result<Vec<WalletEntry>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let address = s
                .parse::<Address>()
                .with_context(|| format!("invalid wallet address in {}: {}", WALLETS_ENV, s))?;
            Ok(WalletEntry {
                label: None,
                address,
            })
        })
        .collect()
}

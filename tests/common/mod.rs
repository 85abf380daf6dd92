//! Shared setup for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use r2_autobot::config::{Config, NetworkConfig, SchedulerConfig};
use r2_autobot::scheduler::{NetworkHandle, WalletScheduler};
use r2_autobot::simulation::{seed_wallets, simulated_network_config, SimulatedBackend, SimulatedNetwork};
use r2_autobot::{Address, NetworkId, Wallet};

pub struct Harness {
    pub scheduler: WalletScheduler,
    pub chain: Arc<SimulatedNetwork>,
    pub network: NetworkId,
    pub config: NetworkConfig,
    pub wallets: Vec<Wallet>,
}

/// No delay between iterations, fast stop polling, no receipt timeout
pub fn quick_settings() -> SchedulerConfig {
    SchedulerConfig {
        min_delay_secs: 0,
        max_delay_secs: 0,
        cancel_poll_interval_ms: 10,
        confirmation_timeout_secs: 0,
    }
}

/// A long delay window so a stop request always lands inside a wait
pub fn slow_settings() -> SchedulerConfig {
    SchedulerConfig {
        min_delay_secs: 30,
        max_delay_secs: 60,
        ..quick_settings()
    }
}

pub fn harness(block_time: Duration, settings: SchedulerConfig, wallet_count: u8) -> Harness {
    let defaults = Config::default();
    let config = simulated_network_config(defaults.networks[0].clone());
    let network = config.name.clone();
    let chain = Arc::new(SimulatedNetwork::new(block_time));

    let wallets: Vec<Wallet> = (1..=wallet_count)
        .map(|i| Wallet::new(format!("Wallet {}", i), Address::repeat_byte(i)))
        .collect();
    seed_wallets(&chain, &config, &wallets, &defaults.simulation);

    let backend = Arc::new(SimulatedBackend::new(chain.clone(), defaults.trading.max_slippage_bps));
    let scheduler = WalletScheduler::new(
        settings,
        &defaults.trading,
        vec![NetworkHandle::new(config.clone(), chain.clone())],
        backend,
    );

    Harness {
        scheduler,
        chain,
        network,
        config,
        wallets,
    }
}

/// Yield until `condition` holds, advancing time in small steps
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    while !condition() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

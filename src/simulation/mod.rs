//! In-memory chain and action backend for dry runs and tests

use alloy_primitives::utils::parse_ether;
use alloy_primitives::{keccak256, Address, U256};

pub mod backend;
pub mod network;

pub use backend::SimulatedBackend;
pub use network::{BalanceChange, SimulatedNetwork, SimulatedTx};

use crate::actions::to_base_units;
use crate::config::{NetworkConfig, SimulationConfig};
use crate::types::{Token, Wallet};

const ALL_TOKENS: [Token; 4] = [Token::R2, Token::Usdc, Token::R2usd, Token::SR2usd];

/// Deterministic stand-in address for an unconfigured token or contract
fn placeholder_address(network: &str, name: &str) -> Address {
    let digest = keccak256(format!("simulated:{}:{}", network, name).as_bytes());
    Address::from_slice(&digest[12..])
}

/// Fill every missing token and contract address with a placeholder so all
/// operations are available against the simulated chain
pub fn simulated_network_config(mut config: NetworkConfig) -> NetworkConfig {
    let name = config.name.to_string();
    for token in ALL_TOKENS {
        config
            .tokens
            .entry(token)
            .or_insert_with(|| placeholder_address(&name, token.symbol()));
    }

    let contracts = &mut config.contracts;
    contracts
        .router
        .get_or_insert_with(|| placeholder_address(&name, "router"));
    contracts
        .staking
        .get_or_insert_with(|| placeholder_address(&name, "staking"));
    contracts
        .lp_r2usd_sr2usd
        .get_or_insert_with(|| placeholder_address(&name, "lp_r2usd_sr2usd"));
    contracts
        .lp_usdc_r2usd
        .get_or_insert_with(|| placeholder_address(&name, "lp_usdc_r2usd"));
    config
}

/// Give every wallet the configured native and token balances
pub fn seed_wallets(
    network: &SimulatedNetwork,
    config: &NetworkConfig,
    wallets: &[Wallet],
    simulation: &SimulationConfig,
) {
    let native = parse_ether(&simulation.initial_native_balance.to_string()).unwrap_or(U256::ZERO);
    for wallet in wallets {
        network.set_balance(wallet.address, native);
        for (token, address) in &config.tokens {
            let amount = to_base_units(simulation.initial_token_balance, *token).unwrap_or(U256::ZERO);
            network.set_token_balance(*address, wallet.address, amount);
        }
    }
}

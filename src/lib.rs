//! R2 testnet automation
//!
//! Swap, stake and liquidity automation for a set of EVM wallets. Every
//! wallet's transactions are pushed through a per-wallet serialized queue
//! with locally tracked nonces, while the auto-action loops drive each
//! wallet with randomized amounts and cancellable delays.
//!
//! The library is organized bottom-up:
//! - [`rpc`]: the narrow node interface and its JSON-RPC implementation
//! - [`nonce_manager`]: cached next-nonce per address
//! - [`actions`]: operation kinds, amounts and the action backend seam
//! - [`scheduler`]: transaction queue, queue board, stop flags and run loops
//! - [`simulation`]: in-memory chain and backend for dry runs and tests

pub mod actions;
pub mod activity_log;
pub mod config;
pub mod endpoints;
pub mod metrics;
pub mod nonce_manager;
pub mod rpc;
pub mod scheduler;
pub mod simulation;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use alloy_primitives::{Address, TxHash, U256};
pub use config::Config;
pub use scheduler::{AutoPlan, RunSummary, WalletScheduler};
pub use types::{NetworkId, SwapPair, Token, Wallet};

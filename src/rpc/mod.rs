//! Network connection layer
//!
//! The pipeline talks to a chain only through [`NetworkConnection`]. The HTTP
//! JSON-RPC implementation lives in [`rpc_client`]; the in-memory chain used for
//! dry runs and tests lives in [`crate::simulation`].

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;

pub mod rpc_client;
pub mod rpc_errors;

pub use rpc_client::JsonRpcConnection;
pub use rpc_errors::{RpcError, RpcResult};

use crate::types::TxReceipt;

/// Primitives the queue and the action backends need from a chain endpoint
#[async_trait]
pub trait NetworkConnection: Send + Sync + std::fmt::Debug {
    /// Number of transactions sent from `address`, including pending ones.
    /// This is the next usable nonce.
    async fn pending_transaction_count(&self, address: Address) -> RpcResult<u64>;

    /// Native balance in wei
    async fn balance(&self, address: Address) -> RpcResult<U256>;

    /// ERC-20 `balanceOf(owner)` in base units
    async fn token_balance(&self, token: Address, owner: Address) -> RpcResult<U256>;

    /// Broadcast a signed transaction
    async fn send_raw_transaction(&self, raw: &[u8]) -> RpcResult<TxHash>;

    /// Wait until the transaction is mined and return its receipt.
    /// Implementations never give up on their own; callers bound the wait.
    async fn wait_for_receipt(&self, hash: TxHash) -> RpcResult<TxReceipt>;
}

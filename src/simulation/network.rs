use alloy_primitives::{keccak256, Address, TxHash, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::trace;

use crate::rpc::{NetworkConnection, RpcError, RpcResult};
use crate::types::TxReceipt;

const ENDPOINT: &str = "simulated";
const GAS_PER_TX: u64 = 21_000;

/// Balance movement applied when a successful transaction is mined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceChange {
    Debit { token: Address, owner: Address, amount: U256 },
    Credit { token: Address, owner: Address, amount: U256 },
}

/// Transaction accepted by the simulated node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTx {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub to: Option<Address>,
    /// Receipt status the transaction will be mined with
    pub success: bool,
}

#[derive(Debug)]
struct PendingTx {
    from: Address,
    success: bool,
    effects: Vec<BalanceChange>,
}

#[derive(Debug, Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    pending: HashMap<TxHash, PendingTx>,
    mined: HashMap<TxHash, TxReceipt>,
    submitted: Vec<SimulatedTx>,
    in_flight: HashMap<Address, usize>,
    max_in_flight: HashMap<Address, usize>,
    block_number: u64,
    reject_next: usize,
    fail_submissions: usize,
    fail_pending_queries: usize,
    pending_queries: usize,
}

/// Deterministic in-memory chain
///
/// Nonces are validated strictly: a transaction must carry exactly the
/// sender's pending count. Receipts become available one block time after
/// the wait starts. Reverted transactions still consume their nonce.
#[derive(Debug)]
pub struct SimulatedNetwork {
    block_time: Duration,
    state: Mutex<ChainState>,
}

impl SimulatedNetwork {
    pub fn new(block_time: Duration) -> Self {
        Self {
            block_time,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Raw transaction format understood by this node: sender, big-endian
    /// nonce and an optional recipient.
    pub fn encode_transaction(from: Address, nonce: u64, to: Option<Address>) -> Vec<u8> {
        let mut raw = Vec::with_capacity(48);
        raw.extend_from_slice(from.as_slice());
        raw.extend_from_slice(&nonce.to_be_bytes());
        if let Some(to) = to {
            raw.extend_from_slice(to.as_slice());
        }
        raw
    }

    fn decode_transaction(raw: &[u8]) -> RpcResult<(Address, u64, Option<Address>)> {
        if raw.len() != 28 && raw.len() != 48 {
            return Err(RpcError::RpcResponse {
                endpoint: ENDPOINT.to_string(),
                code: -32602,
                message: format!("invalid transaction length {}", raw.len()),
            });
        }
        let from = Address::from_slice(&raw[..20]);
        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&raw[20..28]);
        let to = (raw.len() == 48).then(|| Address::from_slice(&raw[28..48]));
        Ok((from, u64::from_be_bytes(nonce_bytes), to))
    }

    pub fn set_pending_count(&self, address: Address, count: u64) {
        self.state.lock().nonces.insert(address, count);
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.state.lock().native.insert(address, wei);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.lock().tokens.insert((token, owner), amount);
    }

    pub fn token_balance_of(&self, token: Address, owner: Address) -> U256 {
        self.state
            .lock()
            .tokens
            .get(&(token, owner))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Mine the next `count` accepted transactions with failure status
    pub fn reject_next(&self, count: usize) {
        self.state.lock().reject_next += count;
    }

    /// Refuse the next `count` submissions before they reach the mempool
    pub fn fail_next_submissions(&self, count: usize) {
        self.state.lock().fail_submissions += count;
    }

    /// Fail the next `count` pending-count queries
    pub fn fail_next_pending_queries(&self, count: usize) {
        self.state.lock().fail_pending_queries += count;
    }

    /// Balance changes applied if `hash` is mined successfully
    pub fn attach_effects(&self, hash: TxHash, effects: Vec<BalanceChange>) {
        if let Some(pending) = self.state.lock().pending.get_mut(&hash) {
            pending.effects.extend(effects);
        }
    }

    /// Number of `pending_transaction_count` calls served
    pub fn pending_count_queries(&self) -> usize {
        self.state.lock().pending_queries
    }

    /// Accepted transactions in submission order
    pub fn submitted(&self) -> Vec<SimulatedTx> {
        self.state.lock().submitted.clone()
    }

    pub fn submitted_by(&self, from: Address) -> Vec<SimulatedTx> {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|tx| tx.from == from)
            .cloned()
            .collect()
    }

    /// Highest number of unconfirmed transactions `address` ever had at once
    pub fn max_in_flight(&self, address: Address) -> usize {
        self.state
            .lock()
            .max_in_flight
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    fn mine(&self, hash: TxHash) -> RpcResult<TxReceipt> {
        let mut state = self.state.lock();
        if let Some(receipt) = state.mined.get(&hash) {
            return Ok(receipt.clone());
        }
        let pending = state
            .pending
            .remove(&hash)
            .ok_or_else(|| RpcError::TransactionNotFound(hash.to_string()))?;

        if pending.success {
            for change in &pending.effects {
                match change {
                    BalanceChange::Debit { token, owner, amount } => {
                        let balance = state.tokens.entry((*token, *owner)).or_default();
                        *balance = balance.saturating_sub(*amount);
                    }
                    BalanceChange::Credit { token, owner, amount } => {
                        let balance = state.tokens.entry((*token, *owner)).or_default();
                        *balance = balance.saturating_add(*amount);
                    }
                }
            }
        }

        if let Some(count) = state.in_flight.get_mut(&pending.from) {
            *count = count.saturating_sub(1);
        }

        state.block_number += 1;
        let receipt = TxReceipt {
            transaction_hash: hash,
            status: pending.success,
            block_number: state.block_number,
            gas_used: GAS_PER_TX,
        };
        state.mined.insert(hash, receipt.clone());
        trace!(%hash, status = pending.success, "Simulated transaction mined");
        Ok(receipt)
    }
}

#[async_trait]
impl NetworkConnection for SimulatedNetwork {
    async fn pending_transaction_count(&self, address: Address) -> RpcResult<u64> {
        let mut state = self.state.lock();
        if state.fail_pending_queries > 0 {
            state.fail_pending_queries -= 1;
            return Err(RpcError::Transport {
                endpoint: ENDPOINT.to_string(),
                message: "injected pending-count failure".to_string(),
            });
        }
        state.pending_queries += 1;
        Ok(state.nonces.get(&address).copied().unwrap_or(0))
    }

    async fn balance(&self, address: Address) -> RpcResult<U256> {
        Ok(self
            .state
            .lock()
            .native
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> RpcResult<U256> {
        Ok(self.token_balance_of(token, owner))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> RpcResult<TxHash> {
        let (from, nonce, to) = Self::decode_transaction(raw)?;

        let mut state = self.state.lock();
        if state.fail_submissions > 0 {
            state.fail_submissions -= 1;
            return Err(RpcError::Transport {
                endpoint: ENDPOINT.to_string(),
                message: "injected submission failure".to_string(),
            });
        }

        let expected = state.nonces.get(&from).copied().unwrap_or(0);
        if nonce != expected {
            let message = if nonce < expected {
                "nonce too low"
            } else {
                "nonce too high"
            };
            return Err(RpcError::RpcResponse {
                endpoint: ENDPOINT.to_string(),
                code: -32000,
                message: format!("{}: expected {}, got {}", message, expected, nonce),
            });
        }
        state.nonces.insert(from, expected + 1);

        let mut preimage = raw.to_vec();
        preimage.extend_from_slice(&(state.submitted.len() as u64).to_be_bytes());
        let hash = keccak256(&preimage);

        let success = if state.reject_next > 0 {
            state.reject_next -= 1;
            false
        } else {
            true
        };

        let in_flight = {
            let count = state.in_flight.entry(from).or_insert(0);
            *count += 1;
            *count
        };
        let max = state.max_in_flight.entry(from).or_insert(0);
        *max = (*max).max(in_flight);

        state.pending.insert(
            hash,
            PendingTx {
                from,
                success,
                effects: Vec::new(),
            },
        );
        state.submitted.push(SimulatedTx {
            hash,
            from,
            nonce,
            to,
            success,
        });
        trace!(%from, nonce, %hash, "Simulated transaction accepted");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> RpcResult<TxReceipt> {
        {
            let state = self.state.lock();
            if let Some(receipt) = state.mined.get(&hash) {
                return Ok(receipt.clone());
            }
            if !state.pending.contains_key(&hash) {
                return Err(RpcError::TransactionNotFound(hash.to_string()));
            }
        }
        tokio::time::sleep(self.block_time).await;
        self.mine(hash)
    }
}

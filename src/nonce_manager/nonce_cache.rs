use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::metrics::metrics;
use crate::rpc::{NetworkConnection, RpcResult};
use crate::types::NetworkId;

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonceStats {
    /// Reservations that had to ask the network for the pending count
    pub resyncs: u64,
    /// Entries reset after a failed transaction
    pub invalidations: u64,
    /// Total nonces handed out
    pub reservations: u64,
}

/// Locally cached next nonce per wallet and network
///
/// A missing entry means "unset": the next reservation refreshes it from the
/// network's pending transaction count. The same address has an unrelated
/// nonce sequence on every chain.
#[derive(Debug, Default)]
pub struct NonceCache {
    entries: DashMap<(NetworkId, Address), u64>,
    resyncs: AtomicU64,
    invalidations: AtomicU64,
    reservations: AtomicU64,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next nonce for `address` on `network` and advance the cache
    ///
    /// `connection` must talk to `network`; it is only queried when the entry
    /// is unset.
    pub async fn reserve(
        &self,
        network: &NetworkId,
        address: Address,
        connection: &dyn NetworkConnection,
    ) -> RpcResult<u64> {
        let key = (network.clone(), address);
        let cached = self.entries.get(&key).map(|entry| *entry);
        let nonce = match cached {
            Some(nonce) => nonce,
            None => {
                let nonce = connection.pending_transaction_count(address).await?;
                self.resyncs.fetch_add(1, Ordering::Relaxed);
                metrics().nonce_resyncs.inc();
                debug!(%network, %address, nonce, "Nonce cache refreshed from pending count");
                nonce
            }
        };

        self.entries.insert(key, nonce + 1);
        self.reservations.fetch_add(1, Ordering::Relaxed);
        Ok(nonce)
    }

    /// Reset to unset so the next reservation resynchronises
    pub fn invalidate(&self, network: &NetworkId, address: Address) {
        if self.entries.remove(&(network.clone(), address)).is_some() {
            debug!(%network, %address, "Nonce cache invalidated");
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        metrics().nonce_invalidations.inc();
    }

    /// Next nonce that would be handed out without a resync
    pub fn peek(&self, network: &NetworkId, address: &Address) -> Option<u64> {
        self.entries
            .get(&(network.clone(), *address))
            .map(|entry| *entry)
    }

    pub fn stats(&self) -> NonceStats {
        NonceStats {
            resyncs: self.resyncs.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            reservations: self.reservations.load(Ordering::Relaxed),
        }
    }
}

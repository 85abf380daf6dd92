//! Wallet management module

use anyhow::{bail, Result};

use crate::config::Config;
use crate::types::Wallet;

/// Ordered wallet pool with a current selection
///
/// Wallets are created at startup from configuration and never removed.
#[derive(Debug, Clone)]
pub struct WalletSet {
    wallets: Vec<Wallet>,
    current: usize,
}

impl WalletSet {
    pub fn new(wallets: Vec<Wallet>) -> Result<Self> {
        if wallets.is_empty() {
            bail!("no wallets configured");
        }
        Ok(Self { wallets, current: 0 })
    }

    /// Build from the configured wallet list
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.wallet_list())
    }

    pub fn all(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn current(&self) -> &Wallet {
        &self.wallets[self.current]
    }

    /// Zero-based index of the current wallet
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Select by 1-based position, as typed by the operator
    pub fn select(&mut self, position: usize) -> Result<&Wallet> {
        if position == 0 || position > self.wallets.len() {
            bail!(
                "invalid wallet number {}, expected 1..={}",
                position,
                self.wallets.len()
            );
        }
        self.current = position - 1;
        Ok(self.current())
    }

    /// Move to the next wallet; stays on the last one
    pub fn next(&mut self) -> &Wallet {
        if self.current + 1 < self.wallets.len() {
            self.current += 1;
        }
        self.current()
    }

    /// Move to the previous wallet; stays on the first one
    pub fn previous(&mut self) -> &Wallet {
        self.current = self.current.saturating_sub(1);
        self.current()
    }
}

use std::time::Duration;
use thiserror::Error;

use crate::actions::ActionError;
use crate::rpc::RpcError;
use crate::types::NetworkId;

/// Errors returned to the caller before a job reaches a wallet queue
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulerError {
    /// Network is not registered with the scheduler
    #[error("Unknown network: {0}")]
    UnknownNetwork(NetworkId),

    /// Wallet worker stopped accepting jobs
    #[error("Transaction queue for wallet {0} is closed")]
    QueueClosed(String),

    /// Wallet already runs an auto or manual action on this network
    #[error("Wallet {wallet} already has a running action on {network}")]
    WalletBusy { network: NetworkId, wallet: String },

    /// Rejected operator input (amounts, iteration counts)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Why a queued transaction did not reach a successful receipt
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Nonce could not be read from the network
    #[error("nonce refresh failed: {0}")]
    Nonce(#[source] RpcError),

    /// Action refused or failed to submit
    #[error(transparent)]
    Action(#[from] ActionError),

    /// Action panicked while building the transaction
    #[error("action panicked")]
    Panicked,

    /// Receipt could not be fetched
    #[error("receipt wait failed: {0}")]
    Receipt(#[source] RpcError),

    /// No receipt within the configured bound
    #[error("no receipt after {}s", .0.as_secs())]
    ConfirmationTimeout(Duration),
}

impl SchedulerError {
    /// Errors that describe the caller's input rather than scheduler state
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::UnknownNetwork(_) | SchedulerError::InvalidInput(_)
        )
    }
}

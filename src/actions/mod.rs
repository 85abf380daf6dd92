//! Transaction actions
//!
//! An action builds and broadcasts exactly one transaction with the nonce the
//! queue reserved for it. The queue owns everything around that call: nonce
//! reservation, receipt wait and classification.
//!
//! Operations are described by [`ActionKind`]; an [`ActionBackend`] knows how to
//! turn a kind into a signed transaction for a given network. [`BoundAction`]
//! pairs the two into something the queue can run.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod amounts;
pub mod slippage;

pub use amounts::{format_base_units, to_base_units, AmountRanges};
pub use slippage::min_amount_out;

use crate::config::NetworkConfig;
use crate::rpc::{NetworkConnection, RpcError};
use crate::types::{LiquidityPool, NetworkId, SubmittedTx, SwapLeg, Token, Wallet};

/// Errors raised while building or submitting a transaction
#[derive(Debug, Error)]
pub enum ActionError {
    /// Wallet holds less than the action needs
    #[error("Insufficient {token} balance: {available} {token}")]
    InsufficientBalance { token: Token, available: String },

    /// Token has no configured address on the network
    #[error("{token} is not available on {network}")]
    MissingToken { token: Token, network: NetworkId },

    /// Contract needed by the operation is not configured on the network
    #[error("{contract} contract is not configured on {network}")]
    MissingContract {
        contract: &'static str,
        network: NetworkId,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Signing or encoding failure inside a backend
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Everything an action needs for one submission
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    /// Nonce reserved by the queue; must be used as-is
    pub nonce: u64,
    pub wallet: &'a Wallet,
    pub connection: &'a dyn NetworkConnection,
    pub network: &'a NetworkConfig,
}

impl ActionContext<'_> {
    pub fn token_address(&self, token: Token) -> Result<Address, ActionError> {
        self.network
            .tokens
            .get(&token)
            .copied()
            .ok_or_else(|| ActionError::MissingToken {
                token,
                network: self.network.name.clone(),
            })
    }

    pub fn contract(
        &self,
        contract: &'static str,
        address: Option<Address>,
    ) -> Result<Address, ActionError> {
        address.ok_or_else(|| ActionError::MissingContract {
            contract,
            network: self.network.name.clone(),
        })
    }

    /// Fail unless the wallet holds at least `amount` base units of `token`
    pub async fn require_token_balance(&self, token: Token, amount: U256) -> Result<(), ActionError> {
        let token_address = self.token_address(token)?;
        let balance = self
            .connection
            .token_balance(token_address, self.wallet.address)
            .await?;
        if balance < amount {
            return Err(ActionError::InsufficientBalance {
                token,
                available: format_base_units(balance, token),
            });
        }
        Ok(())
    }
}

/// A unit of work the queue can run
#[async_trait]
pub trait TransactionAction: Send + Sync {
    /// Build, sign and broadcast one transaction using `ctx.nonce`
    async fn submit(&self, ctx: ActionContext<'_>) -> Result<SubmittedTx, ActionError>;
}

/// Operations the bot performs, with their parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Router swap of `amount` of `leg.from` into `leg.to`
    Swap { leg: SwapLeg, amount: f64 },

    /// Deposit into a liquidity pool, amounts in pool token order
    AddLiquidity {
        pool: LiquidityPool,
        amount_a: f64,
        amount_b: f64,
    },

    /// Stake R2USD for sR2USD
    Stake { amount: f64 },
}

impl ActionKind {
    pub fn swap(leg: SwapLeg, amount: f64) -> Self {
        ActionKind::Swap { leg, amount }
    }

    /// Two-sided deposit with the same amount on both sides
    pub fn add_liquidity(pool: LiquidityPool, amount: f64) -> Self {
        ActionKind::AddLiquidity {
            pool,
            amount_a: amount,
            amount_b: amount,
        }
    }

    pub fn stake(amount: f64) -> Self {
        ActionKind::Stake { amount }
    }

    /// Queue board description
    pub fn describe(&self) -> String {
        match self {
            ActionKind::Swap { leg, amount } => {
                format!("Swap {:.6} {} to {}", amount, leg.from, leg.to)
            }
            ActionKind::AddLiquidity {
                pool,
                amount_a,
                amount_b,
            } => {
                if amount_a == amount_b {
                    format!("Add LP {} {}", pool, amount_a)
                } else {
                    let [a, b] = pool.tokens();
                    format!("Add LP {} {} + {} {}", amount_a, a, amount_b, b)
                }
            }
            ActionKind::Stake { amount } => format!("Stake {} R2USD to sR2USD", amount),
        }
    }

    /// Amounts must be finite and strictly positive
    pub fn validate(&self) -> Result<(), ActionError> {
        let amounts = match self {
            ActionKind::Swap { amount, .. } | ActionKind::Stake { amount } => vec![*amount],
            ActionKind::AddLiquidity {
                amount_a, amount_b, ..
            } => vec![*amount_a, *amount_b],
        };
        for amount in amounts {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ActionError::InvalidAmount(format!(
                    "amount must be greater than 0, got {}",
                    amount
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Builds and broadcasts the transaction for an [`ActionKind`]
///
/// Implementations check their own preconditions (balances, configured
/// contracts) and return an error instead of broadcasting a transaction that
/// would revert.
#[async_trait]
pub trait ActionBackend: Send + Sync {
    async fn execute(
        &self,
        kind: &ActionKind,
        ctx: ActionContext<'_>,
    ) -> Result<SubmittedTx, ActionError>;
}

/// An [`ActionKind`] bound to the backend that executes it
pub struct BoundAction {
    backend: Arc<dyn ActionBackend>,
    kind: ActionKind,
}

impl BoundAction {
    pub fn new(backend: Arc<dyn ActionBackend>, kind: ActionKind) -> Self {
        Self { backend, kind }
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }
}

#[async_trait]
impl TransactionAction for BoundAction {
    async fn submit(&self, ctx: ActionContext<'_>) -> Result<SubmittedTx, ActionError> {
        self.kind.validate()?;
        self.backend.execute(&self.kind, ctx).await
    }
}

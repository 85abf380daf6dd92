use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::network::{BalanceChange, SimulatedNetwork};
use crate::actions::{min_amount_out, to_base_units, ActionBackend, ActionContext, ActionError, ActionKind};
use crate::types::{LiquidityPool, SubmittedTx, Token};

/// Decimals of the simulated LP tokens
const LP_DECIMALS: u8 = 18;

/// Action backend for [`SimulatedNetwork`]
///
/// Checks balances and configured contracts the way a signing backend would,
/// then submits a simulated transaction whose balance effects apply when it
/// is mined successfully. Swaps fill 1:1 after decimal adjustment.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    network: Arc<SimulatedNetwork>,
    max_slippage_bps: u16,
}

impl SimulatedBackend {
    pub fn new(network: Arc<SimulatedNetwork>, max_slippage_bps: u16) -> Self {
        Self {
            network,
            max_slippage_bps,
        }
    }

    async fn submit(
        &self,
        ctx: &ActionContext<'_>,
        to: Address,
        effects: Vec<BalanceChange>,
    ) -> Result<SubmittedTx, ActionError> {
        let from = ctx.wallet.address;
        let raw = SimulatedNetwork::encode_transaction(from, ctx.nonce, Some(to));
        let hash = ctx.connection.send_raw_transaction(&raw).await?;
        self.network.attach_effects(hash, effects);
        Ok(SubmittedTx {
            hash,
            nonce: ctx.nonce,
            from,
            to: Some(to),
        })
    }

    async fn swap(
        &self,
        ctx: &ActionContext<'_>,
        from: Token,
        to: Token,
        amount: f64,
    ) -> Result<SubmittedTx, ActionError> {
        let router = ctx.contract("router", ctx.network.contracts.router)?;
        let from_token = ctx.token_address(from)?;
        let to_token = ctx.token_address(to)?;

        let amount_in = to_base_units(amount, from)?;
        ctx.require_token_balance(from, amount_in).await?;

        let expected_out = rescale(amount_in, from.decimals(), to.decimals());
        let min_out = min_amount_out(expected_out, self.max_slippage_bps);
        debug!(%amount_in, %expected_out, %min_out, "Simulated swap {} -> {}", from, to);

        let owner = ctx.wallet.address;
        self.submit(
            ctx,
            router,
            vec![
                BalanceChange::Debit {
                    token: from_token,
                    owner,
                    amount: amount_in,
                },
                BalanceChange::Credit {
                    token: to_token,
                    owner,
                    amount: expected_out,
                },
            ],
        )
        .await
    }

    async fn stake(&self, ctx: &ActionContext<'_>, amount: f64) -> Result<SubmittedTx, ActionError> {
        let staking = ctx.contract("staking", ctx.network.contracts.staking)?;
        let r2usd = ctx.token_address(Token::R2usd)?;
        let sr2usd = ctx.token_address(Token::SR2usd)?;

        let amount = to_base_units(amount, Token::R2usd)?;
        ctx.require_token_balance(Token::R2usd, amount).await?;

        let owner = ctx.wallet.address;
        self.submit(
            ctx,
            staking,
            vec![
                BalanceChange::Debit {
                    token: r2usd,
                    owner,
                    amount,
                },
                BalanceChange::Credit {
                    token: sr2usd,
                    owner,
                    amount,
                },
            ],
        )
        .await
    }

    async fn add_liquidity(
        &self,
        ctx: &ActionContext<'_>,
        pool: LiquidityPool,
        amount_a: f64,
        amount_b: f64,
    ) -> Result<SubmittedTx, ActionError> {
        let contracts = &ctx.network.contracts;
        let target = match pool {
            LiquidityPool::R2usdSr2usd => ctx.contract("R2USD/sR2USD LP", contracts.lp_r2usd_sr2usd)?,
            LiquidityPool::UsdcR2usd => ctx.contract("USDC/R2USD LP", contracts.lp_usdc_r2usd)?,
            LiquidityPool::R2Usdc | LiquidityPool::R2R2usd => ctx.contract("router", contracts.router)?,
        };

        let [token_a, token_b] = pool.tokens();
        let address_a = ctx.token_address(token_a)?;
        let address_b = ctx.token_address(token_b)?;
        let base_a = to_base_units(amount_a, token_a)?;
        let base_b = to_base_units(amount_b, token_b)?;
        ctx.require_token_balance(token_a, base_a).await?;
        ctx.require_token_balance(token_b, base_b).await?;

        let expected_lp = rescale(base_a, token_a.decimals(), LP_DECIMALS)
            .saturating_add(rescale(base_b, token_b.decimals(), LP_DECIMALS));
        let min_mint = min_amount_out(expected_lp, self.max_slippage_bps);
        debug!(%expected_lp, %min_mint, "Simulated deposit into {}", pool);

        let owner = ctx.wallet.address;
        self.submit(
            ctx,
            target,
            vec![
                BalanceChange::Debit {
                    token: address_a,
                    owner,
                    amount: base_a,
                },
                BalanceChange::Debit {
                    token: address_b,
                    owner,
                    amount: base_b,
                },
                // LP shares are tracked as a token balance keyed by the pool contract
                BalanceChange::Credit {
                    token: target,
                    owner,
                    amount: expected_lp,
                },
            ],
        )
        .await
    }
}

#[async_trait]
impl ActionBackend for SimulatedBackend {
    async fn execute(
        &self,
        kind: &ActionKind,
        ctx: ActionContext<'_>,
    ) -> Result<SubmittedTx, ActionError> {
        match kind {
            ActionKind::Swap { leg, amount } => self.swap(&ctx, leg.from, leg.to, *amount).await,
            ActionKind::Stake { amount } => self.stake(&ctx, *amount).await,
            ActionKind::AddLiquidity {
                pool,
                amount_a,
                amount_b,
            } => self.add_liquidity(&ctx, *pool, *amount_a, *amount_b).await,
        }
    }
}

/// Convert a base-unit amount between decimal precisions
fn rescale(amount: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    if to_decimals >= from_decimals {
        let factor = U256::from(10u64).pow(U256::from(to_decimals - from_decimals));
        amount.saturating_mul(factor)
    } else {
        let factor = U256::from(10u64).pow(U256::from(from_decimals - to_decimals));
        amount / factor
    }
}

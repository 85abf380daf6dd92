//! Minimum-output bounds

use alloy_primitives::U256;

/// 100% in basis points
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Smallest acceptable output for an `expected` quote under `max_slippage_bps`.
///
/// Used for swap `amountOutMin` and for the minimum LP tokens minted on a
/// deposit. Tolerances above 100% clamp to zero.
pub fn min_amount_out(expected: U256, max_slippage_bps: u16) -> U256 {
    let bps = u64::from(max_slippage_bps).min(BPS_DENOMINATOR);
    let keep = U256::from(BPS_DENOMINATOR - bps);
    expected.saturating_mul(keep) / U256::from(BPS_DENOMINATOR)
}

//! Common types used throughout the pipeline

use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a configured network (e.g. "Sepolia", "Sepolia R2")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NetworkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A key-controlled account the bot submits transactions for
///
/// Keys are held by the signing backend; the pipeline only needs the address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Wallet {
    /// Human label shown on the dashboard ("Wallet 1", ...)
    pub label: String,

    /// Account address, the wallet's identity
    pub address: Address,
}

impl Wallet {
    pub fn new(label: impl Into<String>, address: Address) -> Self {
        Self {
            label: label.into(),
            address,
        }
    }

    /// Shortened address for log lines
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

/// Tokens the bot moves around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Token {
    #[serde(rename = "R2")]
    R2,
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "R2USD")]
    R2usd,
    #[serde(rename = "sR2USD")]
    SR2usd,
}

impl Token {
    /// ERC-20 decimals of the token contract
    pub fn decimals(self) -> u8 {
        match self {
            Token::R2 => 18,
            Token::Usdc | Token::R2usd | Token::SR2usd => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Token::R2 => "R2",
            Token::Usdc => "USDC",
            Token::R2usd => "R2USD",
            Token::SR2usd => "sR2USD",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One direction of a paired swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapLeg {
    pub from: Token,
    pub to: Token,
}

/// Token pairs that are swapped back and forth by the auto loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwapPair {
    #[serde(rename = "SWAP_R2USD_USDC")]
    R2usdUsdc,
    #[serde(rename = "SWAP_R2_USDC")]
    R2Usdc,
    #[serde(rename = "SWAP_R2_R2USD")]
    R2R2usd,
}

impl SwapPair {
    pub const ALL: [SwapPair; 3] = [SwapPair::R2usdUsdc, SwapPair::R2Usdc, SwapPair::R2R2usd];

    /// Leg taken while the pair's direction flag is `true`
    pub fn forward(self) -> SwapLeg {
        match self {
            SwapPair::R2usdUsdc => SwapLeg { from: Token::Usdc, to: Token::R2usd },
            SwapPair::R2Usdc => SwapLeg { from: Token::Usdc, to: Token::R2 },
            SwapPair::R2R2usd => SwapLeg { from: Token::R2, to: Token::R2usd },
        }
    }

    /// Leg taken while the pair's direction flag is `false`
    pub fn reverse(self) -> SwapLeg {
        let leg = self.forward();
        SwapLeg { from: leg.to, to: leg.from }
    }

    pub fn leg(self, direction: bool) -> SwapLeg {
        if direction {
            self.forward()
        } else {
            self.reverse()
        }
    }

    pub fn tokens(self) -> [Token; 2] {
        let leg = self.forward();
        [leg.from, leg.to]
    }

    pub fn key(self) -> &'static str {
        match self {
            SwapPair::R2usdUsdc => "SWAP_R2USD_USDC",
            SwapPair::R2Usdc => "SWAP_R2_USDC",
            SwapPair::R2R2usd => "SWAP_R2_R2USD",
        }
    }
}

impl fmt::Display for SwapPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Liquidity pools the bot deposits into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityPool {
    /// Router pool R2 / USDC
    R2Usdc,
    /// Router pool R2 / R2USD
    R2R2usd,
    /// Stable pool R2USD / sR2USD
    R2usdSr2usd,
    /// Stable pool USDC / R2USD
    UsdcR2usd,
}

impl LiquidityPool {
    /// Tokens deposited, in the order amounts are given
    pub fn tokens(self) -> [Token; 2] {
        match self {
            LiquidityPool::R2Usdc => [Token::R2, Token::Usdc],
            LiquidityPool::R2R2usd => [Token::R2, Token::R2usd],
            LiquidityPool::R2usdSr2usd => [Token::R2usd, Token::SR2usd],
            LiquidityPool::UsdcR2usd => [Token::Usdc, Token::R2usd],
        }
    }

    /// Stable pools are separate LP contracts; the others go through the router
    pub fn is_stable_pool(self) -> bool {
        matches!(self, LiquidityPool::R2usdSr2usd | LiquidityPool::UsdcR2usd)
    }
}

impl fmt::Display for LiquidityPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.tokens();
        write!(f, "{} & {}", a, b)
    }
}

/// Handle returned by an action once its transaction has been broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    pub hash: TxHash,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
}

/// Confirmed on-chain outcome of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    /// `true` when the transaction executed successfully
    pub status: bool,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Successful result of a queued action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed {
    pub receipt: TxReceipt,
    pub hash: TxHash,
    pub transaction: SubmittedTx,
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    if full.len() <= 10 {
        return full;
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// `0x12345678...` form used when logging hashes
pub fn short_hash(hash: &TxHash) -> String {
    let full = hash.to_string();
    format!("{}...", &full[..10.min(full.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address() {
        let addr = Address::repeat_byte(0xab);
        let short = short_address(&addr);
        assert!(short.starts_with("0x"));
        assert!(short.contains("..."));
        assert_eq!(short.len(), 6 + 3 + 4);
    }

    #[test]
    fn test_swap_pair_legs_are_mirrored() {
        for pair in SwapPair::ALL {
            let fwd = pair.forward();
            let rev = pair.reverse();
            assert_eq!(fwd.from, rev.to);
            assert_eq!(fwd.to, rev.from);
            assert_eq!(pair.leg(true), fwd);
            assert_eq!(pair.leg(false), rev);
        }
    }

    #[test]
    fn test_forward_legs() {
        assert_eq!(SwapPair::R2usdUsdc.forward(), SwapLeg { from: Token::Usdc, to: Token::R2usd });
        assert_eq!(SwapPair::R2Usdc.forward(), SwapLeg { from: Token::Usdc, to: Token::R2 });
        assert_eq!(SwapPair::R2R2usd.forward(), SwapLeg { from: Token::R2, to: Token::R2usd });
    }

    #[test]
    fn test_token_decimals() {
        assert_eq!(Token::R2.decimals(), 18);
        assert_eq!(Token::Usdc.decimals(), 6);
        assert_eq!(Token::SR2usd.to_string(), "sR2USD");
    }

    #[test]
    fn test_pool_display() {
        assert_eq!(LiquidityPool::UsdcR2usd.to_string(), "USDC & R2USD");
        assert!(LiquidityPool::R2usdSr2usd.is_stable_pool());
        assert!(!LiquidityPool::R2Usdc.is_stable_pool());
    }
}

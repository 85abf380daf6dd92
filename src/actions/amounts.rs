//! Token amount handling: base-unit conversion and random swap ranges

use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;
use rand::Rng;
use std::collections::BTreeMap;

use super::ActionError;
use crate::config::{RangeConfig, TradingConfig};
use crate::types::{SwapPair, Token};

/// Decimal places kept on sampled and displayed amounts
pub const AMOUNT_DECIMALS: usize = 6;

/// Convert a human amount to the token's base units
pub fn to_base_units(amount: f64, token: Token) -> Result<U256, ActionError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ActionError::InvalidAmount(format!(
            "cannot convert {} {} to base units",
            amount, token
        )));
    }
    let text = format!("{:.*}", AMOUNT_DECIMALS, amount);
    parse_units(&text, token.decimals())
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| ActionError::InvalidAmount(format!("{} {}: {}", text, token, e)))
}

/// Human-readable form of a base-unit amount
pub fn format_base_units(value: U256, token: Token) -> String {
    format_units(value, token.decimals()).unwrap_or_else(|_| value.to_string())
}

/// Round to the precision amounts are submitted with
pub fn round_amount(amount: f64) -> f64 {
    let scale = 10f64.powi(AMOUNT_DECIMALS as i32);
    (amount * scale).round() / scale
}

/// Random amount ranges per swap pair and source token
#[derive(Debug, Clone)]
pub struct AmountRanges {
    ranges: BTreeMap<(SwapPair, Token), RangeConfig>,
}

impl AmountRanges {
    pub fn from_config(config: &TradingConfig) -> Self {
        let mut ranges = BTreeMap::new();
        for (pair, range) in &config.amount_ranges {
            for token in pair.tokens() {
                ranges.insert((*pair, token), *range);
            }
        }
        Self { ranges }
    }

    pub fn range(&self, pair: SwapPair, token: Token) -> Option<RangeConfig> {
        self.ranges.get(&(pair, token)).copied()
    }

    /// Replace the range of both tokens of `pair`
    pub fn set_range(&mut self, pair: SwapPair, min: f64, max: f64) -> Result<(), ActionError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ActionError::InvalidAmount(format!(
                "range bounds must be numbers, got {} and {}",
                min, max
            )));
        }
        if min < 0.0 {
            return Err(ActionError::InvalidAmount(format!(
                "minimum must not be negative, got {}",
                min
            )));
        }
        if max < min {
            return Err(ActionError::InvalidAmount(format!(
                "maximum {} is below minimum {}",
                max, min
            )));
        }

        let range = RangeConfig { min, max };
        for token in pair.tokens() {
            self.ranges.insert((pair, token), range);
        }
        Ok(())
    }

    /// Uniform sample in `[min, max]`, rounded to six decimals
    pub fn sample<R: Rng + ?Sized>(
        &self,
        pair: SwapPair,
        token: Token,
        rng: &mut R,
    ) -> Result<f64, ActionError> {
        let range = self.range(pair, token).ok_or_else(|| {
            ActionError::InvalidAmount(format!("no amount range for {} {}", pair, token))
        })?;
        let value = if range.max > range.min {
            rng.gen_range(range.min..=range.max)
        } else {
            range.min
        };
        Ok(round_amount(value))
    }
}

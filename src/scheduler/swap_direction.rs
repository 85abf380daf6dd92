use dashmap::DashMap;

use crate::types::{NetworkId, SwapPair};

/// Current direction per (network, pair); `true` selects the forward leg
#[derive(Debug, Default)]
pub struct SwapDirections {
    directions: DashMap<(NetworkId, SwapPair), bool>,
}

impl SwapDirections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, network: &NetworkId, pair: SwapPair) -> bool {
        self.directions
            .get(&(network.clone(), pair))
            .map(|d| *d)
            .unwrap_or(true)
    }

    /// Flip only if the direction is still `from`; returns the new direction
    pub fn flip_from(&self, network: &NetworkId, pair: SwapPair, from: bool) -> bool {
        let mut entry = self.directions.entry((network.clone(), pair)).or_insert(true);
        if *entry == from {
            *entry = !from;
        }
        *entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Token;

    #[test]
    fn test_initial_direction_is_forward() {
        let dirs = SwapDirections::new();
        let net = NetworkId::from("Sepolia");
        assert!(dirs.get(&net, SwapPair::R2usdUsdc));
        assert_eq!(SwapPair::R2usdUsdc.leg(dirs.get(&net, SwapPair::R2usdUsdc)).from, Token::Usdc);
    }

    #[test]
    fn test_flip_is_per_network_and_pair() {
        let dirs = SwapDirections::new();
        let sepolia = NetworkId::from("Sepolia");
        let r2 = NetworkId::from("Sepolia R2");

        assert!(!dirs.flip_from(&sepolia, SwapPair::R2Usdc, true));
        assert!(!dirs.get(&sepolia, SwapPair::R2Usdc));
        assert!(dirs.get(&r2, SwapPair::R2Usdc));
        assert!(dirs.get(&sepolia, SwapPair::R2R2usd));

        // stale flip request is ignored
        assert!(!dirs.flip_from(&sepolia, SwapPair::R2Usdc, true));
        assert!(dirs.flip_from(&sepolia, SwapPair::R2Usdc, false));
    }
}

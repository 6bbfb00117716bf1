use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Accounting category of a registry token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    /// Pegged asset, priced at $1.00 (documented approximation).
    Stable,
    /// Market-priced asset.
    Volatile,
    /// Treasury-owned liquidity-pool position (LP/pool tokens).
    ProtocolOwnedLiquidity,
}

/// Static registry entry for a treasury-tracked token.
///
/// Loaded once at startup, immutable thereafter. A token carrying a
/// `price_feed` is a base token: the resolver prices it from the feed
/// directly and recursion through pools terminates on it.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenMeta {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub category: TokenCategory,
    #[serde(default)]
    pub is_liquid: bool,
    #[serde(default)]
    pub is_volatile_bluechip: bool,
    /// Fixed liquid-backing multiplier override, must lie in [0, 1].
    #[serde(default)]
    pub liquid_backing_multiplier: Option<f64>,
    /// Chainlink-style USD aggregator for this token, if one exists.
    #[serde(default)]
    pub price_feed: Option<Address>,
}

impl TokenMeta {
    /// Base tokens have a trusted external USD source and anchor all
    /// pool-ratio-derived rates.
    pub fn is_base_token(&self) -> bool {
        self.price_feed.is_some()
    }
}

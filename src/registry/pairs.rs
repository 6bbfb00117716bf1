use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// The liquidity-venue families the pricing engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// UniswapV2-style x*y=k pair.
    ConstantProduct,
    /// UniswapV3-style pool priced from sqrtPriceX96.
    ConcentratedLiquidity,
    /// Balancer-style pool with normalized weights.
    Weighted,
    /// Curve-style pool of pegged assets.
    StableSwap,
    /// ERC-4626 tokenized vault (shares over a single underlying).
    Erc4626Vault,
}

/// Static description of how to price/value one liquidity venue.
#[derive(Debug, Clone, Deserialize)]
pub struct PairHandler {
    pub kind: PoolKind,
    /// Pool (or vault) contract address. For weighted pools this is the pool
    /// contract; its token balances are fetched from the shared vault.
    pub address: Address,
    /// Balancer pool id, required when `kind` is `Weighted`.
    #[serde(default)]
    pub pool_id: Option<B256>,
    /// Separate LP-token contract for stable-swap pools whose pool contract
    /// is not itself the LP token.
    #[serde(default)]
    pub lp_token: Option<Address>,
}

impl PairHandler {
    /// The address of the transferable pool token for this venue.
    pub fn pool_token(&self) -> Address {
        self.lp_token.unwrap_or(self.address)
    }
}

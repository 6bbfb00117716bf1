//! Block-keyed, memoized pool state.
//!
//! One [`PoolSnapshot`] captures everything the pricing strategies need from
//! a liquidity venue at a block: constituent tokens, decimal-adjusted
//! balances, weights for weighted pools, sqrt-price state for concentrated
//! pools, and the pool token's supply. Each (pool, block) key costs one round
//! of external reads no matter how many call sites ask for it.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use log::debug;
use moka::future::Cache;

use crate::abis::{IBalancerVault, IERC20, IERC4626, IStableSwapPool, IUniswapV2Pair, IUniswapV3Pool, IWeightedPool};
use crate::chain::{read, ChainReader};
use crate::error::{ReadError, ValuationError};
use crate::registry::{PairHandler, PoolKind, Registry};
use crate::utils::{reserves_from_liquidity, u256_to_f64};

/// Immutable capture of a pool's state at one block.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub pool: Address,
    pub block: u64,
    pub tokens: Vec<Address>,
    pub decimals: Vec<u8>,
    /// Decimal-adjusted token balances, index-aligned with `tokens`.
    pub balances: Vec<f64>,
    /// Normalized weights for weighted pools, summing to ~1.0.
    pub weights: Option<Vec<f64>>,
    /// Q64.96 sqrt price for concentrated-liquidity pools.
    pub sqrt_price_x96: Option<U256>,
    pub pool_token: Address,
    pub pool_token_decimals: u8,
    /// Decimal-adjusted pool-token total supply; zero for venues without a
    /// transferable pool token.
    pub pool_token_supply: f64,
}

impl PoolSnapshot {
    pub fn index_of(&self, token: Address) -> Option<usize> {
        self.tokens.iter().position(|t| *t == token)
    }

    pub fn balance_of(&self, token: Address) -> Option<f64> {
        self.index_of(token).map(|i| self.balances[i])
    }

    /// The counterpart token in a two-token pool.
    pub fn other_token(&self, token: Address) -> Option<Address> {
        if self.tokens.len() != 2 {
            return None;
        }
        self.tokens.iter().copied().find(|t| *t != token)
    }
}

/// Memoized (pool, block) snapshot store.
///
/// A `None` entry means "pool not yet deployed at this block"; that outcome
/// is cached too, since re-probing a missing contract every call site would
/// defeat the point.
pub struct PoolSnapshotCache {
    cache: Cache<(Address, u64), Option<Arc<PoolSnapshot>>>,
}

impl PoolSnapshotCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::new(10_000),
        }
    }

    pub async fn get_or_create(
        &self,
        reader: &dyn ChainReader,
        registry: &Registry,
        handler: &PairHandler,
        block: u64,
    ) -> Result<Option<Arc<PoolSnapshot>>, ValuationError> {
        let key = (handler.address, block);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        // Concurrent builders for the same key produce identical snapshots,
        // so a lost race only costs the duplicate reads.
        let snapshot = match build_snapshot(reader, registry, handler, block).await {
            Ok(snapshot) => Some(Arc::new(snapshot)),
            Err(ValuationError::Read(e)) if e.is_not_yet_deployed() => {
                debug!("pool {} not yet deployed at block {block}", handler.address);
                None
            },
            Err(e) => return Err(e),
        };

        self.cache.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }
}

impl Default for PoolSnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn build_snapshot(
    reader: &dyn ChainReader,
    registry: &Registry,
    handler: &PairHandler,
    block: u64,
) -> Result<PoolSnapshot, ValuationError> {
    match handler.kind {
        PoolKind::ConstantProduct => build_constant_product(reader, registry, handler, block).await,
        PoolKind::ConcentratedLiquidity => build_concentrated(reader, registry, handler, block).await,
        PoolKind::Weighted => build_weighted(reader, registry, handler, block).await,
        PoolKind::StableSwap => build_stable_swap(reader, registry, handler, block).await,
        PoolKind::Erc4626Vault => build_vault(reader, registry, handler, block).await,
    }
}

/// Token decimals, preferring the registry over a chain read.
async fn token_decimals(
    reader: &dyn ChainReader,
    registry: &Registry,
    token: Address,
    block: u64,
) -> Result<u8, ReadError> {
    if let Some(meta) = registry.token(token) {
        return Ok(meta.decimals);
    }
    read(reader, token, IERC20::decimalsCall {}, block).await
}

async fn build_constant_product(
    reader: &dyn ChainReader,
    registry: &Registry,
    handler: &PairHandler,
    block: u64,
) -> Result<PoolSnapshot, ValuationError> {
    let pool = handler.address;
    let token0 = read(reader, pool, IUniswapV2Pair::token0Call {}, block).await?;
    let token1 = read(reader, pool, IUniswapV2Pair::token1Call {}, block).await?;
    let reserves = read(reader, pool, IUniswapV2Pair::getReservesCall {}, block).await?;

    let decimals0 = token_decimals(reader, registry, token0, block).await?;
    let decimals1 = token_decimals(reader, registry, token1, block).await?;

    let lp_decimals = read(reader, pool, IUniswapV2Pair::decimalsCall {}, block).await?;
    let lp_supply_raw = read(reader, pool, IUniswapV2Pair::totalSupplyCall {}, block).await?;

    Ok(PoolSnapshot {
        pool,
        block,
        tokens: vec![token0, token1],
        decimals: vec![decimals0, decimals1],
        balances: vec![
            u256_to_f64(U256::from(reserves.reserve0), decimals0).unwrap_or(0.0),
            u256_to_f64(U256::from(reserves.reserve1), decimals1).unwrap_or(0.0),
        ],
        weights: None,
        sqrt_price_x96: None,
        pool_token: pool,
        pool_token_decimals: lp_decimals,
        pool_token_supply: u256_to_f64(lp_supply_raw, lp_decimals).unwrap_or(0.0),
    })
}

async fn build_concentrated(
    reader: &dyn ChainReader,
    registry: &Registry,
    handler: &PairHandler,
    block: u64,
) -> Result<PoolSnapshot, ValuationError> {
    let pool = handler.address;
    let token0 = read(reader, pool, IUniswapV3Pool::token0Call {}, block).await?;
    let token1 = read(reader, pool, IUniswapV3Pool::token1Call {}, block).await?;
    let slot0 = read(reader, pool, IUniswapV3Pool::slot0Call {}, block).await?;
    let liquidity = read(reader, pool, IUniswapV3Pool::liquidityCall {}, block).await?;

    let decimals0 = token_decimals(reader, registry, token0, block).await?;
    let decimals1 = token_decimals(reader, registry, token1, block).await?;

    let sqrt_price = U256::from(slot0.sqrtPriceX96);
    // Virtual in-range reserves; good enough for snapshot valuation and the
    // deepest-pool selection heuristic.
    let (raw0, raw1) = reserves_from_liquidity(liquidity, sqrt_price).unwrap_or((0.0, 0.0));

    Ok(PoolSnapshot {
        pool,
        block,
        tokens: vec![token0, token1],
        decimals: vec![decimals0, decimals1],
        balances: vec![
            raw0 / 10f64.powi(decimals0 as i32),
            raw1 / 10f64.powi(decimals1 as i32),
        ],
        weights: None,
        sqrt_price_x96: Some(sqrt_price),
        pool_token: pool,
        pool_token_decimals: 0,
        pool_token_supply: 0.0,
    })
}

async fn build_weighted(
    reader: &dyn ChainReader,
    registry: &Registry,
    handler: &PairHandler,
    block: u64,
) -> Result<PoolSnapshot, ValuationError> {
    let pool = handler.address;
    let vault = registry.balancer_vault.ok_or_else(|| {
        ValuationError::Configuration(format!("weighted pool {pool} configured without a balancer_vault"))
    })?;
    let pool_id = handler
        .pool_id
        .ok_or_else(|| ValuationError::Configuration(format!("weighted pool {pool} missing pool_id")))?;

    let pool_tokens = read(reader, vault, IBalancerVault::getPoolTokensCall { poolId: pool_id }, block).await?;
    let weights_raw = read(reader, pool, IWeightedPool::getNormalizedWeightsCall {}, block).await?;
    let lp_decimals = read(reader, pool, IWeightedPool::decimalsCall {}, block).await?;
    let lp_supply_raw = read(reader, pool, IWeightedPool::totalSupplyCall {}, block).await?;

    let mut decimals = Vec::with_capacity(pool_tokens.tokens.len());
    let mut balances = Vec::with_capacity(pool_tokens.tokens.len());
    for (token, raw_balance) in pool_tokens.tokens.iter().zip(&pool_tokens.balances) {
        let token_dec = token_decimals(reader, registry, *token, block).await?;
        decimals.push(token_dec);
        balances.push(u256_to_f64(*raw_balance, token_dec).unwrap_or(0.0));
    }

    // Normalized weights are 18-decimal fixed point summing to 1e18.
    let weights: Vec<f64> = weights_raw
        .iter()
        .map(|w| u256_to_f64(*w, 18).unwrap_or(0.0))
        .collect();

    Ok(PoolSnapshot {
        pool,
        block,
        tokens: pool_tokens.tokens,
        decimals,
        balances,
        weights: Some(weights),
        sqrt_price_x96: None,
        pool_token: pool,
        pool_token_decimals: lp_decimals,
        pool_token_supply: u256_to_f64(lp_supply_raw, lp_decimals).unwrap_or(0.0),
    })
}

async fn build_stable_swap(
    reader: &dyn ChainReader,
    registry: &Registry,
    handler: &PairHandler,
    block: u64,
) -> Result<PoolSnapshot, ValuationError> {
    let pool = handler.address;

    // Curve pools expose no token count; probe coins(i) until it reverts.
    // The first coin reverting means the pool itself is not deployed, which
    // the caller treats as NotYetDeployed.
    let mut tokens = Vec::new();
    let mut decimals = Vec::new();
    let mut balances = Vec::new();
    for i in 0..8u8 {
        let index = U256::from(i);
        let coin = match read(reader, pool, IStableSwapPool::coinsCall { i: index }, block).await {
            Ok(coin) => coin,
            Err(e) if e.is_not_yet_deployed() && i > 0 => break,
            Err(e) => return Err(e.into()),
        };
        let raw_balance = read(reader, pool, IStableSwapPool::balancesCall { i: index }, block).await?;
        let token_dec = token_decimals(reader, registry, coin, block).await?;
        tokens.push(coin);
        decimals.push(token_dec);
        balances.push(u256_to_f64(raw_balance, token_dec).unwrap_or(0.0));
    }

    let lp_token = handler.pool_token();
    let lp_decimals = read(reader, lp_token, IERC20::decimalsCall {}, block).await?;
    let lp_supply_raw = read(reader, lp_token, IERC20::totalSupplyCall {}, block).await?;

    Ok(PoolSnapshot {
        pool,
        block,
        tokens,
        decimals,
        balances,
        weights: None,
        sqrt_price_x96: None,
        pool_token: lp_token,
        pool_token_decimals: lp_decimals,
        pool_token_supply: u256_to_f64(lp_supply_raw, lp_decimals).unwrap_or(0.0),
    })
}

async fn build_vault(
    reader: &dyn ChainReader,
    registry: &Registry,
    handler: &PairHandler,
    block: u64,
) -> Result<PoolSnapshot, ValuationError> {
    let vault = handler.address;
    let underlying = read(reader, vault, IERC4626::assetCall {}, block).await?;
    let share_decimals = read(reader, vault, IERC4626::decimalsCall {}, block).await?;
    let underlying_decimals = token_decimals(reader, registry, underlying, block).await?;

    // Assets backing exactly one share; doubles as the rebase-free exchange
    // rate between share and underlying.
    let one_share = U256::from(10u64).pow(U256::from(share_decimals));
    let assets_raw = read(reader, vault, IERC4626::convertToAssetsCall { shares: one_share }, block).await?;
    let assets_per_share = u256_to_f64(assets_raw, underlying_decimals).unwrap_or(0.0);

    let supply_raw = read(reader, vault, IERC20::totalSupplyCall {}, block).await?;

    Ok(PoolSnapshot {
        pool: vault,
        block,
        tokens: vec![underlying],
        decimals: vec![underlying_decimals],
        balances: vec![assets_per_share],
        weights: None,
        sqrt_price_x96: None,
        pool_token: vault,
        pool_token_decimals: share_decimals,
        pool_token_supply: u256_to_f64(supply_raw, share_decimals).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use alloy::primitives::address;
    use alloy::primitives::aliases::{I24, U112, U160};
    use alloy::sol_types::SolValue;

    use crate::chain::testing::MockReader;
    use crate::registry::{PairEntry, RegistryFile, TokenCategory, TokenMeta};

    const E18: u128 = 1_000_000_000_000_000_000;

    const TOKEN_A: Address = address!("0000000000000000000000000000000000000c01");
    const TOKEN_B: Address = address!("0000000000000000000000000000000000000c02");
    const POOL: Address = address!("0000000000000000000000000000000000000c10");
    const CL_POOL: Address = address!("0000000000000000000000000000000000000c11");
    const CURVE_POOL: Address = address!("0000000000000000000000000000000000000c12");
    const CURVE_LP: Address = address!("0000000000000000000000000000000000000c13");

    fn fixture() -> Registry {
        let meta = |address, symbol: &str| TokenMeta {
            address,
            symbol: symbol.into(),
            decimals: 18,
            category: TokenCategory::Volatile,
            is_liquid: true,
            is_volatile_bluechip: false,
            liquid_backing_multiplier: None,
            price_feed: None,
        };

        Registry::from_file(RegistryFile {
            chain: "mainnet".into(),
            protocol_token: TOKEN_A,
            staked_wrapper: address!("0000000000000000000000000000000000000c20"),
            staking_contract: address!("0000000000000000000000000000000000000c21"),
            wrapped_native: address!("0000000000000000000000000000000000000c22"),
            balancer_vault: None,
            tokens: vec![meta(TOKEN_A, "TOKA"), meta(TOKEN_B, "TOKB")],
            pairs: vec![PairEntry {
                token: TOKEN_B,
                handler: cp(POOL),
            }],
            protocol_pairs: vec![cp(POOL)],
            treasury_wallets: vec![],
            supply_venues: vec![],
        })
        .unwrap()
    }

    fn cp(address: Address) -> PairHandler {
        PairHandler {
            kind: PoolKind::ConstantProduct,
            address,
            pool_id: None,
            lp_token: None,
        }
    }

    fn stub_pair(mock: &mut MockReader) {
        mock.stub(POOL, IUniswapV2Pair::token0Call {}, TOKEN_A.abi_encode());
        mock.stub(POOL, IUniswapV2Pair::token1Call {}, TOKEN_B.abi_encode());
        mock.stub(
            POOL,
            IUniswapV2Pair::getReservesCall {},
            (U112::from(25 * E18), U112::from(400 * E18), 0u32).abi_encode_params(),
        );
        mock.stub(POOL, IUniswapV2Pair::decimalsCall {}, U256::from(18u8).abi_encode());
        mock.stub(
            POOL,
            IUniswapV2Pair::totalSupplyCall {},
            U256::from(100 * E18).abi_encode(),
        );
    }

    #[tokio::test]
    async fn snapshot_is_built_once_per_pool_and_block() {
        let mut mock = MockReader::new(0);
        stub_pair(&mut mock);
        let mock = Arc::new(mock);
        let registry = fixture();
        let cache = PoolSnapshotCache::new();

        let first = cache
            .get_or_create(mock.as_ref(), &registry, &cp(POOL), 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.tokens, vec![TOKEN_A, TOKEN_B]);
        assert_eq!(first.balances, vec![25.0, 400.0]);
        assert_eq!(first.pool_token_supply, 100.0);

        let reads = mock.call_count();
        let second = cache
            .get_or_create(mock.as_ref(), &registry, &cp(POOL), 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mock.call_count(), reads);
        assert_eq!(second.balances, first.balances);

        // A different block is a different key.
        cache
            .get_or_create(mock.as_ref(), &registry, &cp(POOL), 11)
            .await
            .unwrap()
            .unwrap();
        assert!(mock.call_count() > reads);
    }

    #[tokio::test]
    async fn missing_deployment_is_cached_as_absent() {
        let mock = Arc::new(MockReader::new(0));
        let registry = fixture();
        let cache = PoolSnapshotCache::new();

        let miss = cache
            .get_or_create(mock.as_ref(), &registry, &cp(POOL), 10)
            .await
            .unwrap();
        assert!(miss.is_none());

        let reads = mock.call_count();
        let miss = cache
            .get_or_create(mock.as_ref(), &registry, &cp(POOL), 10)
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(mock.call_count(), reads);
    }

    #[tokio::test]
    async fn transport_failure_propagates_instead_of_caching() {
        let mut mock = MockReader::new(0);
        mock.stub_rpc_failure(POOL);
        let registry = fixture();
        let cache = PoolSnapshotCache::new();

        let result = cache
            .get_or_create(&mock, &registry, &cp(POOL), 10)
            .await;
        assert!(matches!(
            result,
            Err(ValuationError::Read(ReadError::Rpc { .. }))
        ));
    }

    #[tokio::test]
    async fn concentrated_snapshot_captures_sqrt_price_and_virtual_reserves() {
        let mut mock = MockReader::new(0);
        mock.stub(CL_POOL, IUniswapV3Pool::token0Call {}, TOKEN_A.abi_encode());
        mock.stub(CL_POOL, IUniswapV3Pool::token1Call {}, TOKEN_B.abi_encode());
        // sqrtPriceX96 = 2^96, price exactly 1.
        let sqrt_price = U160::from(1u8) << 96;
        mock.stub(
            CL_POOL,
            IUniswapV3Pool::slot0Call {},
            (sqrt_price, I24::ZERO, 0u16, 0u16, 0u16, 0u16, false).abi_encode_params(),
        );
        mock.stub(CL_POOL, IUniswapV3Pool::liquidityCall {}, E18.abi_encode());
        let registry = fixture();
        let cache = PoolSnapshotCache::new();

        let handler = PairHandler {
            kind: PoolKind::ConcentratedLiquidity,
            address: CL_POOL,
            pool_id: None,
            lp_token: None,
        };
        let snapshot = cache
            .get_or_create(&mock, &registry, &handler, 10)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.sqrt_price_x96, Some(U256::from(sqrt_price)));
        assert!((snapshot.balances[0] - 1.0).abs() < 1e-9);
        assert!((snapshot.balances[1] - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stable_swap_probe_stops_at_the_first_missing_coin() {
        let mut mock = MockReader::new(0);
        mock.stub(
            CURVE_POOL,
            IStableSwapPool::coinsCall { i: U256::ZERO },
            TOKEN_A.abi_encode(),
        );
        mock.stub(
            CURVE_POOL,
            IStableSwapPool::coinsCall { i: U256::from(1u8) },
            TOKEN_B.abi_encode(),
        );
        mock.stub(
            CURVE_POOL,
            IStableSwapPool::balancesCall { i: U256::ZERO },
            U256::from(1000 * E18).abi_encode(),
        );
        mock.stub(
            CURVE_POOL,
            IStableSwapPool::balancesCall { i: U256::from(1u8) },
            U256::from(2000 * E18).abi_encode(),
        );
        mock.stub(CURVE_LP, IERC20::decimalsCall {}, U256::from(18u8).abi_encode());
        mock.stub(
            CURVE_LP,
            IERC20::totalSupplyCall {},
            U256::from(3000 * E18).abi_encode(),
        );
        let registry = fixture();
        let cache = PoolSnapshotCache::new();

        let handler = PairHandler {
            kind: PoolKind::StableSwap,
            address: CURVE_POOL,
            pool_id: None,
            lp_token: Some(CURVE_LP),
        };
        let snapshot = cache
            .get_or_create(&mock, &registry, &handler, 10)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.tokens, vec![TOKEN_A, TOKEN_B]);
        assert_eq!(snapshot.balances, vec![1000.0, 2000.0]);
        assert_eq!(snapshot.pool_token, CURVE_LP);
        assert_eq!(snapshot.pool_token_supply, 3000.0);
    }
}

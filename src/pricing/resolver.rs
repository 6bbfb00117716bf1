//! Recursive USD price resolution.
//!
//! `resolve` walks the dispatch ladder of pricing sources in trust
//! order: external feed, the protocol asset's deepest pool, the
//! rebasing wrapper's index, the stablecoin peg shortcut, and finally the
//! token's registered liquidity venue. Pool-derived rates recurse one hop
//! into the pool's counterpart token; base tokens terminate the recursion.
//! Every resolved rate is memoized per (token, block).

use std::sync::Arc;

use alloy::primitives::Address;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;

use crate::abis::IStakedToken;
use crate::chain::{feed_usd_rate, read, ChainReader};
use crate::error::ValuationError;
use crate::registry::{PairHandler, Registry};
use crate::snapshot::{PoolSnapshot, PoolSnapshotCache, PriceSnapshotCache};
use crate::utils::{u256_to_f64, NATIVE_ETH_SENTINEL, ZERO_ADDRESS};

use super::strategies::pricer;

/// Base tokens terminate recursion within two hops by registry construction;
/// the guard only catches a misconfigured registry cycle.
const MAX_RESOLUTION_DEPTH: u8 = 4;

pub struct PriceResolver {
    registry: Arc<Registry>,
    reader: Arc<dyn ChainReader>,
    pools: PoolSnapshotCache,
    prices: PriceSnapshotCache,
}

impl PriceResolver {
    pub fn new(registry: Arc<Registry>, reader: Arc<dyn ChainReader>) -> Self {
        Self {
            registry,
            reader,
            pools: PoolSnapshotCache::new(),
            prices: PriceSnapshotCache::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn reader(&self) -> &dyn ChainReader {
        self.reader.as_ref()
    }

    /// USD rate of `token` at `block`.
    pub async fn resolve(&self, token: Address, block: u64) -> Result<f64, ValuationError> {
        self.resolve_at(token, block, 0).await
    }

    /// Depth-tracked resolution used by the pool strategies for the
    /// one-hop recursion into a pool's counterpart token.
    pub(crate) fn resolve_at(
        &self,
        token: Address,
        block: u64,
        depth: u8,
    ) -> BoxFuture<'_, Result<f64, ValuationError>> {
        async move {
            if depth > MAX_RESOLUTION_DEPTH {
                return Err(ValuationError::Configuration(format!(
                    "pricing recursion limit hit resolving {token}; registry pair cycle?"
                )));
            }

            let token = self.normalize_sentinel(token);

            if let Some(rate) = self.prices.get(token, block).await {
                return Ok(rate);
            }

            let rate = self.resolve_uncached(token, block, depth).await?;
            debug!("resolved {token} = {rate} USD at block {block}");
            self.prices.insert(token, block, rate).await;
            Ok(rate)
        }
        .boxed()
    }

    /// Native-asset sentinels price as the wrapped token.
    fn normalize_sentinel(&self, token: Address) -> Address {
        if token == ZERO_ADDRESS || token == NATIVE_ETH_SENTINEL {
            self.registry.wrapped_native
        } else {
            token
        }
    }

    async fn resolve_uncached(
        &self,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError> {
        let meta = self.registry.token(token);

        // Trusted external feed: no recursion.
        if let Some(feed) = meta.and_then(|m| m.price_feed) {
            return feed_usd_rate(self.reader(), feed, block)
                .await
                .map_err(ValuationError::from)?
                .ok_or(ValuationError::PricingUnavailable { token, block });
        }

        // The protocol's own asset: deepest-pool selection.
        if self.registry.is_protocol_token(token) {
            return self.protocol_token_rate(block, depth).await;
        }

        // Rebasing wrapper: protocol rate scaled by the staking index.
        if token == self.registry.staked_wrapper {
            let base = self
                .resolve_at(self.registry.protocol_token, block, depth + 1)
                .await?;
            let index = self.rebase_index(block).await?;
            return Ok(base * index);
        }

        // Peg shortcut for stables without a feed. Known simplification:
        // a de-pegged stable needs a registry feed or multiplier override.
        if self.registry.is_stable(token) {
            return Ok(1.0);
        }

        let handler = self
            .registry
            .pair_handler(token)
            .ok_or(ValuationError::PricingUnavailable { token, block })?;

        pricer(handler.kind)
            .token_rate(self, handler, token, block, depth)
            .await
    }

    /// Rate of the protocol token from its deepest configured pool.
    ///
    /// Depth = total USD value of the non-protocol side, so a thin or
    /// manipulated pool never wins the selection. Pools not yet deployed at
    /// the block simply do not participate.
    async fn protocol_token_rate(&self, block: u64, depth: u8) -> Result<f64, ValuationError> {
        let protocol = self.registry.protocol_token;

        let mut best: Option<(&PairHandler, f64)> = None;
        for handler in &self.registry.protocol_pairs {
            let value = pricer(handler.kind)
                .pool_value(self, handler, block, Some(protocol), depth + 1)
                .await?;
            let Some(value) = value else { continue };

            if best.map(|(_, v)| value > v).unwrap_or(true) {
                best = Some((handler, value));
            }
        }

        let Some((handler, depth_value)) = best else {
            return Err(ValuationError::PricingUnavailable {
                token: protocol,
                block,
            });
        };
        debug!("protocol pair {} selected, counterside value {depth_value}", handler.address);

        pricer(handler.kind)
            .token_rate(self, handler, protocol, block, depth)
            .await
    }

    /// Cumulative rebase index of the staked wrapper (underlying per share).
    async fn rebase_index(&self, block: u64) -> Result<f64, ValuationError> {
        let staking = self.registry.staking_contract;
        let decimals = read(self.reader(), staking, IStakedToken::decimalsCall {}, block).await?;
        let raw = read(self.reader(), staking, IStakedToken::indexCall {}, block).await?;

        u256_to_f64(raw, decimals)
            .filter(|index| *index > 0.0)
            .ok_or_else(|| {
                ValuationError::Configuration(format!(
                    "staking contract {staking} reported an unusable rebase index"
                ))
            })
    }

    /// Memoized snapshot lookup used by the strategies.
    pub(crate) async fn pool_snapshot(
        &self,
        handler: &PairHandler,
        block: u64,
    ) -> Result<Option<Arc<PoolSnapshot>>, ValuationError> {
        self.pools
            .get_or_create(self.reader(), &self.registry, handler, block)
            .await
    }

    /// Total USD value of a pool's reserves; `None` if the pool is not yet
    /// deployed. `exclude` drops one constituent from the sum (used for the
    /// protocol-asset side of treasury-owned liquidity).
    pub async fn pool_value(
        &self,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
    ) -> Result<Option<f64>, ValuationError> {
        pricer(handler.kind)
            .pool_value(self, handler, block, exclude, 0)
            .await
    }

    /// USD rate of one pool/LP token: total pool value over pool-token
    /// supply. Used to value treasury-owned liquidity positions.
    pub async fn pool_token_rate(
        &self,
        handler: &PairHandler,
        block: u64,
    ) -> Result<f64, ValuationError> {
        let token = handler.pool_token();
        if let Some(rate) = self.prices.get(token, block).await {
            return Ok(rate);
        }

        let value = self
            .pool_value(handler, block, None)
            .await?
            .ok_or(ValuationError::PricingUnavailable { token, block })?;

        let snapshot = self
            .pool_snapshot(handler, block)
            .await?
            .ok_or(ValuationError::PricingUnavailable { token, block })?;

        if snapshot.pool_token_supply <= 0.0 {
            return Err(ValuationError::PricingUnavailable { token, block });
        }

        let rate = value / snapshot.pool_token_supply;
        self.prices.insert(token, block, rate).await;
        Ok(rate)
    }
}

//! One pricing strategy per pool kind.
//!
//! The strategies share a trait so the resolver and the orchestrator handle
//! every venue uniformly; [`pricer`] is the single dispatch point, and the
//! exhaustive match keeps a new `PoolKind` from compiling without a pricer.

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::error::ValuationError;
use crate::registry::{PairHandler, PoolKind};
use crate::snapshot::PoolSnapshot;

use super::formulas;
use super::resolver::PriceResolver;

#[async_trait]
pub trait PoolPricer: Send + Sync {
    /// USD rate of a constituent `token` of this venue. The venue must exist
    /// at `block`; a missing pool means the token cannot be priced.
    async fn token_rate(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError>;

    /// Total USD value of the venue's reserves, `None` when the venue is not
    /// yet deployed. `exclude` omits one constituent from the sum.
    async fn pool_value(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
        depth: u8,
    ) -> Result<Option<f64>, ValuationError>;
}

/// Single dispatch point from registry pool kind to pricing strategy.
pub fn pricer(kind: PoolKind) -> &'static dyn PoolPricer {
    match kind {
        PoolKind::ConstantProduct => &ConstantProductPricer,
        PoolKind::ConcentratedLiquidity => &ConcentratedPricer,
        PoolKind::Weighted => &WeightedPricer,
        PoolKind::StableSwap => &StableSwapPricer,
        PoolKind::Erc4626Vault => &VaultPricer,
    }
}

/// Snapshot required for pricing; absence is fatal for a rate request.
async fn required_snapshot(
    cx: &PriceResolver,
    handler: &PairHandler,
    token: Address,
    block: u64,
) -> Result<std::sync::Arc<PoolSnapshot>, ValuationError> {
    cx.pool_snapshot(handler, block)
        .await?
        .ok_or(ValuationError::PricingUnavailable { token, block })
}

/// Reserve-weighted sum of constituent values, shared by the balance-sheet
/// style venues.
async fn sum_reserve_value(
    cx: &PriceResolver,
    snapshot: &PoolSnapshot,
    exclude: Option<Address>,
    block: u64,
    depth: u8,
) -> Result<f64, ValuationError> {
    let mut total = 0.0;
    for (token, balance) in snapshot.tokens.iter().zip(&snapshot.balances) {
        if Some(*token) == exclude {
            continue;
        }
        if *balance <= 0.0 {
            continue;
        }
        let rate = cx.resolve_at(*token, block, depth + 1).await?;
        total += balance * rate;
    }
    Ok(total)
}

pub struct ConstantProductPricer;

#[async_trait]
impl PoolPricer for ConstantProductPricer {
    async fn token_rate(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError> {
        let snapshot = required_snapshot(cx, handler, token, block).await?;
        let other = snapshot.other_token(token).ok_or_else(|| {
            ValuationError::Configuration(format!(
                "token {token} is not a constituent of pair {}",
                handler.address
            ))
        })?;

        let base_rate = cx.resolve_at(other, block, depth + 1).await?;
        let dest_reserve = snapshot.balance_of(token).unwrap_or(0.0);
        let base_reserve = snapshot.balance_of(other).unwrap_or(0.0);

        formulas::constant_product_rate(dest_reserve, base_reserve, base_rate)
            .ok_or(ValuationError::PricingUnavailable { token, block })
    }

    async fn pool_value(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
        depth: u8,
    ) -> Result<Option<f64>, ValuationError> {
        let Some(snapshot) = cx.pool_snapshot(handler, block).await? else {
            return Ok(None);
        };
        Ok(Some(sum_reserve_value(cx, &snapshot, exclude, block, depth).await?))
    }
}

pub struct ConcentratedPricer;

#[async_trait]
impl PoolPricer for ConcentratedPricer {
    async fn token_rate(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError> {
        let snapshot = required_snapshot(cx, handler, token, block).await?;
        let index = snapshot.index_of(token).ok_or_else(|| {
            ValuationError::Configuration(format!(
                "token {token} is not a constituent of pool {}",
                handler.address
            ))
        })?;
        let other = snapshot.other_token(token).ok_or_else(|| {
            ValuationError::Configuration(format!(
                "pool {} does not have two constituents",
                handler.address
            ))
        })?;
        let sqrt_price = snapshot
            .sqrt_price_x96
            .ok_or(ValuationError::PricingUnavailable { token, block })?;

        let base_rate = cx.resolve_at(other, block, depth + 1).await?;

        formulas::concentrated_rate(
            sqrt_price,
            snapshot.decimals[0],
            snapshot.decimals[1],
            index == 0,
            base_rate,
        )
        .ok_or(ValuationError::PricingUnavailable { token, block })
    }

    async fn pool_value(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
        depth: u8,
    ) -> Result<Option<f64>, ValuationError> {
        let Some(snapshot) = cx.pool_snapshot(handler, block).await? else {
            return Ok(None);
        };
        // Virtual in-range reserves stand in for actual balances.
        Ok(Some(sum_reserve_value(cx, &snapshot, exclude, block, depth).await?))
    }
}

pub struct WeightedPricer;

#[async_trait]
impl PoolPricer for WeightedPricer {
    async fn token_rate(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError> {
        let snapshot = required_snapshot(cx, handler, token, block).await?;
        let weights = snapshot.weights.as_ref().ok_or_else(|| {
            ValuationError::Configuration(format!(
                "weighted pool {} snapshot has no weights",
                handler.address
            ))
        })?;
        let dest = snapshot.index_of(token).ok_or_else(|| {
            ValuationError::Configuration(format!(
                "token {token} is not a constituent of pool {}",
                handler.address
            ))
        })?;

        // Anchor on a feed-priced or pegged constituent when the pool has
        // one; otherwise fall back to the first counterpart and let the
        // recursion price it.
        let registry = cx.registry();
        let counterparts = || (0..snapshot.tokens.len()).filter(|i| *i != dest);
        let base = counterparts()
            .find(|i| {
                let t = snapshot.tokens[*i];
                registry.is_base_token(t) || registry.is_stable(t)
            })
            .or_else(|| counterparts().next())
            .ok_or(ValuationError::PricingUnavailable { token, block })?;

        let base_rate = cx.resolve_at(snapshot.tokens[base], block, depth + 1).await?;

        formulas::weighted_rate(
            snapshot.balances[dest],
            weights[dest],
            snapshot.balances[base],
            weights[base],
            base_rate,
        )
        .ok_or(ValuationError::PricingUnavailable { token, block })
    }

    async fn pool_value(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
        depth: u8,
    ) -> Result<Option<f64>, ValuationError> {
        let Some(snapshot) = cx.pool_snapshot(handler, block).await? else {
            return Ok(None);
        };
        Ok(Some(sum_reserve_value(cx, &snapshot, exclude, block, depth).await?))
    }
}

pub struct StableSwapPricer;

#[async_trait]
impl PoolPricer for StableSwapPricer {
    /// Stable pools minimize slippage near parity, so a constituent prices
    /// 1:1 against its counterpart. Documented approximation for pegged
    /// pairs; a drifting pool needs a feed-backed registry entry instead.
    async fn token_rate(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError> {
        let snapshot = required_snapshot(cx, handler, token, block).await?;
        if snapshot.index_of(token).is_none() {
            return Err(ValuationError::Configuration(format!(
                "token {token} is not a constituent of pool {}",
                handler.address
            )));
        }

        let counterpart = snapshot
            .tokens
            .iter()
            .copied()
            .find(|t| *t != token)
            .ok_or(ValuationError::PricingUnavailable { token, block })?;

        cx.resolve_at(counterpart, block, depth + 1).await
    }

    async fn pool_value(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
        depth: u8,
    ) -> Result<Option<f64>, ValuationError> {
        let Some(snapshot) = cx.pool_snapshot(handler, block).await? else {
            return Ok(None);
        };
        Ok(Some(sum_reserve_value(cx, &snapshot, exclude, block, depth).await?))
    }
}

pub struct VaultPricer;

#[async_trait]
impl PoolPricer for VaultPricer {
    /// ERC-4626 share: underlying rate times assets-per-share.
    async fn token_rate(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        token: Address,
        block: u64,
        depth: u8,
    ) -> Result<f64, ValuationError> {
        let snapshot = required_snapshot(cx, handler, token, block).await?;
        let underlying = snapshot.tokens[0];
        let assets_per_share = snapshot.balances[0];
        if assets_per_share <= 0.0 {
            return Err(ValuationError::PricingUnavailable { token, block });
        }

        let underlying_rate = cx.resolve_at(underlying, block, depth + 1).await?;
        Ok(underlying_rate * assets_per_share)
    }

    async fn pool_value(
        &self,
        cx: &PriceResolver,
        handler: &PairHandler,
        block: u64,
        exclude: Option<Address>,
        depth: u8,
    ) -> Result<Option<f64>, ValuationError> {
        let Some(snapshot) = cx.pool_snapshot(handler, block).await? else {
            return Ok(None);
        };
        if exclude == Some(snapshot.tokens[0]) {
            return Ok(Some(0.0));
        }

        let underlying_rate = cx.resolve_at(snapshot.tokens[0], block, depth + 1).await?;
        // Total assets = supply × assets-per-share.
        Ok(Some(snapshot.pool_token_supply * snapshot.balances[0] * underlying_rate))
    }
}

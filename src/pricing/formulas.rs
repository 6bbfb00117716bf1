//! Pure pool-pricing formulas.
//!
//! Each function turns snapshot state plus an already-resolved base-token
//! rate into a destination-token USD rate. Keeping these free of I/O makes
//! the per-pool-type arithmetic testable without a chain.

use alloy::primitives::U256;

use crate::utils::sqrt_price_x96_to_price;

/// Constant-product spot rate.
///
/// `rate(dest) = reserve(base) / reserve(dest) × rate(base)`, both reserves
/// already decimal-adjusted.
pub fn constant_product_rate(dest_reserve: f64, base_reserve: f64, base_rate: f64) -> Option<f64> {
    if dest_reserve <= 0.0 || base_reserve <= 0.0 || base_rate <= 0.0 {
        return None;
    }
    let rate = base_reserve * base_rate / dest_reserve;
    rate.is_finite().then_some(rate)
}

/// Weighted-pool (geometric mean) spot rate.
///
/// `rate(dest) = (reserve(base)/weight(base)) / (reserve(dest)/weight(dest)) × rate(base)`
pub fn weighted_rate(
    dest_reserve: f64,
    dest_weight: f64,
    base_reserve: f64,
    base_weight: f64,
    base_rate: f64,
) -> Option<f64> {
    if dest_reserve <= 0.0
        || dest_weight <= 0.0
        || base_reserve <= 0.0
        || base_weight <= 0.0
        || base_rate <= 0.0
    {
        return None;
    }
    let rate = (base_reserve / base_weight) / (dest_reserve / dest_weight) * base_rate;
    rate.is_finite().then_some(rate)
}

/// Concentrated-liquidity spot rate from the pool's Q64.96 sqrt price.
///
/// The decimal-adjusted pool price is token1-per-token0; orientation decides
/// which side of that ratio the destination token sits on.
pub fn concentrated_rate(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
    dest_is_token0: bool,
    base_rate: f64,
) -> Option<f64> {
    if base_rate <= 0.0 {
        return None;
    }
    let price_1_per_0 = sqrt_price_x96_to_price(sqrt_price_x96, token0_decimals, token1_decimals)?;

    let rate = if dest_is_token0 {
        // base is token1: one token0 buys price_1_per_0 of it
        price_1_per_0 * base_rate
    } else {
        // base is token0: invert the ratio
        base_rate / price_1_per_0
    };
    rate.is_finite().then_some(rate)
}

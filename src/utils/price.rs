//! Concentrated-liquidity price math.
//!
//! Converts a pool's Q64.96 sqrt-price state into a decimal-adjusted spot
//! price and derives the virtual in-range reserves used for pool valuation.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::conversion::big_pow10;

/// 2^96, the Q64.96 fixed-point scaling factor.
const Q96: f64 = 79228162514264337593543950336.0;

/// Spot price (token1 per token0) from `sqrtPriceX96`, adjusted for the two
/// tokens' decimal scales.
///
/// `price = (sqrtPriceX96 / 2^96)^2 × 10^(decimals0 − decimals1)`
///
/// Goes through `BigDecimal` because squaring the raw X96 value overflows
/// `f64` precision for high-price pools. Returns `None` for a zero sqrt
/// price (uninitialized pool) or a result outside finite `f64` range.
pub fn sqrt_price_x96_to_price(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
) -> Option<f64> {
    if sqrt_price_x96.is_zero() || token0_decimals > 24 || token1_decimals > 24 {
        return None;
    }

    let bytes: [u8; 32] = sqrt_price_x96.to_le_bytes();
    let sqrt_price = BigDecimal::from(BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes));
    let q96 = BigDecimal::from(BigInt::from(2u8).pow(96));

    let normalized = &sqrt_price / &q96;
    let raw_price = &normalized * &normalized;

    let decimal_diff = token0_decimals as i32 - token1_decimals as i32;
    let adjusted = if decimal_diff >= 0 {
        raw_price * big_pow10(decimal_diff as u32)
    } else {
        raw_price / big_pow10((-decimal_diff) as u32)
    };

    let price = adjusted.to_f64()?;
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Virtual reserves at the current price point from in-range liquidity.
///
/// `amount0 = L / √P`, `amount1 = L × √P` (raw units, before decimal
/// adjustment). Only the current in-range liquidity is considered, which is
/// the standard approximation for snapshot valuation.
pub fn reserves_from_liquidity(liquidity: u128, sqrt_price_x96: U256) -> Option<(f64, f64)> {
    if liquidity == 0 {
        return None;
    }

    let bytes: [u8; 32] = sqrt_price_x96.to_le_bytes();
    let sqrt_price_raw = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes)
        .to_f64()
        .unwrap_or(f64::INFINITY);
    let sqrt_price = sqrt_price_raw / Q96;
    if !sqrt_price.is_finite() || sqrt_price <= 0.0 {
        return None;
    }

    let liquidity = liquidity as f64;
    let amount0 = liquidity / sqrt_price;
    let amount1 = liquidity * sqrt_price;

    (amount0.is_finite() && amount1.is_finite()).then_some((amount0, amount1))
}

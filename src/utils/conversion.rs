//! Numeric conversions between on-chain integer types and `f64`.
//!
//! Raw `U256` values go through `BigDecimal` for the decimal adjustment so
//! balances larger than 2^53 do not lose precision before the final cast.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u32) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp))
    }
}

/// Convert a raw `U256` amount to an `f64` adjusted by `decimals`.
///
/// Returns `None` when the adjusted value does not fit in a finite `f64`.
pub fn u256_to_f64(value: U256, decimals: u8) -> Option<f64> {
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);
    let adjusted = BigDecimal::from(big_int) / big_pow10(decimals as u32);

    let result = adjusted.to_f64()?;
    result.is_finite().then_some(result)
}

/// Decimal-adjust a signed feed answer (Chainlink style `int256`).
///
/// Negative or non-finite answers yield `None`; a feed reporting a negative
/// USD price is broken, not a valid rate.
pub fn feed_answer_to_f64(answer: i128, decimals: u8) -> Option<f64> {
    if answer <= 0 {
        return None;
    }
    let adjusted = BigDecimal::from(answer) / big_pow10(decimals as u32);
    let result = adjusted.to_f64()?;
    (result.is_finite() && result > 0.0).then_some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusts_one_token_of_18_decimals() {
        let one = U256::from(10u128.pow(18));
        assert_eq!(u256_to_f64(one, 18), Some(1.0));
    }

    #[test]
    fn preserves_magnitude_beyond_f64_integer_range() {
        // 10^30 raw with 18 decimals = 10^12 tokens
        let raw = U256::from(10u8).pow(U256::from(30u8));
        let adjusted = u256_to_f64(raw, 18).unwrap();
        assert!((adjusted - 1e12).abs() / 1e12 < 1e-12);
    }

    #[test]
    fn rejects_negative_feed_answers() {
        assert_eq!(feed_answer_to_f64(-1, 8), None);
        assert_eq!(feed_answer_to_f64(0, 8), None);
        assert_eq!(feed_answer_to_f64(300_000_000_000, 8), Some(3000.0));
    }
}

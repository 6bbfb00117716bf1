//! Numeric utilities shared across the valuation engine.
//!
//! - [`conversion`] - `U256`/feed-answer to decimal-adjusted `f64`
//! - [`price`] - sqrt-price (Q64.96) math for concentrated-liquidity pools

mod conversion;
mod price;

/// The Ethereum zero address, one of the two native-asset sentinels.
pub const ZERO_ADDRESS: alloy::primitives::Address = alloy::primitives::Address::ZERO;

/// The `0xeeee…eeee` convention for native ETH used by aggregators and some
/// allocator contracts. Normalized to the wrapped token before pricing.
pub const NATIVE_ETH_SENTINEL: alloy::primitives::Address =
    alloy::primitives::address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

pub use conversion::{feed_answer_to_f64, u256_to_f64};
pub use price::{reserves_from_liquidity, sqrt_price_x96_to_price};

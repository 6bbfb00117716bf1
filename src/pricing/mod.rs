//! USD price resolution across heterogeneous liquidity venues.
//!
//! - [`resolver`] - the dispatch ladder and memoization
//! - [`strategies`] - one [`strategies::PoolPricer`] per pool kind
//! - [`formulas`] - the pure per-pool-type arithmetic

pub mod formulas;
pub mod resolver;
pub mod strategies;

pub use resolver::PriceResolver;
pub use strategies::{pricer, PoolPricer};

pub mod pool;
pub mod price;

pub use pool::{PoolSnapshot, PoolSnapshotCache};
pub use price::PriceSnapshotCache;

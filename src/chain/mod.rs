pub mod calls;
pub mod reader;
#[cfg(test)]
pub mod testing;

pub use calls::{balance_of, balances_of_many, feed_usd_rate, read, total_supply};
pub use reader::{ChainReader, RpcReader};

pub mod abis;
pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pricing;
pub mod records;
pub mod registry;
pub mod snapshot;
pub mod treasury;
pub mod utils;

pub use chain::{ChainReader, RpcReader};
pub use config::Settings;
pub use error::{ReadError, ValuationError};
pub use pricing::PriceResolver;
pub use registry::Registry;
pub use treasury::{BlockSnapshot, JsonlSink, MetricsSink, Treasury};

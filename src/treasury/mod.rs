pub mod orchestrator;
pub mod sink;

pub use orchestrator::{BlockMetrics, BlockSnapshot, Treasury};
pub use sink::{JsonlSink, MetricsSink};

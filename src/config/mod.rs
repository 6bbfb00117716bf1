mod config;

pub use config::{ChainSettings, RunSettings, Settings};

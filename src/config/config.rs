use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Chain connection and registry location.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub rpc_url: String,
    /// Path (sans extension) of the per-chain registry file.
    pub registry: String,
}

/// Block range to value and where to emit results.
#[derive(Debug, Deserialize, Clone)]
pub struct RunSettings {
    pub start_block: u64,
    pub end_block: u64,
    /// Process every Nth block in the range.
    #[serde(default = "default_block_step")]
    pub block_step: u64,
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_block_step() -> u64 {
    1
}

fn default_output() -> String {
    "metrics.jsonl".to_string()
}

/// Root application configuration, loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub chain: ChainSettings,
    pub run: RunSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}

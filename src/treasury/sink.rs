//! Emission of per-block output to the external storage layer.
//!
//! Persistence proper is out of scope; the sink boundary is where a real
//! deployment plugs in its database writer. The bundled implementation
//! appends one JSON document per block.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use super::orchestrator::BlockSnapshot;

pub trait MetricsSink: Send {
    fn emit(&mut self, snapshot: &BlockSnapshot) -> Result<()>;
}

/// Append-only JSONL writer, one document per block.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open sink file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl MetricsSink for JsonlSink {
    fn emit(&mut self, snapshot: &BlockSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot).context("failed to serialize block snapshot")?;
        self.writer.write_all(b"\n")?;
        // Flush per block so a crash never loses a committed block.
        self.writer.flush()?;
        Ok(())
    }
}

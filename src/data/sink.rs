//! Output Sinks
//!
//! Append-only destinations for disaggregated power series. Rows are keyed
//! by a hierarchical path of the form `/building{b}/elec/meter{i}`; a final
//! metadata record summarizes the run once the input stream is exhausted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::series::{PowerChunk, Timeframe};
use crate::Result;

/// Summary metadata stored after a disaggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisaggregationMetadata {
    /// Sampling period used, in seconds
    pub sample_period: u64,
    /// Measurement name of the processed readings
    pub measurement: String,
    /// Timeframes of every processed chunk, in order
    pub timeframes: Vec<Timeframe>,
    /// Building the mains meter belongs to
    pub building: u32,
    /// Meter instances written by the run
    pub meter_instances: Vec<u32>,
}

/// Append-only store for disaggregation output
pub trait OutputSink {
    /// Append a chunk of rows under the given hierarchical key
    fn append(&mut self, key: &str, chunk: &PowerChunk) -> Result<()>;

    /// Store the final run metadata
    fn store_metadata(&mut self, metadata: DisaggregationMetadata) -> Result<()>;
}

/// In-memory sink collecting appended chunks per key
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, Vec<PowerChunk>>,
    metadata: Option<DisaggregationMetadata>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks appended under a key, in append order
    pub fn table(&self, key: &str) -> Option<&[PowerChunk]> {
        self.tables.get(key).map(|v| v.as_slice())
    }

    /// All keys written so far
    pub fn keys(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }

    /// Stored run metadata, if any
    pub fn metadata(&self) -> Option<&DisaggregationMetadata> {
        self.metadata.as_ref()
    }

    /// Total rows appended under a key
    pub fn row_count(&self, key: &str) -> usize {
        self.table(key)
            .map(|chunks| chunks.iter().map(PowerChunk::len).sum())
            .unwrap_or(0)
    }
}

impl OutputSink for MemorySink {
    fn append(&mut self, key: &str, chunk: &PowerChunk) -> Result<()> {
        self.tables
            .entry(key.to_string())
            .or_default()
            .push(chunk.clone());
        Ok(())
    }

    fn store_metadata(&mut self, metadata: DisaggregationMetadata) -> Result<()> {
        self.metadata = Some(metadata);
        Ok(())
    }
}

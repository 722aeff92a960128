//! Chunk Sources
//!
//! Pull-based producers of power series chunks. A source yields chunks in
//! temporal order until exhausted; exhaustion is normal termination for the
//! consuming loops, not an error.

use super::series::{PowerChunk, Timeframe};

/// Default sampling period in seconds
pub const DEFAULT_SAMPLE_PERIOD: u64 = 60;

/// A finite, pull-based stream of power chunks
///
/// Training consumes a mains source and an appliance source side by side and
/// assumes both yield chunks in matching temporal order; that ordering is the
/// implementor's contract and is not re-checked downstream.
pub trait PowerSource {
    /// Building this source's meter belongs to
    fn building(&self) -> u32;

    /// Sampling period of the readings in seconds
    fn sample_period(&self) -> u64 {
        DEFAULT_SAMPLE_PERIOD
    }

    /// Time sections with usable data
    fn good_sections(&self) -> Vec<Timeframe>;

    /// Pull the next chunk, or `None` when the stream is exhausted
    fn next_chunk(&mut self) -> Option<PowerChunk>;
}

/// In-memory chunk source backed by a vector of chunks
///
/// Useful for tests and for driving the pipeline from preloaded data. Keeps
/// a positional cursor so the same data can be replayed after `reset`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    building: u32,
    sample_period: u64,
    chunks: Vec<PowerChunk>,
    position: usize,
}

impl MemorySource {
    /// Create a new source over the given chunks
    pub fn new(building: u32, chunks: Vec<PowerChunk>) -> Self {
        Self {
            building,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            chunks,
            position: 0,
        }
    }

    /// Set a non-default sampling period
    pub fn with_sample_period(mut self, sample_period: u64) -> Self {
        self.sample_period = sample_period;
        self
    }

    /// Total number of chunks held
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of chunks not yet pulled
    pub fn remaining(&self) -> usize {
        self.chunks.len() - self.position
    }

    /// Rewind to the first chunk
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

impl PowerSource for MemorySource {
    fn building(&self) -> u32 {
        self.building
    }

    fn sample_period(&self) -> u64 {
        self.sample_period
    }

    fn good_sections(&self) -> Vec<Timeframe> {
        self.chunks.iter().filter_map(|c| c.timeframe()).collect()
    }

    fn next_chunk(&mut self) -> Option<PowerChunk> {
        let chunk = self.chunks.get(self.position).cloned()?;
        self.position += 1;
        Some(chunk)
    }
}

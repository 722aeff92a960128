//! Power Data Module
//!
//! Provides time-indexed power series chunks, pull-based chunk sources,
//! and append-only output sinks.

mod series;
mod sink;
mod source;

pub use series::{ApplianceMeter, PowerChunk, Timeframe};
pub use sink::{DisaggregationMetadata, MemorySink, OutputSink};
pub use source::{MemorySource, PowerSource, DEFAULT_SAMPLE_PERIOD};

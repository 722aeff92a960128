//! # NILM Denoising Autoencoder
//!
//! A library for non-intrusive load monitoring (NILM): estimating the power
//! drawn by a single target appliance from the aggregate household mains
//! signal, using a sliding-window denoising autoencoder.
//!
//! ## Modules
//!
//! - `data` - Power series chunks, chunk sources, and output sinks
//! - `pipeline` - Normalization and fixed-window batching
//! - `model` - The sequence model interface, a dense autoencoder, and
//!   artifact persistence
//! - `disaggregator` - Chunked training and disaggregation loops
//!
//! ## Example
//!
//! ```rust,no_run
//! use nilm_dae::prelude::*;
//!
//! fn main() -> nilm_dae::Result<()> {
//!     let meter = ApplianceMeter::new("fridge", 2, 1);
//!     let model = DenoisingAutoencoder::new(DaeConfig::new(256));
//!     let mut disaggregator = Disaggregator::new(meter, model);
//!
//!     // Train over aligned mains/appliance chunk streams
//!     let mut mains = MemorySource::new(1, vec![]);
//!     let mut appliance = MemorySource::new(1, vec![]);
//!     disaggregator.train(&mut mains, &mut appliance, 1, 16)?;
//!
//!     // Disaggregate a fresh mains stream into an output sink
//!     let mut sink = MemorySink::new();
//!     disaggregator.disaggregate(&mut mains, &mut sink)?;
//!
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod disaggregator;
pub mod model;
pub mod pipeline;

pub use data::{ApplianceMeter, MemorySink, MemorySource, OutputSink, PowerChunk, PowerSource};
pub use disaggregator::Disaggregator;
pub use model::{DaeConfig, DenoisingAutoencoder, SequenceModel};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{
        ApplianceMeter, DisaggregationMetadata, MemorySink, MemorySource, OutputSink, PowerChunk,
        PowerSource, Timeframe,
    };
    pub use crate::disaggregator::Disaggregator;
    pub use crate::model::{DaeConfig, DenoisingAutoencoder, SequenceModel};
    pub use crate::pipeline::NormalizationScale;
    pub use crate::{DisaggError, Result};
}

/// Error types for the crate
#[derive(thiserror::Error, Debug)]
pub enum DisaggError {
    /// Normalization attempted with a non-positive or non-finite scale.
    #[error("invalid normalization scale: {0}")]
    InvalidScale(f64),

    /// The normalization scale was consulted before any training fixed it.
    #[error("normalization scale has not been set; train or import a model first")]
    Untrained,

    /// A persisted artifact is missing its paired normalization scalar.
    #[error("corrupt model artifact: {0}")]
    CorruptArtifact(String),

    /// Failure reported by the underlying sequence model.
    #[error("model error: {0}")]
    Model(String),

    /// Failure reported by an output sink.
    #[error("sink error: {0}")]
    Sink(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DisaggError>;

//! Sequence Model Interface
//!
//! The neural predictor is a black box behind [`SequenceModel`]: it accepts
//! and returns window batches only, decoupling the windowing/normalization
//! core from any particular network topology.

mod autoencoder;
mod persist;

pub use autoencoder::{DaeConfig, DenoisingAutoencoder};
pub use persist::{export_model, import_model};

use ndarray::Array2;

use crate::Result;

/// A trainable window-to-window predictor
///
/// Batches are `[windows x sequence_length]` matrices of normalized
/// readings. Fit and predict are blocking, possibly long-running calls;
/// shape errors and other model failures propagate to the caller, aborting
/// the current chunk.
pub trait SequenceModel {
    /// Window size this model was built for
    fn sequence_length(&self) -> usize;

    /// Train on an aligned batch pair, shuffling window order each epoch
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        epochs: usize,
        batch_size: usize,
    ) -> Result<()>;

    /// Predict an output batch of the same shape as the input batch
    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

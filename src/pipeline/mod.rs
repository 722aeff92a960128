//! Windowing and Normalization Pipeline
//!
//! The core transforms between irregular power series chunks and the
//! fixed-size window batches the sequence model consumes.

mod normalize;
mod window;

pub use normalize::{clip_negative, denormalize, normalize, NormalizationScale};
pub use window::{dewindow, window, window_aligned};

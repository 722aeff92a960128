//! Scale Normalization
//!
//! All normalization in a disaggregator's lifetime uses one learned scalar:
//! the maximum aggregate power seen on the first training chunk. Mixing
//! scales across sessions corrupts the learned mapping, so the scalar is
//! modeled as an explicit one-shot state transition rather than a bare
//! optional field.

use serde::{Deserialize, Serialize};

use crate::{DisaggError, Result};

/// The single learned normalization scalar of a disaggregator instance
///
/// Starts `Unset`; the first training chunk fixes it, after which it is
/// immutable for the lifetime of the instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NormalizationScale {
    /// No training chunk has been seen yet
    Unset,
    /// Fixed maximum aggregate power, in watts
    Fixed(f64),
}

impl NormalizationScale {
    /// Whether the scale has been fixed
    pub fn is_set(&self) -> bool {
        matches!(self, NormalizationScale::Fixed(_))
    }

    /// The fixed scale value
    ///
    /// Fails with `Untrained` while the scale is unset.
    pub fn value(&self) -> Result<f64> {
        match self {
            NormalizationScale::Fixed(v) => Ok(*v),
            NormalizationScale::Unset => Err(DisaggError::Untrained),
        }
    }

    /// Fix the scale if it is still unset
    ///
    /// Returns true when the transition happened. A positive finite value is
    /// required; true mains power is non-negative with at least one positive
    /// sample, so a non-positive maximum means unusable input.
    pub fn fix(&mut self, value: f64) -> Result<bool> {
        match self {
            NormalizationScale::Fixed(_) => Ok(false),
            NormalizationScale::Unset => {
                if !(value > 0.0) || !value.is_finite() {
                    return Err(DisaggError::InvalidScale(value));
                }
                *self = NormalizationScale::Fixed(value);
                Ok(true)
            }
        }
    }
}

/// Divide every reading by the scale
///
/// Fails with `InvalidScale` for a non-positive or non-finite scale.
pub fn normalize(values: &[f64], scale: f64) -> Result<Vec<f64>> {
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(DisaggError::InvalidScale(scale));
    }
    Ok(values.iter().map(|v| v / scale).collect())
}

/// Multiply every reading by the scale
///
/// Exact inverse of [`normalize`] only when no clipping happened in between.
/// After negative-power clipping this recovers the scale of the original
/// distribution but not its shape; the result is an approximation.
pub fn denormalize(values: &[f64], scale: f64) -> Result<Vec<f64>> {
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(DisaggError::InvalidScale(scale));
    }
    Ok(values.iter().map(|v| v * scale).collect())
}

/// Force negative predictions to zero
///
/// Power draw cannot be negative; applied to model output before
/// denormalization.
pub fn clip_negative(values: &mut [f64]) {
    for v in values.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

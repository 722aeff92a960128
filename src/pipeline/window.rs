//! Fixed-Size Windowing
//!
//! Converts variable-length, possibly gappy series into batches of
//! fixed-length windows for the sequence model, and reassembles model
//! output back into a series of the original length.

use ndarray::Array2;

use crate::data::PowerChunk;

/// Number of padding samples appended for a series of length `n`
///
/// Always in `1..=s`: a length that is an exact multiple of `s` still gets a
/// full extra window of zeros. That wastes one window per exact multiple,
/// but previously trained models expect this batch shape, so the behavior
/// is kept.
fn padding(n: usize, s: usize) -> usize {
    s - (n % s)
}

/// Reshape a series into windows of exactly `sequence_length` samples
///
/// Missing values (`NaN`) are treated as zero power, not interpolated. The
/// series is right-padded with zeros so every window is full; window `i`
/// covers samples `[i*s, (i+1)*s)` of the padded series.
///
/// # Panics
/// Panics if `sequence_length` is zero.
pub fn window(values: &[f64], sequence_length: usize) -> Array2<f64> {
    assert!(sequence_length > 0, "sequence length must be positive");

    let n = values.len();
    let pad = padding(n, sequence_length);
    let windows = (n + pad) / sequence_length;

    let mut batch = Array2::zeros((windows, sequence_length));
    for (i, &v) in values.iter().enumerate() {
        if !v.is_nan() {
            batch[[i / sequence_length, i % sequence_length]] = v;
        }
    }
    batch
}

/// Flatten a window batch back into a series of the original length
///
/// Truncation removes exactly the zero padding appended by [`window`];
/// `original_len` must be the pre-padding sample count.
pub fn dewindow(batch: &Array2<f64>, original_len: usize) -> Vec<f64> {
    batch.iter().take(original_len).copied().collect()
}

/// Window an aligned mains/appliance chunk pair for training
///
/// The two chunks are first reduced to their common timestamps, then
/// windowed identically and independently, so window `i` of each batch
/// covers the same time span.
pub fn window_aligned(
    mains: &PowerChunk,
    meter: &PowerChunk,
    sequence_length: usize,
) -> (Array2<f64>, Array2<f64>) {
    let (mains, meter) = mains.intersect(meter);
    (
        window(&mains.values, sequence_length),
        window(&meter.values, sequence_length),
    )
}

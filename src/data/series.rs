//! Time-Indexed Power Series Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous span of time covered by a chunk of readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe {
    /// First timestamp in the span
    pub start: DateTime<Utc>,
    /// Last timestamp in the span
    pub end: DateTime<Utc>,
}

impl Timeframe {
    /// Create a new timeframe
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Duration of the span in seconds
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Check whether a timestamp falls inside the span (inclusive)
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Identity of the target appliance meter
///
/// Output rows for the appliance are keyed by building and meter instance,
/// mirroring the hierarchical layout of NILM datastores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceMeter {
    /// Appliance name, e.g. "fridge"
    pub name: String,
    /// Meter instance number within the building
    pub instance: u32,
    /// Building number
    pub building: u32,
}

impl ApplianceMeter {
    /// Create a new appliance meter identity
    pub fn new(name: &str, instance: u32, building: u32) -> Self {
        Self {
            name: name.to_string(),
            instance,
            building,
        }
    }
}

/// A finite chunk of a time-indexed power series
///
/// Timestamps are ascending; sampling may be irregular. A `NaN` value marks
/// a missing reading. Chunks are read-only inputs to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerChunk {
    /// Measurement name, e.g. "power_active"
    pub measurement: String,
    /// Reading timestamps, ascending
    pub timestamps: Vec<DateTime<Utc>>,
    /// Power readings in watts; `NaN` for missing values
    pub values: Vec<f64>,
}

impl PowerChunk {
    /// Create a new chunk
    ///
    /// # Panics
    /// Panics if timestamps and values differ in length.
    pub fn new(measurement: &str, timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        assert_eq!(
            timestamps.len(),
            values.len(),
            "timestamp/value length mismatch"
        );
        Self {
            measurement: measurement.to_string(),
            timestamps,
            values,
        }
    }

    /// Number of readings
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the chunk holds no readings
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Time span covered by this chunk, if non-empty
    pub fn timeframe(&self) -> Option<Timeframe> {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(&start), Some(&end)) => Some(Timeframe::new(start, end)),
            _ => None,
        }
    }

    /// Maximum reading, skipping missing values
    ///
    /// Returns `NaN` if the chunk is empty or holds only missing values.
    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, |acc, &v| if acc.is_nan() || v > acc { v } else { acc })
    }

    /// Readings with missing values replaced by zero power
    pub fn filled_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|&v| if v.is_nan() { 0.0 } else { v })
            .collect()
    }

    /// Reduce two chunks to their common timestamps
    ///
    /// Returns a pair of chunks restricted to timestamps present in both,
    /// preserving order. Both inputs must be ascending; readings whose
    /// timestamp appears in only one chunk are dropped.
    pub fn intersect(&self, other: &PowerChunk) -> (PowerChunk, PowerChunk) {
        let mut ts = Vec::new();
        let mut a_vals = Vec::new();
        let mut b_vals = Vec::new();

        let mut i = 0;
        let mut j = 0;
        while i < self.len() && j < other.len() {
            match self.timestamps[i].cmp(&other.timestamps[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    ts.push(self.timestamps[i]);
                    a_vals.push(self.values[i]);
                    b_vals.push(other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }

        (
            PowerChunk::new(&self.measurement, ts.clone(), a_vals),
            PowerChunk::new(&other.measurement, ts, b_vals),
        )
    }
}

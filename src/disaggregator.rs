//! Chunked Training and Disaggregation Loops
//!
//! A [`Disaggregator`] owns one target appliance identity, one window size,
//! one normalization scale, and one trained predictor. It is driven from a
//! single logical thread: each chunk is fully processed (normalize, window,
//! model call, de-window, emit) before the next is pulled, and concurrent
//! training and disaggregation against the same instance must be serialized
//! by the caller.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::data::{
    ApplianceMeter, DisaggregationMetadata, OutputSink, PowerChunk, PowerSource, Timeframe,
};
use crate::model::{export_model, import_model, SequenceModel};
use crate::pipeline::{
    clip_negative, denormalize, dewindow, normalize, window, window_aligned, NormalizationScale,
};
use crate::Result;

/// Sliding-window appliance disaggregator
pub struct Disaggregator<M> {
    meter: ApplianceMeter,
    sequence_length: usize,
    scale: NormalizationScale,
    model: M,
}

impl<M: SequenceModel> Disaggregator<M> {
    /// Create a disaggregator for the given appliance around an untrained model
    pub fn new(meter: ApplianceMeter, model: M) -> Self {
        let sequence_length = model.sequence_length();
        assert!(sequence_length > 0, "sequence length must be positive");
        Self {
            meter,
            sequence_length,
            scale: NormalizationScale::Unset,
            model,
        }
    }

    /// Target appliance identity
    pub fn meter(&self) -> &ApplianceMeter {
        &self.meter
    }

    /// Window size used for all batching
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Current normalization scale state
    pub fn scale(&self) -> NormalizationScale {
        self.scale
    }

    /// The underlying sequence model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Train across a pair of aligned chunk streams
    ///
    /// Both sources must yield chunks in matching temporal order; that
    /// ordering is the sources' contract and is not re-checked here. The
    /// loop ends when either source is exhausted, which is normal
    /// termination. The normalization scale is fixed from the maximum of
    /// the very first mains chunk and never revisited, even if later
    /// chunks exceed it; previously exported artifacts depend on the exact
    /// scale used, so this is kept as-is.
    pub fn train<A, B>(
        &mut self,
        mains: &mut A,
        meter: &mut B,
        epochs: usize,
        batch_size: usize,
    ) -> Result<()>
    where
        A: PowerSource,
        B: PowerSource,
    {
        let mut mainchunk = match mains.next_chunk() {
            Some(chunk) => chunk,
            None => return Ok(()),
        };
        let mut meterchunk = match meter.next_chunk() {
            Some(chunk) => chunk,
            None => return Ok(()),
        };

        if self.scale.fix(mainchunk.max_value())? {
            log::info!(
                "fixed normalization scale to {:.1} W from first mains chunk",
                self.scale.value()?
            );
        }

        loop {
            self.train_on_chunk(&mainchunk, &meterchunk, epochs, batch_size)?;

            match (mains.next_chunk(), meter.next_chunk()) {
                (Some(m), Some(a)) => {
                    mainchunk = m;
                    meterchunk = a;
                }
                _ => break,
            }
        }

        Ok(())
    }

    /// Train on a single aligned mains/appliance chunk pair
    pub fn train_on_chunk(
        &mut self,
        mainchunk: &PowerChunk,
        meterchunk: &PowerChunk,
        epochs: usize,
        batch_size: usize,
    ) -> Result<()> {
        let mmax = self.scale.value()?;

        let mains_norm = PowerChunk::new(
            &mainchunk.measurement,
            mainchunk.timestamps.clone(),
            normalize(&mainchunk.values, mmax)?,
        );
        let meter_norm = PowerChunk::new(
            &meterchunk.measurement,
            meterchunk.timestamps.clone(),
            normalize(&meterchunk.values, mmax)?,
        );

        let (x_batch, y_batch) = window_aligned(&mains_norm, &meter_norm, self.sequence_length);
        log::debug!(
            "training on chunk: {} windows of {} samples",
            x_batch.nrows(),
            self.sequence_length
        );

        self.model.fit(&x_batch, &y_batch, epochs, batch_size)
    }

    /// Disaggregate a mains chunk stream into an output sink
    ///
    /// Chunks shorter than the window size are silently skipped; they are
    /// too short to form even one meaningful window. Each processed chunk
    /// yields the predicted appliance series plus a copy of the original
    /// aggregate readings, and a summary metadata record is stored once the
    /// stream is exhausted, provided at least one chunk was processed.
    pub fn disaggregate<S, K>(&self, mains: &mut S, output: &mut K) -> Result<()>
    where
        S: PowerSource,
        K: OutputSink,
    {
        let building = mains.building();
        let sample_period = mains.sample_period();
        log::debug!(
            "disaggregating {} good sections from building {}",
            mains.good_sections().len(),
            building
        );

        let building_path = format!("/building{}", building);
        let mains_key = format!("{}/elec/meter1", building_path);
        let appliance_key = format!("{}/elec/meter{}", building_path, self.meter.instance);

        let mut timeframes: Vec<Timeframe> = Vec::new();
        let mut measurement = String::new();
        let mut data_is_available = false;

        while let Some(chunk) = mains.next_chunk() {
            if chunk.len() < self.sequence_length {
                log::debug!(
                    "skipping chunk of {} samples (minimum {})",
                    chunk.len(),
                    self.sequence_length
                );
                continue;
            }
            log::info!("new sensible chunk: {} samples", chunk.len());

            if let Some(tf) = chunk.timeframe() {
                timeframes.push(tf);
            }
            measurement = chunk.measurement.clone();

            let appliance_power = self.disaggregate_chunk(&chunk)?;
            output.append(&appliance_key, &appliance_power)?;
            output.append(&mains_key, &chunk)?;
            data_is_available = true;
        }

        if data_is_available {
            output.store_metadata(DisaggregationMetadata {
                sample_period,
                measurement,
                timeframes,
                building,
                meter_instances: vec![self.meter.instance],
            })?;
        }

        Ok(())
    }

    /// In-memory disaggregation of a single mains chunk
    ///
    /// Normalizes with the instance's fixed scale, windows, predicts,
    /// reassembles to the chunk's original length, clips negative power to
    /// zero and denormalizes. Denormalization after clipping recovers the
    /// scale of the prediction but not its exact distribution shape.
    pub fn disaggregate_chunk(&self, chunk: &PowerChunk) -> Result<PowerChunk> {
        let mmax = self.scale.value()?;

        let normalized = normalize(&chunk.values, mmax)?;
        let batch = window(&normalized, self.sequence_length);
        let prediction = self.model.predict(&batch)?;

        let mut values = dewindow(&prediction, chunk.len());
        clip_negative(&mut values);
        let values = denormalize(&values, mmax)?;

        Ok(PowerChunk::new(
            &chunk.measurement,
            chunk.timestamps.clone(),
            values,
        ))
    }
}

impl<M: SequenceModel + Serialize> Disaggregator<M> {
    /// Export the trained model and its normalization scale as one artifact
    pub fn export_model(&self, path: impl AsRef<Path>) -> Result<()> {
        export_model(&self.model, self.scale.value()?, path)
    }
}

impl<M: SequenceModel + DeserializeOwned> Disaggregator<M> {
    /// Restore the model and its normalization scale from an artifact
    ///
    /// On any failure the instance keeps its existing model and scale.
    pub fn import_model(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (model, mmax) = import_model::<M>(path)?;
        self.model = model;
        self.scale = NormalizationScale::Fixed(mmax);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemorySink, MemorySource};
    use crate::model::{DaeConfig, DenoisingAutoencoder};
    use crate::DisaggError;
    use chrono::{DateTime, TimeZone, Utc};
    use ndarray::Array2;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn chunk(start: i64, values: Vec<f64>) -> PowerChunk {
        let timestamps = (0..values.len())
            .map(|i| t(start + (i as i64) * 60))
            .collect();
        PowerChunk::new("power_active", timestamps, values)
    }

    fn fridge() -> ApplianceMeter {
        ApplianceMeter::new("fridge", 2, 1)
    }

    /// Predicts its input unchanged and counts fit calls
    struct EchoModel {
        sequence_length: usize,
        fit_calls: usize,
    }

    impl EchoModel {
        fn new(sequence_length: usize) -> Self {
            Self {
                sequence_length,
                fit_calls: 0,
            }
        }
    }

    impl SequenceModel for EchoModel {
        fn sequence_length(&self) -> usize {
            self.sequence_length
        }

        fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>, _: usize, _: usize) -> Result<()> {
            assert_eq!(x.dim(), y.dim());
            self.fit_calls += 1;
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
            Ok(x.clone())
        }
    }

    /// Predicts the negation of its input
    struct NegateModel {
        sequence_length: usize,
    }

    impl SequenceModel for NegateModel {
        fn sequence_length(&self) -> usize {
            self.sequence_length
        }

        fn fit(&mut self, _: &Array2<f64>, _: &Array2<f64>, _: usize, _: usize) -> Result<()> {
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
            Ok(x.mapv(|v| -v))
        }
    }

    #[test]
    fn test_scale_fixed_from_first_chunk_only() {
        let mut disagg = Disaggregator::new(fridge(), EchoModel::new(2));
        let mut mains = MemorySource::new(
            1,
            vec![chunk(0, vec![10.0, 40.0]), chunk(120, vec![500.0, 900.0])],
        );
        let mut meter = MemorySource::new(
            1,
            vec![chunk(0, vec![1.0, 4.0]), chunk(120, vec![5.0, 9.0])],
        );

        disagg.train(&mut mains, &mut meter, 1, 16).unwrap();

        // First chunk max wins even though the second chunk peaks higher
        assert_eq!(disagg.scale().value().unwrap(), 40.0);
        assert_eq!(disagg.model().fit_calls, 2);
    }

    #[test]
    fn test_scale_survives_second_training_stream() {
        let mut disagg = Disaggregator::new(fridge(), EchoModel::new(2));
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![10.0, 40.0])]);
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![1.0, 4.0])]);
        disagg.train(&mut mains, &mut meter, 1, 16).unwrap();

        let mut mains2 = MemorySource::new(1, vec![chunk(600, vec![8000.0, 100.0])]);
        let mut meter2 = MemorySource::new(1, vec![chunk(600, vec![80.0, 1.0])]);
        disagg.train(&mut mains2, &mut meter2, 1, 16).unwrap();

        assert_eq!(disagg.scale().value().unwrap(), 40.0);
    }

    #[test]
    fn test_train_empty_stream_is_normal_termination() {
        let mut disagg = Disaggregator::new(fridge(), EchoModel::new(2));
        let mut mains = MemorySource::new(1, vec![]);
        let mut meter = MemorySource::new(1, vec![]);

        disagg.train(&mut mains, &mut meter, 1, 16).unwrap();
        assert!(!disagg.scale().is_set());
        assert_eq!(disagg.model().fit_calls, 0);
    }

    #[test]
    fn test_train_stops_when_either_source_exhausts() {
        let mut disagg = Disaggregator::new(fridge(), EchoModel::new(2));
        let mut mains = MemorySource::new(
            1,
            vec![chunk(0, vec![10.0, 20.0]), chunk(120, vec![30.0, 40.0])],
        );
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![1.0, 2.0])]);

        disagg.train(&mut mains, &mut meter, 1, 16).unwrap();
        assert_eq!(disagg.model().fit_calls, 1);
    }

    #[test]
    fn test_train_rejects_unusable_first_chunk_maximum() {
        let mut disagg = Disaggregator::new(fridge(), EchoModel::new(2));
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![0.0, 0.0])]);
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![0.0, 0.0])]);

        let result = disagg.train(&mut mains, &mut meter, 1, 16);
        assert!(matches!(result, Err(DisaggError::InvalidScale(_))));
        assert!(!disagg.scale().is_set());
    }

    #[test]
    fn test_disaggregate_before_training_fails() {
        let disagg = Disaggregator::new(fridge(), EchoModel::new(2));
        let result = disagg.disaggregate_chunk(&chunk(0, vec![10.0, 20.0]));
        assert!(matches!(result, Err(DisaggError::Untrained)));
    }

    fn trained_echo(sequence_length: usize, mmax: f64) -> Disaggregator<EchoModel> {
        let mut disagg = Disaggregator::new(fridge(), EchoModel::new(sequence_length));
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![mmax; sequence_length])]);
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![1.0; sequence_length])]);
        disagg.train(&mut mains, &mut meter, 1, 16).unwrap();
        disagg
    }

    #[test]
    fn test_disaggregate_writes_rows_and_metadata() {
        let disagg = trained_echo(2, 100.0);
        let mut mains = MemorySource::new(
            1,
            vec![chunk(600, vec![10.0, f64::NAN, 30.0, 40.0])],
        )
        .with_sample_period(60);
        let mut sink = MemorySink::new();

        disagg.disaggregate(&mut mains, &mut sink).unwrap();

        // Appliance rows under the meter's own key; echoed input means the
        // output equals the NaN-filled mains readings
        let appliance = &sink.table("/building1/elec/meter2").unwrap()[0];
        assert_eq!(appliance.len(), 4);
        let expected = [10.0, 0.0, 30.0, 40.0];
        for (a, b) in appliance.values.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(appliance.timestamps[0], t(600));

        // Untouched aggregate copy under meter1
        let aggregate = &sink.table("/building1/elec/meter1").unwrap()[0];
        assert!(aggregate.values[1].is_nan());

        let meta = sink.metadata().unwrap();
        assert_eq!(meta.sample_period, 60);
        assert_eq!(meta.building, 1);
        assert_eq!(meta.measurement, "power_active");
        assert_eq!(meta.meter_instances, vec![2]);
        assert_eq!(meta.timeframes.len(), 1);
        assert_eq!(meta.timeframes[0].start, t(600));
    }

    #[test]
    fn test_short_chunks_are_skipped_without_metadata() {
        let disagg = trained_echo(4, 100.0);
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![10.0, 20.0])]);
        let mut sink = MemorySink::new();

        disagg.disaggregate(&mut mains, &mut sink).unwrap();

        assert!(sink.keys().is_empty());
        assert!(sink.metadata().is_none());
        assert_eq!(disagg.scale().value().unwrap(), 100.0);
    }

    #[test]
    fn test_short_chunks_skipped_among_processed_ones() {
        let disagg = trained_echo(3, 100.0);
        let mut mains = MemorySource::new(
            1,
            vec![
                chunk(0, vec![1.0, 2.0]),
                chunk(600, vec![10.0, 20.0, 30.0, 40.0]),
            ],
        );
        let mut sink = MemorySink::new();

        disagg.disaggregate(&mut mains, &mut sink).unwrap();

        assert_eq!(sink.row_count("/building1/elec/meter2"), 4);
        assert_eq!(sink.metadata().unwrap().timeframes.len(), 1);
    }

    #[test]
    fn test_negative_predictions_clipped_to_zero() {
        let mut disagg = Disaggregator::new(fridge(), NegateModel { sequence_length: 2 });
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![50.0, 100.0])]);
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![5.0, 10.0])]);
        disagg.train(&mut mains, &mut meter, 1, 16).unwrap();

        let result = disagg
            .disaggregate_chunk(&chunk(600, vec![50.0, 100.0, 25.0, 75.0]))
            .unwrap();

        assert!(result.values.iter().all(|&v| v >= 0.0));
        assert!(result.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fridge.json");

        let config = DaeConfig::new(4).with_hidden_units(vec![6]);
        let mut trained = Disaggregator::new(fridge(), DenoisingAutoencoder::new(config.clone()));
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![100.0, 200.0, 300.0, 400.0])]);
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![10.0, 20.0, 30.0, 40.0])]);
        trained.train(&mut mains, &mut meter, 2, 4).unwrap();
        trained.export_model(&path).unwrap();

        let mut restored = Disaggregator::new(fridge(), DenoisingAutoencoder::new(config));
        restored.import_model(&path).unwrap();

        assert_eq!(restored.scale().value().unwrap(), 400.0);

        // Restored weights produce identical predictions
        let probe = chunk(600, vec![100.0, 150.0, 200.0, 250.0]);
        let a = trained.disaggregate_chunk(&probe).unwrap();
        let b = restored.disaggregate_chunk(&probe).unwrap();
        for (x, y) in a.values.iter().zip(b.values.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_export_untrained_fails() {
        let disagg = Disaggregator::new(fridge(), DenoisingAutoencoder::new(DaeConfig::new(4)));
        let dir = tempfile::tempdir().unwrap();
        let result = disagg.export_model(dir.path().join("untrained.json"));
        assert!(matches!(result, Err(DisaggError::Untrained)));
    }

    #[test]
    fn test_corrupt_import_leaves_instance_untouched() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"model": {{}}}}"#).unwrap();

        let config = DaeConfig::new(4).with_hidden_units(vec![6]);
        let mut disagg = Disaggregator::new(fridge(), DenoisingAutoencoder::new(config));
        let mut mains = MemorySource::new(1, vec![chunk(0, vec![100.0, 200.0, 300.0, 400.0])]);
        let mut meter = MemorySource::new(1, vec![chunk(0, vec![10.0, 20.0, 30.0, 40.0])]);
        disagg.train(&mut mains, &mut meter, 1, 4).unwrap();

        let result = disagg.import_model(&path);
        assert!(result.is_err());
        assert_eq!(disagg.scale().value().unwrap(), 400.0);
    }
}

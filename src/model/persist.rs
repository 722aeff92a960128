//! Model Artifact Persistence
//!
//! A trained predictor is only meaningful together with the normalization
//! scalar it was trained under, so both are bundled into one artifact: the
//! model's own serialized form plus a namespaced `disaggregator-data`
//! section holding `mmax`. Importing an artifact without that section is a
//! corruption error, never a silent default.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{DisaggError, Result};

#[derive(Serialize, Deserialize)]
struct Artifact<M> {
    model: M,
    #[serde(rename = "disaggregator-data", default)]
    data: ArtifactData,
}

#[derive(Serialize, Deserialize, Default)]
struct ArtifactData {
    mmax: Option<f64>,
}

/// Serialize a model and its normalization scalar into one artifact file
pub fn export_model<M: Serialize>(model: &M, mmax: f64, path: impl AsRef<Path>) -> Result<()> {
    let artifact = Artifact {
        model,
        data: ArtifactData { mmax: Some(mmax) },
    };
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), &artifact)?;
    Ok(())
}

/// Restore a model and its normalization scalar from an artifact file
///
/// Fails with `CorruptArtifact` if the artifact parses but carries no
/// `mmax`; a predictor restored without its paired scale would produce
/// meaningless denormalized output.
pub fn import_model<M: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(M, f64)> {
    let file = File::open(path)?;
    let artifact: Artifact<M> = serde_json::from_reader(BufReader::new(file))?;

    let mmax = artifact.data.mmax.ok_or_else(|| {
        DisaggError::CorruptArtifact(
            "no 'mmax' under 'disaggregator-data'; the artifact was saved without its \
             normalization scale"
                .to_string(),
        )
    })?;

    Ok((artifact.model, mmax))
}

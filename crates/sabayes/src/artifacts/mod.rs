//! Persisted results of a run.
//!
//! An output directory holds six files:
//!
//! | File | Content |
//! |------|---------|
//! | `trace.npy` | draws, `<f8`, shape `(chains, draws, params)` |
//! | `metadata.json` | names, settings, scales and diagnostics ([`Metadata`]) |
//! | `weights.mtx` | spatial weights, Matrix Market coordinate real general |
//! | `hierarchy.csv` | area code and its unit code at every level |
//! | `summary.csv` | one row per parameter |
//! | `predictions.csv` | observed, fitted and residual per area |
//!
//! [`ArtifactSet::load`] rebuilds everything from these files, so a run can
//! be re-reported without re-sampling.

pub mod matrix_market;
mod metadata;
pub mod npy;
mod tables;

pub use metadata::{LevelCount, Metadata, Standardization};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sabayes_core::{
    summarize_trace, ConvergenceReport, Hierarchy, HierarchyError, ModelError, PosteriorTrace,
    SpatialWeights, TraceSummary, WeightsError,
};

use crate::pipeline::Prediction;

/// Trace file name.
pub const TRACE_FILE: &str = "trace.npy";
/// Metadata file name.
pub const METADATA_FILE: &str = "metadata.json";
/// Weights file name.
pub const WEIGHTS_FILE: &str = "weights.mtx";
/// Hierarchy file name.
pub const HIERARCHY_FILE: &str = "hierarchy.csv";
/// Summary file name.
pub const SUMMARY_FILE: &str = "summary.csv";
/// Predictions file name.
pub const PREDICTIONS_FILE: &str = "predictions.csv";

/// Errors raised while writing or reading artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// File system failure, or a binary file that failed to decode.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// CSV reader or writer failure.
    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// Metadata could not be encoded or decoded.
    #[error("JSON error on {}: {source}", path.display())]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A file decoded but its content is malformed.
    #[error("malformed {what} {}: {reason}", path.display())]
    Format {
        /// Kind of file.
        what: &'static str,
        /// File involved.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },

    /// Files decode individually but disagree with each other.
    #[error("artifacts are inconsistent: {0}")]
    Inconsistent(String),

    /// The trace could not be rebuilt.
    #[error(transparent)]
    Trace(#[from] ModelError),

    /// The weights could not be rebuilt.
    #[error(transparent)]
    Weights(#[from] WeightsError),

    /// The hierarchy could not be rebuilt.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

impl ArtifactError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(what: &'static str, path: &Path, reason: impl Into<String>) -> Self {
        Self::Format {
            what,
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    /// Names, settings and run-level diagnostics.
    pub metadata: Metadata,
    /// Posterior draws.
    pub trace: PosteriorTrace,
    /// Per-parameter summary and convergence verdict.
    pub summary: TraceSummary,
    /// Spatial weights used by the model and by Moran's I.
    pub weights: SpatialWeights,
    /// Area hierarchy.
    pub hierarchy: Hierarchy,
    /// Posterior-mean predictions per area, in original units.
    pub predictions: Vec<Prediction>,
}

impl ArtifactSet {
    /// Write all six files into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(dir).map_err(|e| ArtifactError::io(dir, e))?;

        let path = dir.join(TRACE_FILE);
        let (chains, draws, params) = self.trace.shape();
        npy::write_f64(
            BufWriter::new(create(&path)?),
            &[chains, draws, params],
            self.trace.values(),
        )
        .map_err(|e| ArtifactError::io(&path, e))?;

        let path = dir.join(METADATA_FILE);
        let mut writer = BufWriter::new(create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &self.metadata).map_err(|source| {
            ArtifactError::Json {
                path: path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(|e| ArtifactError::io(&path, e))?;

        let path = dir.join(WEIGHTS_FILE);
        matrix_market::write_weights(BufWriter::new(create(&path)?), &self.weights)
            .map_err(|e| ArtifactError::io(&path, e))?;

        tables::write_hierarchy(&dir.join(HIERARCHY_FILE), &self.hierarchy)?;
        tables::write_summary(&dir.join(SUMMARY_FILE), &self.summary.parameters)?;
        tables::write_predictions(&dir.join(PREDICTIONS_FILE), &self.predictions)?;

        tracing::info!(dir = %dir.display(), "Wrote artifacts");
        Ok(())
    }

    /// Rebuild a run from the files in `dir`.
    ///
    /// The summary is the persisted one; compare it with
    /// [`recompute_summary`](Self::recompute_summary) to verify the trace.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let path = dir.join(METADATA_FILE);
        let metadata: Metadata = serde_json::from_reader(BufReader::new(open(&path)?))
            .map_err(|source| ArtifactError::Json {
                path: path.clone(),
                source,
            })?;

        let path = dir.join(TRACE_FILE);
        let (shape, values) =
            npy::read_f64(BufReader::new(open(&path)?)).map_err(|e| ArtifactError::io(&path, e))?;
        let &[chains, draws, params] = shape.as_slice() else {
            return Err(ArtifactError::format(
                "trace",
                &path,
                format!("expected three dimensions, got {shape:?}"),
            ));
        };
        if chains != metadata.sampler.chains || draws != metadata.sampler.draws {
            return Err(ArtifactError::Inconsistent(format!(
                "trace holds {chains} chains of {draws} draws but the sampler ran {} of {}",
                metadata.sampler.chains, metadata.sampler.draws
            )));
        }
        if params != metadata.parameter_names.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "trace holds {params} parameters but metadata names {}",
                metadata.parameter_names.len()
            )));
        }
        let trace = PosteriorTrace::new(
            metadata.parameter_names.clone(),
            chains,
            draws,
            values,
            metadata.divergences.clone(),
        )?;

        let path = dir.join(WEIGHTS_FILE);
        let (n, triplets) = matrix_market::read_weights(BufReader::new(open(&path)?))
            .map_err(|e| ArtifactError::io(&path, e))?;
        let weights = SpatialWeights::from_triplets(n, triplets)?;

        let hierarchy = tables::read_hierarchy(&dir.join(HIERARCHY_FILE), &metadata.hierarchy)?;
        if hierarchy.n_areas() != metadata.n_areas || weights.n() != metadata.n_areas {
            return Err(ArtifactError::Inconsistent(format!(
                "metadata lists {} areas, hierarchy {} and weights {}",
                metadata.n_areas,
                hierarchy.n_areas(),
                weights.n()
            )));
        }

        let parameters = tables::read_summary(&dir.join(SUMMARY_FILE))?;
        let convergence =
            ConvergenceReport::assess(&parameters, trace.total_divergences(), metadata.targets);
        let summary = TraceSummary {
            parameters,
            convergence,
        };
        let predictions = tables::read_predictions(&dir.join(PREDICTIONS_FILE))?;

        tracing::debug!(
            dir = %dir.display(),
            chains,
            draws,
            params,
            areas = metadata.n_areas,
            "Loaded artifacts"
        );

        Ok(Self {
            metadata,
            trace,
            summary,
            weights,
            hierarchy,
            predictions,
        })
    }

    /// Summarize the trace again with the recorded targets.
    pub fn recompute_summary(&self) -> TraceSummary {
        summarize_trace(&self.trace, &self.metadata.targets)
    }
}

/// Whether two summaries carry the same numbers bit for bit. Unlike `==`,
/// an undefined (NaN) diagnostic matches itself.
pub fn summaries_identical(a: &TraceSummary, b: &TraceSummary) -> bool {
    let same = |x: f64, y: f64| x.to_bits() == y.to_bits();
    a.parameters.len() == b.parameters.len()
        && a.parameters.iter().zip(&b.parameters).all(|(p, q)| {
            p.name == q.name
                && same(p.mean, q.mean)
                && same(p.sd, q.sd)
                && same(p.q025, q.q025)
                && same(p.q975, q.q975)
                && same(p.r_hat, q.r_hat)
                && same(p.ess, q.ess)
        })
        && a.convergence.status == b.convergence.status
        && a.convergence.failing == b.convergence.failing
        && a.convergence.divergences == b.convergence.divergences
}

fn create(path: &Path) -> Result<File, ArtifactError> {
    File::create(path).map_err(|e| ArtifactError::io(path, e))
}

fn open(path: &Path) -> Result<File, ArtifactError> {
    File::open(path).map_err(|e| ArtifactError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sample_artifacts;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let artifacts = sample_artifacts();
        artifacts.save(dir.path()).unwrap();

        let loaded = ArtifactSet::load(dir.path()).unwrap();
        assert_eq!(loaded.metadata, artifacts.metadata);
        assert_eq!(loaded.trace, artifacts.trace);
        assert_eq!(loaded.weights, artifacts.weights);
        assert_eq!(loaded.hierarchy, artifacts.hierarchy);
        assert_eq!(loaded.predictions, artifacts.predictions);
        assert!(summaries_identical(&loaded.summary, &artifacts.summary));
        assert!(summaries_identical(&loaded.recompute_summary(), &loaded.summary));
    }

    #[test]
    fn test_summaries_identical_sees_one_bit() {
        let artifacts = sample_artifacts();
        let mut changed = artifacts.summary.clone();
        assert!(summaries_identical(&changed, &artifacts.summary));
        changed.parameters[0].mean = f64::from_bits(changed.parameters[0].mean.to_bits() ^ 1);
        assert!(!summaries_identical(&changed, &artifacts.summary));
    }

    #[test]
    fn test_load_from_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ArtifactSet::load(dir.path()),
            Err(ArtifactError::Io { .. })
        ));
    }
}

//! Top-level error of a pipeline run.

use sabayes_core::{HierarchyError, ModelError, WeightsError};

use crate::artifacts::ArtifactError;
use crate::config::ConfigError;
use crate::data::DataError;

/// Any error that aborts a run. Model-fit problems (divergences, missed
/// convergence targets) are reported, not raised.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input tables could not be loaded or prepared.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Area codes do not fit the hierarchy layout.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// The neighbour graph could not be built.
    #[error(transparent)]
    Weights(#[from] WeightsError),

    /// Model inputs or the run state machine were invalid.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Artifacts could not be written or read.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// A report or configuration could not be encoded as JSON.
    #[error("failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

//! `metadata.json`: everything needed to interpret the other artifacts.

use serde::{Deserialize, Serialize};

use sabayes_core::{
    ConvergenceTargets, HierarchySpec, ModelSpec, MoransI, RunStage, SamplerConfig, Standardizer,
    VarianceDecomposition,
};

use crate::data::ImputedColumn;
use crate::pipeline::WeightsReport;

/// Units at one hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCount {
    /// Level name.
    pub name: String,
    /// Distinct units.
    pub units: usize,
}

/// Scales of the outcome and every predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    /// Outcome scale.
    pub outcome: Standardizer,
    /// Predictor scales, in predictor order.
    pub predictors: Vec<(String, Standardizer)>,
}

/// Run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Version of the crate that wrote the artifacts.
    pub crate_version: String,
    /// Stage reached when sampling finished: converged or diverged.
    pub stage: RunStage,
    /// Outcome field.
    pub outcome: String,
    /// Predictor fields.
    pub predictors: Vec<String>,
    /// Code layout.
    pub hierarchy: HierarchySpec,
    /// Units per level, coarsest first.
    pub levels: Vec<LevelCount>,
    /// Areas in the model.
    pub n_areas: usize,
    /// Areas dropped by the inner merge.
    pub dropped_areas: usize,
    /// Non-numeric cells read as missing.
    pub coerced_cells: usize,
    /// Median-imputed cells per model column.
    pub imputed: Vec<ImputedColumn>,
    /// Standardization of the model columns.
    pub standardization: Standardization,
    /// Priors and spatial term.
    pub model: ModelSpec,
    /// Sampler settings.
    pub sampler: SamplerConfig,
    /// Convergence targets.
    pub targets: ConvergenceTargets,
    /// Trace column names.
    pub parameter_names: Vec<String>,
    /// Divergent sweeps per chain.
    pub divergences: Vec<usize>,
    /// Neighbour graph.
    pub weights: WeightsReport,
    /// Share of variance per component.
    pub variance: VarianceDecomposition,
    /// Moran's I of the outcome.
    pub moran_outcome: Option<MoransI>,
    /// Moran's I of the posterior-mean residuals.
    pub moran_residual: Option<MoransI>,
    /// Wall-clock seconds of the run.
    pub elapsed_secs: f64,
}

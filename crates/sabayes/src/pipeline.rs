//! The staged batch run.
//!
//! ```text
//! tables ─► merge, derive, impute ─► Hierarchy ─► coordinates ─► KnnGraph
//!                                                                   │
//!       ArtifactSet ◄─ summaries ◄─ run_chains ◄─ ModelData ◄─ SpatialWeights
//! ```
//!
//! Stages run strictly in order; the run itself follows the [`RunStage`]
//! state machine from `Specified` through `Sampling` to `Converged` or
//! `Diverged` and finally `Summarized`. Any fatal error aborts the run; model
//! fit problems only produce warnings.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use sabayes_core::model::run_chains;
use sabayes_core::spatial::LogDetMethod;
use sabayes_core::{
    summarize_trace, Coordinates, Hierarchy, KnnGraph, LogDetTable, ModelData, MoransI,
    RunStage, SpatialWeights, Standardizer, TraceSummary, VarianceDecomposition,
};

use crate::artifacts::{ArtifactSet, LevelCount, Metadata, Standardization};
use crate::config::PipelineConfig;
use crate::data::{load_centroids, load_table, merge_tables, AreaTable, ImputedColumn};
use crate::error::Result;

/// Posterior-mean prediction for one area, in original units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Area code.
    pub code: String,
    /// Outcome after imputation.
    pub observed: f64,
    /// Posterior mean of the linear predictor plus random effects.
    pub fitted: f64,
    /// `observed − fitted`.
    pub residual: f64,
}

/// Where area positions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    /// Loaded centroids.
    Centroids,
    /// Embedding derived from the area codes.
    Proxy,
}

/// How the neighbour structure turned out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsReport {
    /// Source of the coordinates.
    pub coordinates: CoordinateSource,
    /// Neighbours requested per area.
    pub k_requested: usize,
    /// Neighbours actually sought (`min(k, n − 1)`).
    pub k_effective: usize,
    /// Distance cut-off, if any.
    pub max_distance: Option<f64>,
    /// Whether the relation was made mutual.
    pub symmetrized: bool,
    /// Stored nonzeros.
    pub nnz: usize,
    /// Areas without neighbours.
    pub isolated: usize,
    /// Log-determinant method, when the spatial term is fitted.
    pub logdet: Option<LogDetMethod>,
}

/// Model-ready columns and their scales.
struct Prepared {
    table: AreaTable,
    imputed: Vec<ImputedColumn>,
    outcome: Vec<f64>,
    outcome_scale: Standardizer,
    predictors: Vec<(String, Vec<f64>)>,
    predictor_scales: Vec<(String, Standardizer)>,
}

/// One pipeline run over a configuration.
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    base_dir: PathBuf,
    stage: RunStage,
}

impl<'a> Pipeline<'a> {
    /// Prepare a run. Relative input paths resolve against the working
    /// directory unless [`with_base_dir`](Self::with_base_dir) is used.
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            base_dir: PathBuf::from("."),
            stage: RunStage::Specified,
        }
    }

    /// Resolve relative input paths against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Current stage.
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Execute every stage and return the results, without writing them.
    pub fn run(&mut self) -> Result<ArtifactSet> {
        let started = Instant::now();
        let config = self.config;
        config.validate()?;

        let prepared = self.prepare()?;
        let n = prepared.table.len();

        let hierarchy = Hierarchy::extract(&config.hierarchy, &prepared.table.codes)?;
        debug_assert!(hierarchy.check_containment());
        tracing::info!(
            areas = n,
            levels = ?hierarchy.unit_counts(),
            "Derived hierarchy"
        );

        let (weights, mut weights_report) = self.build_weights(&prepared.table, &hierarchy)?;

        let mut data = ModelData::new(
            prepared.outcome_scale.transform(&prepared.outcome),
            &prepared.predictors,
            &hierarchy,
        )?;
        if config.model.has_spatial() {
            let logdet = LogDetTable::build(
                &weights,
                config.model.priors.rho_grid_points,
                config.sampler.seed,
            );
            tracing::debug!(method = ?logdet.method, points = logdet.len(), "Tabulated log-determinant");
            weights_report.logdet = Some(logdet.method);
            data = data.with_spatial(weights.clone(), logdet)?;
        }

        self.stage = self.stage.advance(RunStage::Sampling)?;
        tracing::info!(
            chains = config.sampler.chains,
            tune = config.sampler.tune,
            draws = config.sampler.draws,
            thin = config.sampler.thin,
            coefficients = data.p(),
            "Sampling"
        );
        let output = run_chains(&data, &config.model, &config.sampler)?;

        let summary = summarize_trace(&output.trace, &config.diagnostics);
        self.stage = self
            .stage
            .finish_sampling(summary.convergence.status.is_converged())?;
        let sampling = self.stage;
        log_convergence(&summary);

        let level_names: Vec<&str> = hierarchy.levels.iter().map(|l| l.name.as_str()).collect();
        let variance = VarianceDecomposition::from_trace(&output.trace, &level_names);
        for component in &variance.components {
            tracing::info!(
                component = %component.name,
                percent = component.percent,
                "Variance share"
            );
        }

        let fitted = prepared.outcome_scale.inverse_transform(&output.fitted);
        let predictions: Vec<Prediction> = prepared
            .table
            .codes
            .iter()
            .zip(&prepared.outcome)
            .zip(&fitted)
            .map(|((code, &observed), &fitted)| Prediction {
                code: code.clone(),
                observed,
                fitted,
                residual: observed - fitted,
            })
            .collect();
        let residuals: Vec<f64> = predictions.iter().map(|p| p.residual).collect();
        let moran_outcome = MoransI::compute(&prepared.outcome, &weights);
        let moran_residual = MoransI::compute(&residuals, &weights);
        if let (Some(before), Some(after)) = (&moran_outcome, &moran_residual) {
            tracing::info!(
                outcome = before.statistic,
                residual = after.statistic,
                "Moran's I"
            );
        }

        self.stage = self.stage.advance(RunStage::Summarized)?;

        let metadata = Metadata {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            stage: sampling,
            outcome: config.outcome.clone(),
            predictors: config.predictors.clone(),
            hierarchy: config.hierarchy.clone(),
            levels: hierarchy
                .unit_counts()
                .into_iter()
                .map(|(name, units)| LevelCount { name, units })
                .collect(),
            n_areas: n,
            dropped_areas: prepared.table.dropped,
            coerced_cells: prepared.table.coerced,
            imputed: prepared.imputed,
            standardization: Standardization {
                outcome: prepared.outcome_scale,
                predictors: prepared.predictor_scales,
            },
            model: config.model,
            sampler: config.sampler,
            targets: config.diagnostics,
            parameter_names: output.trace.names().to_vec(),
            divergences: output.trace.divergences().to_vec(),
            weights: weights_report,
            variance,
            moran_outcome,
            moran_residual,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        Ok(ArtifactSet {
            metadata,
            trace: output.trace,
            summary,
            weights,
            hierarchy,
            predictions,
        })
    }

    /// Run and write the artifacts into `dir`.
    pub fn run_and_save(&mut self, dir: &Path) -> Result<ArtifactSet> {
        let artifacts = self.run()?;
        artifacts.save(dir)?;
        Ok(artifacts)
    }

    /// Load, merge, derive and impute, then standardize the model columns.
    fn prepare(&self) -> Result<Prepared> {
        let config = self.config;
        let tables = config
            .tables
            .iter()
            .map(|schema| load_table(schema, &self.base_dir, config.sentinels.as_slice()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut table = merge_tables(tables)?;
        for derived in &config.derived {
            table.derive(derived)?;
        }
        let imputed = table.impute(&config.model_columns())?;
        tracing::info!(
            areas = table.len(),
            dropped = table.dropped,
            coerced = table.coerced,
            "Merged input tables"
        );

        let outcome = table.require(&config.outcome, "the outcome")?.to_vec();
        let outcome_scale = Standardizer::fit(&outcome);
        let mut predictors = Vec::with_capacity(config.predictors.len());
        let mut predictor_scales = Vec::with_capacity(config.predictors.len());
        for name in &config.predictors {
            let column = table.require(name, "the predictors")?;
            let scale = Standardizer::fit(column);
            predictors.push((name.clone(), scale.transform(column)));
            predictor_scales.push((name.clone(), scale));
        }

        Ok(Prepared {
            table,
            imputed,
            outcome,
            outcome_scale,
            predictors,
            predictor_scales,
        })
    }

    fn build_weights(
        &self,
        table: &AreaTable,
        hierarchy: &Hierarchy,
    ) -> Result<(SpatialWeights, WeightsReport)> {
        let settings = &self.config.weights;
        let (coords, source) = match &settings.centroids {
            Some(centroids) => {
                let points = load_centroids(centroids, &self.base_dir, &table.codes)?;
                (Coordinates::from_xy(&points)?, CoordinateSource::Centroids)
            }
            None => (
                Coordinates::proxy_from_hierarchy(hierarchy),
                CoordinateSource::Proxy,
            ),
        };

        let graph = KnnGraph::build(&coords, settings.k, settings.max_distance)?;
        if graph.was_reduced() {
            tracing::warn!(
                requested = graph.k_requested,
                effective = graph.k_effective,
                areas = graph.len(),
                "Fewer areas than requested neighbours; k reduced"
            );
        }
        let weights = SpatialWeights::from_graph(&graph, settings.symmetrize);
        let isolated = weights.isolated_count();
        if isolated > 0 {
            tracing::warn!(isolated, "Areas without neighbours get an independent spatial effect");
        }
        tracing::info!(
            coordinates = ?source,
            k = graph.k_effective,
            nnz = weights.nnz(),
            "Built spatial weights"
        );

        let report = WeightsReport {
            coordinates: source,
            k_requested: graph.k_requested,
            k_effective: graph.k_effective,
            max_distance: settings.max_distance,
            symmetrized: settings.symmetrize,
            nnz: weights.nnz(),
            isolated,
            logdet: None,
        };
        Ok((weights, report))
    }
}

fn log_convergence(summary: &TraceSummary) {
    let report = &summary.convergence;
    if report.status.is_converged() {
        tracing::info!(
            max_r_hat = report.max_r_hat,
            min_ess = report.min_ess,
            "Chains converged"
        );
        return;
    }
    if !report.failing.is_empty() {
        tracing::warn!(
            failing = report.failing.len(),
            max_r_hat = report.max_r_hat,
            min_ess = report.min_ess,
            r_hat_target = report.targets.r_hat,
            ess_target = report.targets.ess,
            "Convergence targets not met"
        );
    }
    if report.divergences > 0 {
        tracing::warn!(divergences = report.divergences, "Divergent sweeps were rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TableSchema;
    use sabayes_core::{HierarchySpec, LevelSpec, SamplerConfig, SpatialTerm};
    use std::fmt::Write as _;
    use tempfile::TempDir;

    /// 24 areas in 4 groups, outcome = 2·x + group effect + noise. Within a
    /// group x is shuffled so that it does not follow the area order.
    fn fixture(dir: &TempDir) -> PipelineConfig {
        let mut csv = String::from("code,x,y\n");
        for g in 0..4 {
            for a in 0..6 {
                let x = g as f64 * 1.5 + ((a * 5 + g) % 6) as f64 * 0.25;
                let noise = ((g * 7 + a * 3) % 5) as f64 * 0.1;
                let y = 2.0 * x + 0.5 * g as f64 + noise;
                writeln!(csv, "1{g}{a:02},{x},{y}").unwrap();
            }
        }
        std::fs::write(dir.path().join("areas.csv"), csv).unwrap();

        PipelineConfig::new("y")
            .with_table(TableSchema::new("areas", "areas.csv", "code").field("x", "x").field("y", "y"))
            .with_predictors(["x"])
            .with_hierarchy(HierarchySpec {
                area: LevelSpec::new("area", 4),
                levels: vec![LevelSpec::new("group", 2)],
            })
            .with_neighbours(3)
            .with_sampler(SamplerConfig::new().chains(2).tune(200).draws(200).seed(11))
    }

    #[test]
    fn test_run_reaches_summarized() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir);
        let mut pipeline = Pipeline::new(&config).with_base_dir(dir.path());
        assert_eq!(pipeline.stage(), RunStage::Specified);

        let artifacts = pipeline.run().unwrap();
        assert_eq!(pipeline.stage(), RunStage::Summarized);
        assert!(matches!(
            artifacts.metadata.stage,
            RunStage::Converged | RunStage::Diverged
        ));
        assert_eq!(artifacts.metadata.n_areas, 24);
        assert_eq!(artifacts.metadata.levels[0].units, 4);
        assert_eq!(artifacts.metadata.weights.coordinates, CoordinateSource::Proxy);
        assert_eq!(artifacts.metadata.weights.logdet, Some(LogDetMethod::Exact));
        assert_eq!(artifacts.predictions.len(), 24);
        assert_eq!(artifacts.trace.shape(), (2, 200, artifacts.metadata.parameter_names.len()));

        let slope = artifacts.summary.get("beta[x]").unwrap();
        assert!(slope.mean > 0.5, "standardized slope {}", slope.mean);
        for p in &artifacts.predictions {
            assert!((p.observed - p.fitted - p.residual).abs() < 1e-9);
        }
    }

    #[test]
    fn test_run_without_spatial_term() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(&dir).with_spatial(SpatialTerm::None);
        config.weights.symmetrize = false;
        let artifacts = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();

        assert_eq!(artifacts.metadata.weights.logdet, None);
        assert!(artifacts.trace.param_index("rho").is_none());
        assert!(artifacts.metadata.variance.get("spatial").is_none());
        // Moran's I still uses the directed weights.
        assert!(artifacts.metadata.moran_outcome.is_some());
    }

    #[test]
    fn test_invalid_config_fails_before_loading() {
        let config = PipelineConfig::new("y");
        let mut pipeline = Pipeline::new(&config);
        assert!(matches!(
            pipeline.run(),
            Err(crate::error::PipelineError::Config(_))
        ));
        assert_eq!(pipeline.stage(), RunStage::Specified);
    }
}

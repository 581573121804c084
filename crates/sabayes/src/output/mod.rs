//! Output formatting for run results.

mod json;
mod terminal;

pub use json::{to_json, to_json_pretty};
pub use terminal::{format_parameters, format_report};

#[cfg(test)]
pub(crate) fn sample_artifacts() -> crate::artifacts::ArtifactSet {
    use crate::artifacts::{ArtifactSet, LevelCount, Metadata, Standardization};
    use crate::data::ImputedColumn;
    use crate::pipeline::{CoordinateSource, Prediction, WeightsReport};
    use sabayes_core::{
        summarize_trace, ConvergenceTargets, Coordinates, Hierarchy, HierarchySpec, KnnGraph,
        ModelSpec, MoransI, PosteriorTrace, RunStage, SamplerConfig, SpatialWeights,
        Standardizer, VarianceDecomposition,
    };

    let codes = ["10102100701", "10102100702", "10203100101", "10203100102"];
    let hierarchy = Hierarchy::extract(&HierarchySpec::default(), &codes).unwrap();
    let coords = Coordinates::proxy_from_hierarchy(&hierarchy);
    let weights = SpatialWeights::from_graph(&KnnGraph::build(&coords, 2, None).unwrap(), true);

    let names: Vec<String> = ["beta[intercept]", "beta[income]", "sigma_SA2", "sigma"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (chains, draws) = (2, 50);
    let mut values = Vec::with_capacity(chains * draws * names.len());
    for c in 0..chains {
        for d in 0..draws {
            let wiggle = ((c * 31 + d * 17) % 11) as f64 / 11.0 - 0.5;
            values.extend_from_slice(&[0.1 * wiggle, 0.8 + 0.05 * wiggle, 0.3, 0.5 + 0.01 * wiggle]);
        }
    }
    let trace = PosteriorTrace::new(names.clone(), chains, draws, values, vec![0, 1]).unwrap();
    let targets = ConvergenceTargets::default();
    let summary = summarize_trace(&trace, &targets);
    let sampler = SamplerConfig::new().chains(chains).draws(draws);

    let outcome = [300.0, 320.0, 410.0, 450.0];
    let metadata = Metadata {
        crate_version: "0.1.0".to_string(),
        stage: RunStage::Diverged,
        outcome: "median_rent".to_string(),
        predictors: vec!["income".to_string()],
        hierarchy: HierarchySpec::default(),
        levels: hierarchy
            .unit_counts()
            .into_iter()
            .map(|(name, units)| LevelCount { name, units })
            .collect(),
        n_areas: 4,
        dropped_areas: 1,
        coerced_cells: 2,
        imputed: vec![ImputedColumn {
            column: "median_rent".to_string(),
            cells: 1,
        }],
        standardization: Standardization {
            outcome: Standardizer::fit(&outcome),
            predictors: vec![("income".to_string(), Standardizer { mean: 900.0, sd: 150.0 })],
        },
        model: ModelSpec::default(),
        sampler,
        targets,
        parameter_names: names,
        divergences: vec![0, 1],
        weights: WeightsReport {
            coordinates: CoordinateSource::Proxy,
            k_requested: 2,
            k_effective: 2,
            max_distance: None,
            symmetrized: true,
            nnz: weights.nnz(),
            isolated: 0,
            logdet: None,
        },
        variance: VarianceDecomposition::from_trace(&trace, &["SA4", "SA3", "SA2"]),
        moran_outcome: MoransI::compute(&outcome, &weights),
        moran_residual: MoransI::compute(&[1.0, -1.0, 2.0, -2.5], &weights),
        elapsed_secs: 1.5,
    };
    let predictions = codes
        .iter()
        .zip(outcome)
        .map(|(code, observed)| Prediction {
            code: code.to_string(),
            observed,
            fitted: observed - 5.0,
            residual: 5.0,
        })
        .collect();

    ArtifactSet {
        metadata,
        trace,
        summary,
        weights,
        hierarchy,
        predictions,
    }
}

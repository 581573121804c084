//! Full runs from CSV tables to written artifacts.

use sabayes::artifacts::{
    HIERARCHY_FILE, METADATA_FILE, PREDICTIONS_FILE, SUMMARY_FILE, TRACE_FILE, WEIGHTS_FILE,
};
use sabayes::{Pipeline, PipelineConfig, PipelineError, RunStage, SpatialTerm};
use tempfile::TempDir;

use crate::common;

#[test]
fn merged_tables_feed_the_model() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config = common::config();

    let mut pipeline = Pipeline::new(&config).with_base_dir(dir.path());
    let artifacts = pipeline.run().unwrap();
    assert_eq!(pipeline.stage(), RunStage::Summarized);

    let meta = &artifacts.metadata;
    // The income-only area and the area without tenure counts are dropped.
    assert_eq!(meta.n_areas, 29);
    assert_eq!(meta.dropped_areas, 2);
    assert_eq!(meta.coerced_cells, 1);
    assert!(!artifacts.predictions.iter().any(|p| p.code == common::INCOME_ONLY));
    assert!(!artifacts.predictions.iter().any(|p| p.code == common::NO_TENURE));

    let imputed = |column: &str| {
        meta.imputed
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.cells)
    };
    assert_eq!(imputed("median_rent"), Some(1));
    assert_eq!(imputed("median_income"), Some(1));
    // Zero dwellings leave the ratio undefined.
    assert_eq!(imputed("renter_share"), Some(1));

    let levels: Vec<(&str, usize)> = meta.levels.iter().map(|l| (l.name.as_str(), l.units)).collect();
    assert_eq!(levels, vec![("region", 2), ("district", 6)]);

    // 3 coefficients, 2 + 6 intercepts, 2 level scales, the spatial
    // scale, rho, sigma and the realised spatial variance.
    assert_eq!(meta.parameter_names.len(), 17);
    assert_eq!(artifacts.trace.shape(), (2, 150, 17));
    assert!(artifacts.trace.param_index("u_district[101]").is_some());
    assert!(artifacts.trace.param_index("rho").is_some());

    let variance: f64 = meta.variance.components.iter().map(|c| c.percent).sum();
    assert!((variance - 100.0).abs() < 1e-9);
    assert!(meta.variance.get("spatial").is_some());
    assert!(meta.moran_outcome.is_some());
    assert!(meta.moran_residual.is_some());
}

#[test]
fn predictions_are_in_original_units() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config = common::config();
    let artifacts = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();

    let observed: Vec<f64> = artifacts.predictions.iter().map(|p| p.observed).collect();
    let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
    assert!(min > 300.0, "observed rents look standardized: {min}");

    let mean_fitted =
        artifacts.predictions.iter().map(|p| p.fitted).sum::<f64>() / artifacts.predictions.len() as f64;
    let mean_observed = observed.iter().sum::<f64>() / observed.len() as f64;
    assert!(
        (mean_fitted - mean_observed).abs() < 0.2 * mean_observed,
        "fitted mean {mean_fitted} far from observed mean {mean_observed}"
    );
    for p in &artifacts.predictions {
        assert!(p.fitted.is_finite());
        assert_eq!(p.residual, p.observed - p.fitted);
    }
}

#[test]
fn run_and_save_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config = common::config();
    let out = dir.path().join("out");

    Pipeline::new(&config)
        .with_base_dir(dir.path())
        .run_and_save(&out)
        .unwrap();

    for file in [
        TRACE_FILE,
        METADATA_FILE,
        WEIGHTS_FILE,
        HIERARCHY_FILE,
        SUMMARY_FILE,
        PREDICTIONS_FILE,
    ] {
        assert!(out.join(file).is_file(), "{file} was not written");
    }
    let summary = std::fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
    assert!(summary.starts_with("parameter,mean,sd,q025,q975,r_hat,ess\n"));
    assert!(summary.contains("beta[median_income],"));
}

#[test]
fn config_file_paths_resolve_against_its_directory() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config_path = dir.path().join("pipeline.json");
    std::fs::write(&config_path, common::config().to_json_pretty().unwrap()).unwrap();

    // No base directory: the loaded config already carries absolute paths.
    let config = PipelineConfig::from_json_file(&config_path).unwrap();
    let artifacts = Pipeline::new(&config).run().unwrap();
    assert_eq!(artifacts.metadata.n_areas, 29);
}

#[test]
fn same_seed_same_trace() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config = common::config().with_spatial(SpatialTerm::None);

    let first = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();
    let second = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();
    assert_eq!(first.trace, second.trace);
    assert_eq!(first.predictions, second.predictions);
}

#[test]
fn area_effects_are_stored_on_request() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config =
        common::config().with_sampler(common::short_sampler().draws(40).store_area_effects(true));
    let artifacts = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();

    let phi = artifacts
        .metadata
        .parameter_names
        .iter()
        .filter(|name| name.starts_with("phi["))
        .count();
    assert_eq!(phi, 29);
    assert!(artifacts.trace.param_index("phi[10000]").is_some());
}

#[test]
fn missing_outcome_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let mut config = common::config();
    config.outcome = "median_mortgage".to_string();

    let mut pipeline = Pipeline::new(&config).with_base_dir(dir.path());
    assert!(matches!(pipeline.run(), Err(PipelineError::Config(_))));
    assert_eq!(pipeline.stage(), RunStage::Specified);
}

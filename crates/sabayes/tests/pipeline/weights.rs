//! Neighbour structure options.

use std::fmt::Write as _;
use std::path::Path;

use sabayes::data::CentroidSource;
use sabayes::pipeline::CoordinateSource;
use sabayes::{DataError, Pipeline, PipelineError};
use tempfile::TempDir;

use crate::common;

/// Areas on a 6 × 5 grid with unit spacing, except `outlier`, which is
/// placed far away. Codes listed in `skip` get no row.
fn write_centroids(dir: &Path, outlier: Option<&str>, skip: &[&str]) {
    let mut csv = String::from("code,x,y\n");
    for (i, code) in common::area_codes().iter().enumerate() {
        if skip.contains(&code.as_str()) {
            continue;
        }
        let (x, y) = if Some(code.as_str()) == outlier {
            (1000.0, 1000.0)
        } else {
            ((i % 6) as f64, (i / 6) as f64)
        };
        writeln!(csv, "{code},{x},{y}").unwrap();
    }
    std::fs::write(dir.join("centroids.csv"), csv).unwrap();
}

#[test]
fn centroids_replace_the_proxy_embedding() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    write_centroids(dir.path(), None, &[]);
    let config = common::config().with_centroids(CentroidSource::new("centroids.csv"));

    let artifacts = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();
    let report = &artifacts.metadata.weights;
    assert_eq!(report.coordinates, CoordinateSource::Centroids);
    assert_eq!(report.k_effective, 4);
    assert_eq!(report.isolated, 0);
    // Symmetrized kNN keeps at least k neighbours per row.
    assert!(report.nnz >= 4 * 29);
}

#[test]
fn area_without_centroid_is_an_error() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    write_centroids(dir.path(), None, &["10104"]);
    let config = common::config().with_centroids(CentroidSource::new("centroids.csv"));

    match Pipeline::new(&config).with_base_dir(dir.path()).run() {
        Err(PipelineError::Data(DataError::MissingCentroid { code })) => {
            assert_eq!(code, "10104");
        }
        other => panic!("expected a missing centroid, got {other:?}"),
    }
}

#[test]
fn distance_cut_off_isolates_far_areas() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    write_centroids(dir.path(), Some("20001"), &[]);
    let config = common::config()
        .with_centroids(CentroidSource::new("centroids.csv"))
        .with_max_distance(3.0);

    let artifacts = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();
    let report = &artifacts.metadata.weights;
    assert_eq!(report.max_distance, Some(3.0));
    assert_eq!(report.isolated, 1);
    let row = artifacts
        .hierarchy
        .area_codes
        .iter()
        .position(|c| c == "20001")
        .unwrap();
    assert!(artifacts.weights.triplets().all(|(i, j, _)| i != row && j != row));
}

#[test]
fn too_few_areas_reduce_k() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    let config = common::config().with_neighbours(50);

    let artifacts = Pipeline::new(&config).with_base_dir(dir.path()).run().unwrap();
    let report = &artifacts.metadata.weights;
    assert_eq!(report.k_requested, 50);
    assert_eq!(report.k_effective, 28);
    // Every area neighbours every other.
    assert_eq!(report.nnz, 29 * 28);
}

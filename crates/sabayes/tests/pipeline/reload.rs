//! Reloading written artifacts without re-sampling.

use std::path::Path;

use sabayes::artifacts::{summaries_identical, HIERARCHY_FILE, METADATA_FILE, TRACE_FILE};
use sabayes::{ArtifactError, ArtifactSet, Pipeline};
use tempfile::TempDir;

use crate::common;

fn saved_run(dir: &Path) -> ArtifactSet {
    common::write_tables(dir);
    let config = common::config();
    Pipeline::new(&config)
        .with_base_dir(dir)
        .run_and_save(&dir.join("out"))
        .unwrap()
}

#[test]
fn reload_reproduces_the_run() {
    let dir = TempDir::new().unwrap();
    let artifacts = saved_run(dir.path());
    let loaded = ArtifactSet::load(&dir.path().join("out")).unwrap();

    assert_eq!(loaded.metadata, artifacts.metadata);
    assert_eq!(loaded.trace, artifacts.trace);
    assert_eq!(loaded.weights, artifacts.weights);
    assert_eq!(loaded.hierarchy, artifacts.hierarchy);
    assert_eq!(loaded.predictions, artifacts.predictions);
    assert!(summaries_identical(&loaded.summary, &artifacts.summary));
}

#[test]
fn recomputed_summary_matches_the_persisted_one() {
    let dir = TempDir::new().unwrap();
    saved_run(dir.path());
    let loaded = ArtifactSet::load(&dir.path().join("out")).unwrap();

    let recomputed = loaded.recompute_summary();
    assert!(summaries_identical(&recomputed, &loaded.summary));
    assert_eq!(recomputed.convergence.status, loaded.summary.convergence.status);
}

#[test]
fn missing_trace_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    saved_run(dir.path());
    let out = dir.path().join("out");
    std::fs::remove_file(out.join(TRACE_FILE)).unwrap();

    assert!(matches!(ArtifactSet::load(&out), Err(ArtifactError::Io { .. })));
}

#[test]
fn metadata_disagreeing_with_the_trace_is_rejected() {
    let dir = TempDir::new().unwrap();
    saved_run(dir.path());
    let out = dir.path().join("out");

    let path = out.join(METADATA_FILE);
    let mut metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    metadata["sampler"]["draws"] = serde_json::json!(999);
    std::fs::write(&path, serde_json::to_string(&metadata).unwrap()).unwrap();

    assert!(matches!(
        ArtifactSet::load(&out),
        Err(ArtifactError::Inconsistent(_))
    ));
}

#[test]
fn edited_hierarchy_is_rejected() {
    let dir = TempDir::new().unwrap();
    saved_run(dir.path());
    let out = dir.path().join("out");

    let path = out.join(HIERARCHY_FILE);
    let text = std::fs::read_to_string(&path).unwrap();
    // Move the first area under another district.
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let fields: Vec<&str> = lines[1].split(',').collect();
    lines[1] = format!("{},{},999", fields[0], fields[1]);
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    assert!(matches!(
        ArtifactSet::load(&out),
        Err(ArtifactError::Inconsistent(_))
    ));
}

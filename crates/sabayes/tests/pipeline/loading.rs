//! Input table failures and cell parsing.

use std::path::Path;

use proptest::prelude::*;
use sabayes::data::{parse_cell, Cell, DEFAULT_SENTINELS};
use sabayes::{DataError, Pipeline, PipelineError};
use tempfile::TempDir;

use crate::common;

fn run_in(dir: &Path) -> Result<sabayes::ArtifactSet, PipelineError> {
    let config = common::config();
    Pipeline::new(&config).with_base_dir(dir).run()
}

/// Rewrite `file` in `dir` through `edit`.
fn edit_table(dir: &Path, file: &str, edit: impl FnOnce(String) -> String) {
    let path = dir.join(file);
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, edit(text)).unwrap();
}

#[test]
fn missing_table_names_the_table() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    std::fs::remove_file(dir.path().join("g37.csv")).unwrap();

    match run_in(dir.path()) {
        Err(PipelineError::Data(DataError::MissingTable { table, path })) => {
            assert_eq!(table, "g37");
            assert!(path.ends_with("g37.csv"));
        }
        other => panic!("expected a missing table, got {other:?}"),
    }
}

#[test]
fn renamed_column_is_schema_drift() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    edit_table(dir.path(), "g37.csv", |text| {
        text.replacen("Total_dwellings", "Total_private_dwellings", 1)
    });

    match run_in(dir.path()) {
        Err(PipelineError::Data(DataError::SchemaDrift { table, missing })) => {
            assert_eq!(table, "g37");
            assert_eq!(missing, vec!["Total_dwellings".to_string()]);
        }
        other => panic!("expected schema drift, got {other:?}"),
    }
}

#[test]
fn repeated_area_code_is_rejected() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    edit_table(dir.path(), "g37.csv", |text| text + "10001,5,50\n");

    match run_in(dir.path()) {
        Err(PipelineError::Data(DataError::DuplicateCode { table, code })) => {
            assert_eq!(table, "g37");
            assert_eq!(code, "10001");
        }
        other => panic!("expected a duplicate code, got {other:?}"),
    }
}

#[test]
fn fully_suppressed_outcome_cannot_be_imputed() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    edit_table(dir.path(), "g02.csv", |text| {
        let mut lines = text.lines();
        let mut out = format!("{}\n", lines.next().unwrap());
        for line in lines {
            let mut fields: Vec<&str> = line.rsplitn(2, ',').collect();
            fields[0] = "np";
            out.push_str(&format!("{},{}\n", fields[1], fields[0]));
        }
        out
    });

    match run_in(dir.path()) {
        Err(PipelineError::Data(DataError::EmptyColumn { column })) => {
            assert_eq!(column, "median_rent");
        }
        other => panic!("expected an empty column, got {other:?}"),
    }
}

#[test]
fn disjoint_tables_leave_nothing_to_merge() {
    let dir = TempDir::new().unwrap();
    common::write_tables(dir.path());
    std::fs::write(
        dir.path().join("g37.csv"),
        "SA1_CODE_2021,Rented,Total_dwellings\n39999,10,40\n",
    )
    .unwrap();

    assert!(matches!(
        run_in(dir.path()),
        Err(PipelineError::Data(DataError::EmptyMerge))
    ));
}

#[test]
fn sentinels_and_garbage_are_told_apart() {
    assert_eq!(parse_cell("..", &DEFAULT_SENTINELS), Cell::Sentinel);
    assert_eq!(parse_cell(" np ", &DEFAULT_SENTINELS), Cell::Sentinel);
    assert_eq!(parse_cell("", &DEFAULT_SENTINELS), Cell::Sentinel);
    assert_eq!(parse_cell("n/a", &DEFAULT_SENTINELS), Cell::Invalid);
    assert_eq!(parse_cell("inf", &DEFAULT_SENTINELS), Cell::Invalid);
    assert_eq!(parse_cell("1,620", &DEFAULT_SENTINELS), Cell::Value(1620.0));
}

proptest! {
    #[test]
    fn grouped_integers_parse(n in 0u64..10_000_000_000) {
        let digits = n.to_string();
        let mut grouped = String::new();
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        prop_assert_eq!(parse_cell(&grouped, &DEFAULT_SENTINELS), Cell::Value(n as f64));
    }

    #[test]
    fn parsed_values_are_finite(raw in "\\PC{0,12}") {
        if let Cell::Value(v) = parse_cell(&raw, &DEFAULT_SENTINELS) {
            prop_assert!(v.is_finite());
        }
    }
}

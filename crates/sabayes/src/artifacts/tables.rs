//! CSV artifacts: hierarchy, parameter summary and predictions.
//!
//! Floats are written with Rust's shortest round-trip formatting, so a value
//! read back is bit-identical to the one written.

use std::path::Path;

use sabayes_core::{Hierarchy, HierarchySpec, ParameterSummary};

use super::ArtifactError;
use crate::pipeline::Prediction;

const SUMMARY_HEADER: [&str; 7] = ["parameter", "mean", "sd", "q025", "q975", "r_hat", "ess"];
const PREDICTION_HEADER: [&str; 4] = ["code", "observed", "fitted", "residual"];

/// Write the area code and its unit code at every level.
pub fn write_hierarchy(path: &Path, hierarchy: &Hierarchy) -> Result<(), ArtifactError> {
    let mut writer = writer(path)?;
    let mut header = vec![hierarchy.area_name.as_str()];
    header.extend(hierarchy.levels.iter().map(|l| l.name.as_str()));
    writer
        .write_record(&header)
        .map_err(|e| ArtifactError::csv(path, e))?;

    for (i, code) in hierarchy.area_codes.iter().enumerate() {
        let mut record = vec![code.as_str()];
        record.extend((0..hierarchy.depth()).map(|l| hierarchy.unit_code(l, i)));
        writer
            .write_record(&record)
            .map_err(|e| ArtifactError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ArtifactError::io(path, e))
}

/// Rebuild the hierarchy from its CSV and check it against `spec`.
pub fn read_hierarchy(path: &Path, spec: &HierarchySpec) -> Result<Hierarchy, ArtifactError> {
    let rows = read_rows(path)?;
    let (header, rows) = rows
        .split_first()
        .ok_or_else(|| ArtifactError::format("hierarchy CSV", path, "missing header"))?;

    let expected: Vec<&str> = std::iter::once(spec.area.name.as_str())
        .chain(spec.levels.iter().map(|l| l.name.as_str()))
        .collect();
    if header.iter().map(String::as_str).ne(expected.iter().copied()) {
        return Err(ArtifactError::Inconsistent(format!(
            "hierarchy columns {header:?} do not match levels {expected:?}"
        )));
    }

    let codes: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    let hierarchy = Hierarchy::extract(spec, &codes)?;
    for (i, row) in rows.iter().enumerate() {
        if row.len() != expected.len() {
            return Err(ArtifactError::format(
                "hierarchy CSV",
                path,
                format!("row {} has {} columns", i + 1, row.len()),
            ));
        }
        for l in 0..hierarchy.depth() {
            if row[l + 1] != hierarchy.unit_code(l, i) {
                return Err(ArtifactError::Inconsistent(format!(
                    "area '{}' is listed under {} '{}' but its code implies '{}'",
                    row[0],
                    spec.levels[l].name,
                    row[l + 1],
                    hierarchy.unit_code(l, i)
                )));
            }
        }
    }
    Ok(hierarchy)
}

/// Write one row per parameter.
pub fn write_summary(path: &Path, parameters: &[ParameterSummary]) -> Result<(), ArtifactError> {
    let mut writer = writer(path)?;
    writer
        .write_record(SUMMARY_HEADER)
        .map_err(|e| ArtifactError::csv(path, e))?;
    for p in parameters {
        writer
            .write_record([
                p.name.clone(),
                p.mean.to_string(),
                p.sd.to_string(),
                p.q025.to_string(),
                p.q975.to_string(),
                p.r_hat.to_string(),
                p.ess.to_string(),
            ])
            .map_err(|e| ArtifactError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ArtifactError::io(path, e))
}

/// Read the rows written by [`write_summary`].
pub fn read_summary(path: &Path) -> Result<Vec<ParameterSummary>, ArtifactError> {
    let rows = read_rows(path)?;
    let body = check_header(path, "summary CSV", &rows, &SUMMARY_HEADER)?;
    body.iter()
        .map(|row| {
            let v = parse_floats(path, "summary CSV", &row[1..])?;
            Ok(ParameterSummary {
                name: row[0].clone(),
                mean: v[0],
                sd: v[1],
                q025: v[2],
                q975: v[3],
                r_hat: v[4],
                ess: v[5],
            })
        })
        .collect()
}

/// Write one row per area.
pub fn write_predictions(path: &Path, predictions: &[Prediction]) -> Result<(), ArtifactError> {
    let mut writer = writer(path)?;
    writer
        .write_record(PREDICTION_HEADER)
        .map_err(|e| ArtifactError::csv(path, e))?;
    for p in predictions {
        writer
            .write_record([
                p.code.clone(),
                p.observed.to_string(),
                p.fitted.to_string(),
                p.residual.to_string(),
            ])
            .map_err(|e| ArtifactError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ArtifactError::io(path, e))
}

/// Read the rows written by [`write_predictions`].
pub fn read_predictions(path: &Path) -> Result<Vec<Prediction>, ArtifactError> {
    let rows = read_rows(path)?;
    let body = check_header(path, "predictions CSV", &rows, &PREDICTION_HEADER)?;
    body.iter()
        .map(|row| {
            let v = parse_floats(path, "predictions CSV", &row[1..])?;
            Ok(Prediction {
                code: row[0].clone(),
                observed: v[0],
                fitted: v[1],
                residual: v[2],
            })
        })
        .collect()
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>, ArtifactError> {
    csv::Writer::from_path(path).map_err(|e| ArtifactError::csv(path, e))
}

/// All records including the header, as strings.
fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, ArtifactError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| ArtifactError::csv(path, e))?;
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| ArtifactError::csv(path, e))
        })
        .collect()
}

fn check_header<'a>(
    path: &Path,
    what: &'static str,
    rows: &'a [Vec<String>],
    header: &[&str],
) -> Result<&'a [Vec<String>], ArtifactError> {
    match rows.split_first() {
        Some((first, body)) if first.iter().map(String::as_str).eq(header.iter().copied()) => {
            Ok(body)
        }
        _ => Err(ArtifactError::format(
            what,
            path,
            format!("expected header {}", header.join(",")),
        )),
    }
}

fn parse_floats(path: &Path, what: &'static str, cells: &[String]) -> Result<Vec<f64>, ArtifactError> {
    cells
        .iter()
        .map(|cell| {
            cell.parse::<f64>()
                .map_err(|_| ArtifactError::format(what, path, format!("bad number '{cell}'")))
        })
        .collect()
}

//! CSV table loading with schema validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ::csv::{ReaderBuilder, StringRecord, Trim};

use super::{CentroidSource, Column, DataError, RawTable, TableSchema};

/// Classification of one raw cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    /// A finite number.
    Value(f64),
    /// A configured missing-value marker.
    Sentinel,
    /// Anything else; read as missing and counted.
    Invalid,
}

impl Cell {
    /// The numeric value, NaN when missing.
    pub fn value(self) -> f64 {
        match self {
            Cell::Value(v) => v,
            Cell::Sentinel | Cell::Invalid => f64::NAN,
        }
    }
}

/// Classify a raw cell.
///
/// Surrounding whitespace and thousands separators are ignored, so
/// `" 1,234 "` reads as 1234.
pub fn parse_cell<S: AsRef<str>>(raw: &str, sentinels: &[S]) -> Cell {
    let trimmed = raw.trim();
    if sentinels.iter().any(|s| s.as_ref() == trimmed) {
        return Cell::Sentinel;
    }
    let cleaned: String;
    let text = if trimmed.contains(',') {
        cleaned = trimmed.replace(',', "");
        cleaned.as_str()
    } else {
        trimmed
    };
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Value(v),
        _ => Cell::Invalid,
    }
}

/// Load one table according to its schema.
///
/// Rows with an empty code (footnotes, totals) are skipped. Every schema
/// column must be present in the header.
pub fn load_table<S: AsRef<str>>(
    schema: &TableSchema,
    base_dir: &Path,
    sentinels: &[S],
) -> Result<RawTable, DataError> {
    let path = schema.resolve(base_dir);
    if !path.is_file() {
        return Err(DataError::MissingTable {
            table: schema.id.clone(),
            path,
        });
    }

    let mut reader = open(&path)?;
    let headers = reader
        .headers()
        .map_err(|source| csv_error(&path, source))?
        .clone();

    let mut missing = Vec::new();
    let code_index = column_index(&headers, &schema.code_column);
    if code_index.is_none() {
        missing.push(schema.code_column.clone());
    }
    let field_indices: Vec<Option<usize>> = schema
        .fields
        .iter()
        .map(|f| column_index(&headers, &f.column))
        .collect();
    for (field, index) in schema.fields.iter().zip(&field_indices) {
        if index.is_none() {
            missing.push(field.column.clone());
        }
    }
    let code_index = match code_index {
        Some(i) if missing.is_empty() => i,
        _ => {
            return Err(DataError::SchemaDrift {
                table: schema.id.clone(),
                missing,
            })
        }
    };
    let field_indices: Vec<usize> = field_indices.into_iter().flatten().collect();

    let mut codes = Vec::new();
    let mut seen = HashSet::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); schema.fields.len()];
    let mut coerced = 0usize;
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|source| csv_error(&path, source))?;
        let code = record.get(code_index).unwrap_or("").trim();
        if code.is_empty() {
            skipped += 1;
            continue;
        }
        if !seen.insert(code.to_string()) {
            return Err(DataError::DuplicateCode {
                table: schema.id.clone(),
                code: code.to_string(),
            });
        }
        codes.push(code.to_string());

        for (column, &index) in values.iter_mut().zip(&field_indices) {
            let raw = record.get(index).unwrap_or("");
            let cell = parse_cell(raw, sentinels);
            if cell == Cell::Invalid {
                coerced += 1;
                tracing::debug!(
                    table = %schema.id,
                    code,
                    value = raw,
                    "Non-numeric cell read as missing"
                );
            }
            column.push(cell.value());
        }
    }

    if skipped > 0 {
        tracing::debug!(table = %schema.id, skipped, "Skipped rows without an area code");
    }
    tracing::info!(
        table = %schema.id,
        rows = codes.len(),
        fields = schema.fields.len(),
        coerced,
        "Loaded table"
    );

    let columns = schema
        .fields
        .iter()
        .zip(values)
        .map(|(field, values)| Column::new(field.name.clone(), values))
        .collect();

    Ok(RawTable {
        id: schema.id.clone(),
        codes,
        columns,
        coerced,
    })
}

/// Read `(x, y)` centroids for `codes`, in the same order.
///
/// Every code needs a row with two finite coordinates.
pub fn load_centroids(
    source: &CentroidSource,
    base_dir: &Path,
    codes: &[String],
) -> Result<Vec<(f64, f64)>, DataError> {
    let path = source.resolve(base_dir);
    if !path.is_file() {
        return Err(DataError::MissingTable {
            table: "centroids".to_string(),
            path,
        });
    }

    let mut reader = open(&path)?;
    let headers = reader
        .headers()
        .map_err(|source| csv_error(&path, source))?
        .clone();
    let indices = [
        column_index(&headers, &source.code_column),
        column_index(&headers, &source.x_column),
        column_index(&headers, &source.y_column),
    ];
    let [Some(code_index), Some(x_index), Some(y_index)] = indices else {
        let missing = [&source.code_column, &source.x_column, &source.y_column]
            .into_iter()
            .zip(indices)
            .filter(|(_, index)| index.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        return Err(DataError::SchemaDrift {
            table: "centroids".to_string(),
            missing,
        });
    };

    let no_sentinels: [&str; 0] = [];
    let mut points = std::collections::HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|source| csv_error(&path, source))?;
        let code = record.get(code_index).unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }
        let x = parse_cell(record.get(x_index).unwrap_or(""), &no_sentinels);
        let y = parse_cell(record.get(y_index).unwrap_or(""), &no_sentinels);
        if let (Cell::Value(x), Cell::Value(y)) = (x, y) {
            points.insert(code.to_string(), (x, y));
        }
    }

    codes
        .iter()
        .map(|code| {
            points
                .get(code)
                .copied()
                .ok_or_else(|| DataError::MissingCentroid { code: code.clone() })
        })
        .collect()
}

fn open(path: &Path) -> Result<::csv::Reader<std::fs::File>, DataError> {
    ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_path(path)
        .map_err(|source| csv_error(path, source))
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn csv_error(path: &Path, source: ::csv::Error) -> DataError {
    DataError::Csv {
        path: PathBuf::from(path),
        source,
    }
}

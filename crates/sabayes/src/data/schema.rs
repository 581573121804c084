//! Declarative descriptions of input tables and derived columns.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Cell values treated as missing. ABS tables use `..` and `np` for
/// suppressed or not-published cells.
pub const DEFAULT_SENTINELS: [&str; 4] = ["..", "np", "-", ""];

fn default_schema_version() -> u32 {
    1
}

/// Maps one source column onto a semantic field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Semantic name used everywhere downstream.
    pub name: String,
    /// Column header in the source file.
    pub column: String,
}

impl FieldSpec {
    /// Create a field mapping.
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

/// Versioned mapping of one input CSV.
///
/// Loading fails with [`SchemaDrift`](super::DataError::SchemaDrift) when
/// the file no longer carries every column listed here, so that a renamed
/// upstream column is caught rather than silently read as missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Short identifier used in messages.
    pub id: String,
    /// CSV path; relative paths are resolved against the config directory.
    pub file: PathBuf,
    /// Header of the area-code column.
    pub code_column: String,
    /// Fields to read.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Schema revision, bumped whenever the mapping changes.
    #[serde(default = "default_schema_version")]
    pub version: u32,
}

impl TableSchema {
    /// Create a schema with no fields.
    pub fn new(
        id: impl Into<String>,
        file: impl Into<PathBuf>,
        code_column: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            code_column: code_column.into(),
            fields: Vec::new(),
            version: default_schema_version(),
        }
    }

    /// Add a field mapping.
    pub fn field(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name, column));
        self
    }

    /// Path of the file, joined onto `base_dir` when relative.
    pub fn resolve(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.file)
    }
}

/// A ratio computed from other fields:
///
/// ```text
/// value = scale · Σ numerator / (Σ denominator + denominator_offset)
/// ```
///
/// A missing input or a non-finite result leaves the cell missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    /// Name of the new field.
    pub name: String,
    /// Fields summed into the numerator.
    pub numerator: Vec<String>,
    /// Fields summed into the denominator.
    pub denominator: Vec<String>,
    /// Multiplier applied to the ratio (e.g. 100 for percentages).
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Added to the denominator sum.
    #[serde(default)]
    pub denominator_offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl DerivedColumn {
    /// `numerator / denominator` with unit scale and no offset.
    pub fn ratio(
        name: impl Into<String>,
        numerator: &[&str],
        denominator: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            numerator: numerator.iter().map(|s| s.to_string()).collect(),
            denominator: denominator.iter().map(|s| s.to_string()).collect(),
            scale: 1.0,
            denominator_offset: 0.0,
        }
    }

    /// Set the multiplier.
    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the denominator offset.
    pub fn offset(mut self, offset: f64) -> Self {
        self.denominator_offset = offset;
        self
    }

    /// Evaluate one row from the summed inputs.
    pub fn evaluate(&self, numerator: f64, denominator: f64) -> f64 {
        let value = self.scale * numerator / (denominator + self.denominator_offset);
        if value.is_finite() {
            value
        } else {
            f64::NAN
        }
    }
}

/// Optional table of area centroids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentroidSource {
    /// CSV path; relative paths are resolved against the config directory.
    pub file: PathBuf,
    /// Header of the area-code column.
    #[serde(default = "default_code_column")]
    pub code_column: String,
    /// Header of the x (easting or longitude) column.
    #[serde(default = "default_x_column")]
    pub x_column: String,
    /// Header of the y (northing or latitude) column.
    #[serde(default = "default_y_column")]
    pub y_column: String,
}

fn default_code_column() -> String {
    "code".to_string()
}

fn default_x_column() -> String {
    "x".to_string()
}

fn default_y_column() -> String {
    "y".to_string()
}

impl CentroidSource {
    /// Centroids in `file` with `code,x,y` headers.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            code_column: default_code_column(),
            x_column: default_x_column(),
            y_column: default_y_column(),
        }
    }

    /// Path of the file, joined onto `base_dir` when relative.
    pub fn resolve(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.file)
    }
}

fn resolve(base_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    }
}

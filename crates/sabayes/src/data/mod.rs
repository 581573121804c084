//! Loading per-area census tables into one model-ready table.
//!
//! Each input CSV is described by a [`TableSchema`] that maps its source
//! column names onto semantic field names. Tables are validated against
//! their schema, inner-merged on the area code, extended with derived ratio
//! columns and finally median-imputed:
//!
//! ```text
//! TableSchema ──► load_table ──► RawTable ─┐
//! TableSchema ──► load_table ──► RawTable ─┼─► merge_tables ──► AreaTable
//!                                     ...  ┘        │ derive, impute
//!                                                   ▼
//!                                         model columns (finite)
//! ```

mod csv;
mod merge;
mod schema;

pub use self::csv::{load_centroids, load_table, parse_cell, Cell};
pub use merge::{merge_tables, AreaTable, ImputedColumn};
pub use schema::{CentroidSource, DerivedColumn, FieldSpec, TableSchema, DEFAULT_SENTINELS};

use std::path::PathBuf;

/// One numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Semantic field name.
    pub name: String,
    /// One value per row; missing cells are NaN.
    pub values: Vec<f64>,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of missing (non-finite) cells.
    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }
}

/// A single table as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Schema id.
    pub id: String,
    /// Trimmed area codes, in file order.
    pub codes: Vec<String>,
    /// One column per schema field.
    pub columns: Vec<Column>,
    /// Cells that were neither numbers nor sentinels.
    pub coerced: usize,
}

impl RawTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Errors raised while loading and preparing input tables.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// A configured table file does not exist.
    #[error("table '{table}' not found at {}", path.display())]
    MissingTable {
        /// Schema id.
        table: String,
        /// Resolved file path.
        path: PathBuf,
    },

    /// The table header lacks columns its schema expects.
    #[error("table '{table}' is missing expected columns: {}", missing.join(", "))]
    SchemaDrift {
        /// Schema id.
        table: String,
        /// Source column names that were not found.
        missing: Vec<String>,
    },

    /// The same area code appears twice in one table.
    #[error("table '{table}' lists area '{code}' more than once")]
    DuplicateCode {
        /// Schema id.
        table: String,
        /// Offending code.
        code: String,
    },

    /// Two tables (or a table and a derived column) define the same field.
    #[error("field '{field}' is defined by both '{first}' and '{second}'")]
    DuplicateField {
        /// Field name.
        field: String,
        /// First definition.
        first: String,
        /// Second definition.
        second: String,
    },

    /// A field name is referenced but never defined.
    #[error("unknown field '{field}' referenced by {context}")]
    UnknownField {
        /// Field name.
        field: String,
        /// Where it was referenced.
        context: String,
    },

    /// A model column has no finite value to impute from.
    #[error("column '{column}' has no finite values")]
    EmptyColumn {
        /// Field name.
        column: String,
    },

    /// No area code is present in every table.
    #[error("no area is present in every input table")]
    EmptyMerge,

    /// Centroids were configured but an area has none.
    #[error("area '{code}' has no centroid")]
    MissingCentroid {
        /// Area code without a centroid.
        code: String,
    },

    /// The CSV reader failed.
    #[error("failed to read CSV {}: {source}", path.display())]
    Csv {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ::csv::Error,
    },
}

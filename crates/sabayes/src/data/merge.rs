//! Inner merge, derived columns and imputation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use sabayes_core::statistics::impute_median;

use super::{Column, DataError, DerivedColumn, RawTable};

/// Number of cells filled in one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputedColumn {
    /// Field name.
    pub column: String,
    /// Cells replaced by the median.
    pub cells: usize,
}

/// The merged per-area table. One row per area present in every input.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaTable {
    /// Area codes, in the first table's order.
    pub codes: Vec<String>,
    /// All fields of all tables, then derived columns.
    pub columns: Vec<Column>,
    /// Rows of the first table missing from some other table.
    pub dropped: usize,
    /// Non-numeric cells coerced to missing across all tables.
    pub coerced: usize,
}

impl AreaTable {
    /// Number of areas.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no area survived the merge.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Values of field `name`.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Values of field `name`, or an error naming `context`.
    pub fn require(&self, name: &str, context: &str) -> Result<&[f64], DataError> {
        self.column(name).ok_or_else(|| DataError::UnknownField {
            field: name.to_string(),
            context: context.to_string(),
        })
    }

    /// Append a derived column.
    ///
    /// Returns how many of its cells are missing.
    pub fn derive(&mut self, spec: &DerivedColumn) -> Result<usize, DataError> {
        if self.column(&spec.name).is_some() {
            return Err(DataError::DuplicateField {
                field: spec.name.clone(),
                first: "an input table".to_string(),
                second: "a derived column".to_string(),
            });
        }
        let context = format!("derived column '{}'", spec.name);
        let numerator = self.sum_columns(&spec.numerator, &context)?;
        let denominator = self.sum_columns(&spec.denominator, &context)?;

        let values: Vec<f64> = numerator
            .iter()
            .zip(&denominator)
            .map(|(&num, &den)| spec.evaluate(num, den))
            .collect();
        let column = Column::new(spec.name.clone(), values);
        let missing = column.missing();
        tracing::debug!(column = %spec.name, missing, "Derived column");
        self.columns.push(column);
        Ok(missing)
    }

    fn sum_columns(&self, names: &[String], context: &str) -> Result<Vec<f64>, DataError> {
        let mut sum = vec![0.0; self.len()];
        for name in names {
            for (s, v) in sum.iter_mut().zip(self.require(name, context)?) {
                *s += v;
            }
        }
        Ok(sum)
    }

    /// Replace missing cells of each named column with that column's
    /// median.
    pub fn impute(&mut self, names: &[String]) -> Result<Vec<ImputedColumn>, DataError> {
        let mut report = Vec::with_capacity(names.len());
        for name in names {
            let column = self
                .column_mut(name)
                .ok_or_else(|| DataError::UnknownField {
                    field: name.clone(),
                    context: "the model columns".to_string(),
                })?;
            let cells = impute_median(&mut column.values)
                .ok_or_else(|| DataError::EmptyColumn {
                    column: name.clone(),
                })?;
            if cells > 0 {
                tracing::info!(column = %name, cells, "Imputed missing values with the median");
            }
            report.push(ImputedColumn {
                column: name.clone(),
                cells,
            });
        }
        Ok(report)
    }
}

/// Inner-merge tables on their area codes.
///
/// Row order follows the first table. Field names must be unique across
/// tables.
pub fn merge_tables(tables: Vec<RawTable>) -> Result<AreaTable, DataError> {
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for table in &tables {
        for column in &table.columns {
            if let Some(first) = owners.insert(column.name.clone(), table.id.clone()) {
                return Err(DataError::DuplicateField {
                    field: column.name.clone(),
                    first,
                    second: table.id.clone(),
                });
            }
        }
    }

    let Some(first) = tables.first() else {
        return Err(DataError::EmptyMerge);
    };
    let indices: Vec<HashMap<&str, usize>> = tables
        .iter()
        .map(|t| {
            t.codes
                .iter()
                .enumerate()
                .map(|(row, code)| (code.as_str(), row))
                .collect()
        })
        .collect();

    // Row of every kept area in every table.
    let mut rows: Vec<Vec<usize>> = Vec::with_capacity(first.len());
    let mut codes = Vec::with_capacity(first.len());
    for code in &first.codes {
        let located: Option<Vec<usize>> =
            indices.iter().map(|index| index.get(code.as_str()).copied()).collect();
        if let Some(located) = located {
            rows.push(located);
            codes.push(code.clone());
        }
    }
    if codes.is_empty() {
        return Err(DataError::EmptyMerge);
    }
    let dropped = first.len() - codes.len();
    if dropped > 0 {
        tracing::warn!(
            dropped,
            kept = codes.len(),
            "Areas missing from some table were dropped by the merge"
        );
    }

    let mut columns = Vec::new();
    for (t, table) in tables.iter().enumerate() {
        for column in &table.columns {
            let values = rows.iter().map(|r| column.values[r[t]]).collect();
            columns.push(Column::new(column.name.clone(), values));
        }
    }

    Ok(AreaTable {
        codes,
        columns,
        dropped,
        coerced: tables.iter().map(|t| t.coerced).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, codes: &[&str], columns: Vec<Column>) -> RawTable {
        RawTable {
            id: id.to_string(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
            columns,
            coerced: 1,
        }
    }

    fn two_tables() -> Vec<RawTable> {
        vec![
            raw(
                "a",
                &["3", "1", "2", "4"],
                vec![Column::new("rent", vec![30.0, 10.0, 20.0, 40.0])],
            ),
            raw(
                "b",
                &["1", "2", "3"],
                vec![
                    Column::new("renters", vec![1.0, f64::NAN, 3.0]),
                    Column::new("dwellings", vec![10.0, 20.0, 0.0]),
                ],
            ),
        ]
    }

    #[test]
    fn test_inner_merge_keeps_first_order() {
        let table = merge_tables(two_tables()).unwrap();
        assert_eq!(table.codes, vec!["3", "1", "2"]);
        assert_eq!(table.dropped, 1);
        assert_eq!(table.coerced, 2);
        assert_eq!(table.column("rent").unwrap(), &[30.0, 10.0, 20.0]);
        assert_eq!(table.column("dwellings").unwrap(), &[0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_duplicate_field_across_tables() {
        let tables = vec![
            raw("a", &["1"], vec![Column::new("rent", vec![1.0])]),
            raw("b", &["1"], vec![Column::new("rent", vec![2.0])]),
        ];
        match merge_tables(tables) {
            Err(DataError::DuplicateField { field, first, second }) => {
                assert_eq!((field.as_str(), first.as_str(), second.as_str()), ("rent", "a", "b"));
            }
            other => panic!("expected duplicate field, got {other:?}"),
        }
    }

    #[test]
    fn test_disjoint_tables() {
        let tables = vec![
            raw("a", &["1"], vec![Column::new("x", vec![1.0])]),
            raw("b", &["2"], vec![Column::new("y", vec![2.0])]),
        ];
        assert!(matches!(merge_tables(tables), Err(DataError::EmptyMerge)));
        assert!(matches!(merge_tables(Vec::new()), Err(DataError::EmptyMerge)));
    }

    #[test]
    fn test_derive_and_impute() {
        let mut table = merge_tables(two_tables()).unwrap();
        let share = DerivedColumn::ratio("renter_share", &["renters"], &["dwellings"]).scaled(100.0);
        // Row "3" divides by zero, row "2" has a missing numerator.
        assert_eq!(table.derive(&share).unwrap(), 2);
        assert_eq!(table.column("renter_share").unwrap()[1], 10.0);

        let imputed = table
            .impute(&["renter_share".to_string(), "rent".to_string()])
            .unwrap();
        assert_eq!(imputed[0].cells, 2);
        assert_eq!(imputed[1].cells, 0);
        assert_eq!(table.column("renter_share").unwrap(), &[10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_derive_errors() {
        let mut table = merge_tables(two_tables()).unwrap();
        let unknown = DerivedColumn::ratio("x", &["nope"], &["dwellings"]);
        assert!(matches!(
            table.derive(&unknown),
            Err(DataError::UnknownField { ref field, .. }) if field == "nope"
        ));
        let clash = DerivedColumn::ratio("rent", &["renters"], &["dwellings"]);
        assert!(matches!(table.derive(&clash), Err(DataError::DuplicateField { .. })));
    }

    #[test]
    fn test_impute_empty_column() {
        let mut table = merge_tables(vec![raw(
            "a",
            &["1", "2"],
            vec![Column::new("x", vec![f64::NAN, f64::NAN])],
        )])
        .unwrap();
        assert!(matches!(
            table.impute(&["x".to_string()]),
            Err(DataError::EmptyColumn { ref column }) if column == "x"
        ));
    }
}

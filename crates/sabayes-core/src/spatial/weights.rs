//! Sparse row-standardized spatial weights in CSR form.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use super::{KnnGraph, WeightsError};
use crate::math;

/// Tolerance used when checking that rows sum to one.
const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Square `n × n` weights matrix in compressed sparse row layout.
///
/// Column indices within a row are sorted and unique. Rows produced by
/// [`SpatialWeights::from_graph`] hold `1 / dᵢ` for each of the `dᵢ`
/// neighbours of area `i`; an isolated area has an empty row.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialWeights {
    n: usize,
    row_ptr: Vec<usize>,
    col: Vec<usize>,
    val: Vec<f64>,
}

impl SpatialWeights {
    /// Binarize and row-normalize a neighbour graph.
    ///
    /// With `symmetrize`, every directed edge `i → j` also adds `j → i`, so
    /// rows may end up longer than `k`. Duplicate edges collapse to one.
    pub fn from_graph(graph: &KnnGraph, symmetrize: bool) -> Self {
        let n = graph.len();
        let mut edges: Vec<(usize, usize)> = Vec::with_capacity(
            graph.edges().count() * if symmetrize { 2 } else { 1 },
        );
        for (i, j) in graph.edges() {
            edges.push((i, j));
            if symmetrize {
                edges.push((j, i));
            }
        }
        edges.sort_unstable();
        edges.dedup();

        let mut row_ptr = vec![0usize; n + 1];
        for &(i, _) in &edges {
            row_ptr[i + 1] += 1;
        }
        for i in 0..n {
            row_ptr[i + 1] += row_ptr[i];
        }

        let col: Vec<usize> = edges.iter().map(|&(_, j)| j).collect();
        let mut val = vec![0.0; col.len()];
        for i in 0..n {
            let (start, end) = (row_ptr[i], row_ptr[i + 1]);
            if end > start {
                let w = 1.0 / (end - start) as f64;
                val[start..end].fill(w);
            }
        }

        Self {
            n,
            row_ptr,
            col,
            val,
        }
    }

    /// Assemble from `(row, col, value)` triplets, e.g. read back from disk.
    ///
    /// Entries may come in any order; explicit zeros are dropped.
    pub fn from_triplets(
        n: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Result<Self, WeightsError> {
        triplets.retain(|&(_, _, v)| v != 0.0);
        triplets.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0usize; n + 1];
        let mut col = Vec::with_capacity(triplets.len());
        let mut val = Vec::with_capacity(triplets.len());
        for &(i, j, v) in &triplets {
            if i >= n || j >= n {
                return Err(WeightsError::InvalidCsr(format!(
                    "entry ({i}, {j}) outside a {n}×{n} matrix"
                )));
            }
            row_ptr[i + 1] += 1;
            col.push(j);
            val.push(v);
        }
        for i in 0..n {
            row_ptr[i + 1] += row_ptr[i];
        }
        Self::from_csr(n, row_ptr, col, val)
    }

    /// Wrap raw CSR arrays after validating them.
    pub fn from_csr(
        n: usize,
        row_ptr: Vec<usize>,
        col: Vec<usize>,
        val: Vec<f64>,
    ) -> Result<Self, WeightsError> {
        if row_ptr.len() != n + 1 || row_ptr[0] != 0 {
            return Err(WeightsError::InvalidCsr(format!(
                "row pointer must have {} entries starting at 0",
                n + 1
            )));
        }
        if col.len() != val.len() || row_ptr[n] != col.len() {
            return Err(WeightsError::InvalidCsr(format!(
                "row pointer ends at {} but there are {} columns and {} values",
                row_ptr[n],
                col.len(),
                val.len()
            )));
        }
        for i in 0..n {
            if row_ptr[i + 1] < row_ptr[i] {
                return Err(WeightsError::InvalidCsr(format!(
                    "row pointer decreases at row {i}"
                )));
            }
            let cols = &col[row_ptr[i]..row_ptr[i + 1]];
            if cols.iter().any(|&j| j >= n) {
                return Err(WeightsError::InvalidCsr(format!(
                    "row {i} has a column index ≥ {n}"
                )));
            }
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(WeightsError::InvalidCsr(format!(
                    "row {i} has unsorted or duplicate columns"
                )));
            }
        }
        if let Some(v) = val.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(WeightsError::InvalidCsr(format!(
                "weight {v} is negative or not finite"
            )));
        }
        Ok(Self {
            n,
            row_ptr,
            col,
            val,
        })
    }

    /// Number of areas (rows and columns).
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.col.len()
    }

    /// Number of neighbours of area `i`.
    #[inline]
    pub fn degree(&self, i: usize) -> usize {
        self.row_ptr[i + 1] - self.row_ptr[i]
    }

    /// Column indices and weights of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col[range.clone()], &self.val[range])
    }

    /// Sum of row `i`.
    pub fn row_sum(&self, i: usize) -> f64 {
        self.row(i).1.iter().sum()
    }

    /// `(W x)ᵢ` for a single row.
    #[inline]
    pub fn row_dot(&self, i: usize, x: &[f64]) -> f64 {
        let (cols, vals) = self.row(i);
        cols.iter().zip(vals).map(|(&j, &w)| w * x[j]).sum()
    }

    /// Sparse matrix-vector product `W x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.n);
        (0..self.n).map(|i| self.row_dot(i, x)).collect()
    }

    /// `Wᵀ`, still in CSR layout.
    pub fn transpose(&self) -> Self {
        let n = self.n;
        let mut row_ptr = vec![0usize; n + 1];
        for &j in &self.col {
            row_ptr[j + 1] += 1;
        }
        for i in 0..n {
            row_ptr[i + 1] += row_ptr[i];
        }
        let mut next = row_ptr.clone();
        let mut col = vec![0usize; self.nnz()];
        let mut val = vec![0.0; self.nnz()];
        // Rows are visited in order, so each transposed row comes out sorted.
        for i in 0..n {
            let (cols, vals) = self.row(i);
            for (&j, &w) in cols.iter().zip(vals) {
                col[next[j]] = i;
                val[next[j]] = w;
                next[j] += 1;
            }
        }
        Self {
            n,
            row_ptr,
            col,
            val,
        }
    }

    /// Whether entry `(i, j)` is stored.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.row(i).0.binary_search(&j).is_ok()
    }

    /// Areas with no neighbour at all.
    pub fn isolated_count(&self) -> usize {
        (0..self.n).filter(|&i| self.degree(i) == 0).count()
    }

    /// Every non-empty row sums to one.
    pub fn is_row_stochastic(&self) -> bool {
        (0..self.n).all(|i| {
            self.degree(i) == 0 || math::abs(self.row_sum(i) - 1.0) < ROW_SUM_TOLERANCE
        })
    }

    /// `(i, j)` is stored exactly when `(j, i)` is.
    pub fn is_symmetric_structure(&self) -> bool {
        (0..self.n).all(|i| self.row(i).0.iter().all(|&j| self.contains(j, i)))
    }

    /// Stored entries as `(row, col, value)`, row-major.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n).flat_map(move |i| {
            let (cols, vals) = self.row(i);
            cols.iter().zip(vals).map(move |(&j, &w)| (i, j, w))
        })
    }

    /// `tr(W²) = Σᵢⱼ Wᵢⱼ Wⱼᵢ`.
    pub fn trace_of_square(&self) -> f64 {
        self.triplets()
            .map(|(i, j, w)| {
                let (cols, vals) = self.row(j);
                cols.binary_search(&i).map(|pos| w * vals[pos]).unwrap_or(0.0)
            })
            .sum()
    }

    /// `tr(W)`; zero unless the matrix was loaded with self-loops.
    pub fn trace(&self) -> f64 {
        (0..self.n)
            .map(|i| {
                let (cols, vals) = self.row(i);
                cols.binary_search(&i).map(|pos| vals[pos]).unwrap_or(0.0)
            })
            .sum()
    }
}

//! Tabulated log-determinants for the proper CAR prior.
//!
//! The CAR density needs `log det(D − ρA) = log det(D) + log det(I − ρW)`
//! with `W = D⁻¹A`. Only the second term depends on ρ, and ρ is sampled on
//! a fixed grid, so it is computed once per run for every grid point.
//!
//! Two methods:
//!
//! - **Exact**: `W` is similar to the symmetric `D^{-1/2} A D^{-1/2}`, whose
//!   real eigenvalues λ give `Σ ln(1 − ρλ)`. Dense, so only used for small n.
//! - **Series** (Barry & Pace, 1999): `log det(I − ρW) = −Σₖ ρᵏ tr(Wᵏ)/k`.
//!   `tr(W)` and `tr(W²)` are exact; higher traces use Hutchinson's
//!   estimator `E[zᵀWᵏz]` over Rademacher probes `z`, with sparse products
//!   only. The truncated tail is approximated geometrically.

use alloc::vec;
use alloc::vec::Vec;

use nalgebra::{DMatrix, SymmetricEigen};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::SpatialWeights;
use crate::constants::{EXACT_LOGDET_MAX_N, LOGDET_PROBES, LOGDET_SERIES_ORDER};
use crate::math;

/// How the table was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDetMethod {
    /// Eigenvalues of the symmetrized weights.
    Exact,
    /// Stochastic trace power series.
    Series,
}

/// `log det(I − ρW)` on the grid `ρ_g = (g + ½) / G`, `g = 0..G`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDetTable {
    /// Grid points, strictly inside (0, 1).
    pub rho: Vec<f64>,
    /// Log-determinant at each grid point.
    pub logdet: Vec<f64>,
    /// Method used.
    pub method: LogDetMethod,
}

/// Midpoint grid of `points` values in (0, 1).
pub fn rho_grid(points: usize) -> Vec<f64> {
    (0..points)
        .map(|g| (g as f64 + 0.5) / points as f64)
        .collect()
}

impl LogDetTable {
    /// Pick the exact method for small symmetric graphs, the series otherwise.
    pub fn build(weights: &SpatialWeights, points: usize, seed: u64) -> Self {
        if weights.n() <= EXACT_LOGDET_MAX_N && weights.is_symmetric_structure() {
            Self::exact(weights, points)
        } else {
            Self::series(weights, points, LOGDET_PROBES, LOGDET_SERIES_ORDER, seed)
        }
    }

    /// Exact table from the eigenvalues of `D^{-1/2} A D^{-1/2}`.
    ///
    /// The binary adjacency `A` is read off the sparsity pattern of `W`,
    /// which must be structurally symmetric.
    pub fn exact(weights: &SpatialWeights, points: usize) -> Self {
        let eigenvalues = normalized_adjacency_eigenvalues(weights);
        let rho = rho_grid(points);
        let logdet = rho
            .iter()
            .map(|&r| eigenvalues.iter().map(|&l| math::ln_1p(-r * l)).sum())
            .collect();
        Self {
            rho,
            logdet,
            method: LogDetMethod::Exact,
        }
    }

    /// Series approximation with `probes` Rademacher vectors and `order`
    /// terms.
    pub fn series(
        weights: &SpatialWeights,
        points: usize,
        probes: usize,
        order: usize,
        seed: u64,
    ) -> Self {
        let traces = estimate_traces(weights, probes, order.max(2), seed);
        let k_max = traces.len();
        let t_last = traces[k_max - 1];

        let rho = rho_grid(points);
        let logdet = rho
            .iter()
            .map(|&r| {
                let mut power = 1.0;
                let mut sum = 0.0;
                for (k, &t) in traces.iter().enumerate() {
                    power *= r;
                    sum += power * t / (k + 1) as f64;
                }
                // Tail Σ_{k>K} ρᵏ t_K / k ≈ t_K ρ^{K+1} / ((K+1)(1 − ρ))
                let tail = t_last * power * r / ((k_max + 1) as f64 * (1.0 - r));
                -(sum + tail)
            })
            .collect();

        Self {
            rho,
            logdet,
            method: LogDetMethod::Series,
        }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.rho.len()
    }

    /// Check if the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.rho.is_empty()
    }

    /// Linear interpolation at an arbitrary ρ, clamped to the grid ends.
    pub fn interpolate(&self, rho: f64) -> f64 {
        let n = self.rho.len();
        if n == 0 {
            return 0.0;
        }
        if rho <= self.rho[0] {
            return self.logdet[0];
        }
        if rho >= self.rho[n - 1] {
            return self.logdet[n - 1];
        }
        let hi = self.rho.partition_point(|&r| r < rho);
        let lo = hi - 1;
        let t = (rho - self.rho[lo]) / (self.rho[hi] - self.rho[lo]);
        self.logdet[lo] + t * (self.logdet[hi] - self.logdet[lo])
    }
}

/// Eigenvalues of `D^{-1/2} A D^{-1/2}`; isolated areas contribute 0.
fn normalized_adjacency_eigenvalues(weights: &SpatialWeights) -> Vec<f64> {
    let n = weights.n();
    if n == 0 {
        return Vec::new();
    }
    let inv_sqrt_degree: Vec<f64> = (0..n)
        .map(|i| match weights.degree(i) {
            0 => 0.0,
            d => 1.0 / math::sqrt(d as f64),
        })
        .collect();

    let mut m = DMatrix::<f64>::zeros(n, n);
    for (i, j, _) in weights.triplets() {
        m[(i, j)] = inv_sqrt_degree[i] * inv_sqrt_degree[j];
    }
    SymmetricEigen::new(m).eigenvalues.iter().copied().collect()
}

/// `tr(Wᵏ)` for `k = 1..=order`.
fn estimate_traces(weights: &SpatialWeights, probes: usize, order: usize, seed: u64) -> Vec<f64> {
    let n = weights.n();
    let mut traces = vec![0.0; order];
    if n == 0 {
        return traces;
    }

    if probes > 0 {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for _ in 0..probes {
            let z: Vec<f64> = (0..n)
                .map(|_| if rng.random::<bool>() { 1.0 } else { -1.0 })
                .collect();
            let mut v = z.clone();
            for t in traces.iter_mut() {
                v = weights.mul_vec(&v);
                *t += z.iter().zip(&v).map(|(a, b)| a * b).sum::<f64>();
            }
        }
        for t in traces.iter_mut() {
            *t /= probes as f64;
        }
    }

    traces[0] = weights.trace();
    traces[1] = weights.trace_of_square();
    traces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Coordinates, KnnGraph};

    fn random_weights(n: usize, k: usize, seed: u64) -> SpatialWeights {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let values: Vec<f64> = (0..2 * n).map(|_| rng.random::<f64>()).collect();
        let coords = Coordinates::new(2, values).unwrap();
        let graph = KnnGraph::build(&coords, k, None).unwrap();
        SpatialWeights::from_graph(&graph, true)
    }

    #[test]
    fn test_grid_is_strictly_inside_unit_interval() {
        let grid = rho_grid(200);
        assert_eq!(grid.len(), 200);
        assert!(grid[0] > 0.0);
        assert!(grid[199] < 1.0);
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_exact_two_area_closed_form() {
        // W = [[0,1],[1,0]] has eigenvalues ±1, so log det(I − ρW) = ln(1 − ρ²).
        let w = SpatialWeights::from_triplets(2, vec![(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        let table = LogDetTable::exact(&w, 50);
        assert_eq!(table.method, LogDetMethod::Exact);
        for (&r, &ld) in table.rho.iter().zip(&table.logdet) {
            assert!((ld - math::ln_1p(-r * r)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_isolated_areas_contribute_nothing() {
        let w = SpatialWeights::from_triplets(3, vec![(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        let table = LogDetTable::exact(&w, 10);
        for (&r, &ld) in table.rho.iter().zip(&table.logdet) {
            assert!((ld - math::ln_1p(-r * r)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_series_tracks_exact() {
        let w = random_weights(300, 4, 11);
        let exact = LogDetTable::exact(&w, 20);
        let series = LogDetTable::series(&w, 20, 30, 40, 5);
        assert_eq!(series.method, LogDetMethod::Series);
        for g in 0..10 {
            // ρ up to 0.475
            let diff = (exact.logdet[g] - series.logdet[g]).abs();
            assert!(
                diff < 0.5 + 0.02 * exact.logdet[g].abs(),
                "rho={} exact={} series={}",
                exact.rho[g],
                exact.logdet[g],
                series.logdet[g]
            );
        }
    }

    #[test]
    fn test_logdet_decreases_in_rho() {
        let w = random_weights(120, 3, 3);
        let table = LogDetTable::build(&w, 40, 1);
        assert_eq!(table.method, LogDetMethod::Exact);
        assert!(table.logdet.windows(2).all(|p| p[1] <= p[0] + 1e-12));
        assert!(table.logdet.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_interpolate() {
        let w = random_weights(50, 3, 9);
        let table = LogDetTable::exact(&w, 10);
        assert!((table.interpolate(table.rho[3]) - table.logdet[3]).abs() < 1e-12);
        let mid = 0.5 * (table.rho[3] + table.rho[4]);
        let expected = 0.5 * (table.logdet[3] + table.logdet[4]);
        assert!((table.interpolate(mid) - expected).abs() < 1e-12);
        assert_eq!(table.interpolate(0.0), table.logdet[0]);
        assert_eq!(table.interpolate(1.0), table.logdet[9]);
    }
}

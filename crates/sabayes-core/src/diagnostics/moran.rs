//! Global Moran's I.

use serde::{Deserialize, Serialize};

use crate::math;
use crate::spatial::SpatialWeights;

/// Global spatial autocorrelation of one variable under given weights,
/// with the normality-assumption variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoransI {
    /// Observed statistic I.
    pub statistic: f64,
    /// Expectation under no autocorrelation, −1/(n − 1).
    pub expected: f64,
    /// Variance under normality.
    pub variance: f64,
    /// (I − E[I]) / √Var[I].
    pub z_score: f64,
}

impl MoransI {
    /// Compute Moran's I of `values`.
    ///
    /// ```text
    /// I = (n / S₀) Σᵢⱼ wᵢⱼ zᵢ zⱼ / Σᵢ zᵢ²
    /// ```
    ///
    /// Returns `None` with fewer than three areas, no weights, a constant
    /// variable or a length mismatch.
    pub fn compute(values: &[f64], weights: &SpatialWeights) -> Option<Self> {
        let n = values.len();
        if n < 3 || weights.n() != n {
            return None;
        }
        let mean = math::mean(values);
        let z: alloc::vec::Vec<f64> = values.iter().map(|v| v - mean).collect();
        let m2: f64 = z.iter().map(|v| v * v).sum();

        let s0: f64 = weights.triplets().map(|(_, _, w)| w).sum();
        if s0 <= 0.0 || m2 <= 0.0 {
            return None;
        }
        let cross: f64 = weights.triplets().map(|(i, j, w)| w * z[i] * z[j]).sum();
        let nf = n as f64;
        let statistic = nf / s0 * cross / m2;
        let expected = -1.0 / (nf - 1.0);

        // S₁ = ½ Σᵢⱼ (wᵢⱼ + wⱼᵢ)², S₂ = Σᵢ (wᵢ. + w.ᵢ)²
        let transpose = weights.transpose();
        let s1 = 0.5
            * weights
                .triplets()
                .map(|(i, j, w)| {
                    let back = symmetric_entry(&transpose, i, j);
                    math::sq(w + back)
                })
                .chain(transpose.triplets().filter_map(|(i, j, w)| {
                    // Entries present only in the transpose.
                    (!weights.contains(i, j)).then(|| math::sq(w))
                }))
                .sum::<f64>();
        let s2: f64 = (0..n)
            .map(|i| math::sq(weights.row_sum(i) + transpose.row_sum(i)))
            .sum();

        let variance = (nf * nf * s1 - nf * s2 + 3.0 * s0 * s0) / ((nf * nf - 1.0) * s0 * s0)
            - expected * expected;
        let z_score = if variance > 0.0 {
            (statistic - expected) / math::sqrt(variance)
        } else {
            0.0
        };

        Some(Self {
            statistic,
            expected,
            variance,
            z_score,
        })
    }
}

/// `wⱼᵢ` read from the transposed matrix at `(i, j)`.
fn symmetric_entry(transpose: &SpatialWeights, i: usize, j: usize) -> f64 {
    let (cols, vals) = transpose.row(i);
    cols.binary_search(&j).map(|pos| vals[pos]).unwrap_or(0.0)
}

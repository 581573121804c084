//! Column standardization and median imputation.
//!
//! The model is fitted on z-scores: every predictor and the outcome are
//! shifted to zero mean and scaled to unit variance. The [`Standardizer`]
//! remembers the original mean and standard deviation so that fitted values
//! and coefficients can be reported back in original units.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::math;
use crate::statistics::quantile::finite_median;

/// Smallest standard deviation treated as non-degenerate.
const MIN_SD: f64 = 1e-12;

/// Mean and standard deviation of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    /// Original column mean.
    pub mean: f64,
    /// Original column standard deviation (unbiased).
    ///
    /// A constant column keeps `sd = 1` so that standardization only
    /// centres it.
    pub sd: f64,
}

impl Standardizer {
    /// Fit to a column of finite values.
    pub fn fit(values: &[f64]) -> Self {
        let mean = math::mean(values);
        let sd = math::sqrt(math::variance(values));
        Self {
            mean,
            sd: if sd > MIN_SD { sd } else { 1.0 },
        }
    }

    /// Map a value to standardized units.
    #[inline]
    pub fn standardize(&self, value: f64) -> f64 {
        (value - self.mean) / self.sd
    }

    /// Map a standardized value back to original units.
    #[inline]
    pub fn unstandardize(&self, z: f64) -> f64 {
        z * self.sd + self.mean
    }

    /// Standardize a whole column.
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.standardize(v)).collect()
    }

    /// Reverse [`Self::transform`].
    pub fn inverse_transform(&self, z: &[f64]) -> Vec<f64> {
        z.iter().map(|&v| self.unstandardize(v)).collect()
    }
}

/// Replace every non-finite value with the median of the finite ones.
///
/// Returns the number of imputed cells, or `None` if the column has no
/// finite value to take a median from.
pub fn impute_median(values: &mut [f64]) -> Option<usize> {
    let median = finite_median(values)?;
    let mut imputed = 0;
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = median;
            imputed += 1;
        }
    }
    Some(imputed)
}

//! Quantile computation using Type 2 quantiles (inverse empirical CDF with averaging).
//!
//! **Type 2 formula** (for sorted sample x of size n at probability p):
//! ```text
//! h = n * p + 0.5
//! q = (x[floor(h)] + x[ceil(h)]) / 2
//! ```
//!
//! Used for posterior credible intervals and for median imputation.
//!
//! # Input Requirements
//!
//! All input data must be finite (no NaN or infinity values). In debug builds,
//! this is checked via assertions.
//!
//! # Reference
//!
//! Hyndman, R. J. & Fan, Y. (1996). "Sample quantiles in statistical packages."
//! The American Statistician 50(4):361–365.

extern crate alloc;

use alloc::vec::Vec;

use crate::math;

/// Debug assertion that all values in the slice are finite.
#[inline]
fn debug_assert_finite(data: &[f64]) {
    debug_assert!(
        data.iter().all(|x| x.is_finite()),
        "quantile input must be finite (no NaN or infinity)"
    );
}

/// Type 2 floor/ceil indices (0-based, clamped) for probability `p`.
#[inline]
fn type2_indices(n: usize, p: f64) -> (usize, usize) {
    let h = n as f64 * p + 0.5;
    let floor_idx = (math::floor(h) as usize).saturating_sub(1).min(n - 1);
    let ceil_idx = (math::ceil(h) as usize).saturating_sub(1).min(n - 1);
    (floor_idx, ceil_idx)
}

/// Compute a single quantile from a mutable slice using Type 2 quantiles.
///
/// Uses `select_nth_unstable()` for O(n) expected time complexity.
/// The slice is partially reordered as a side effect.
///
/// # Panics
///
/// Panics if `data` is empty or if `p` is outside [0, 1].
pub fn compute_quantile(data: &mut [f64], p: f64) -> f64 {
    assert!(!data.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );
    debug_assert_finite(data);

    let n = data.len();
    if n == 1 {
        return data[0];
    }

    let (floor_idx, ceil_idx) = type2_indices(n, p);
    let cmp = |a: &f64, b: &f64| a.total_cmp(b);

    if floor_idx == ceil_idx {
        let (_, mid, _) = data.select_nth_unstable_by(floor_idx, cmp);
        return *mid;
    }

    // Need both elements - select the larger index first
    let (_, mid, _) = data.select_nth_unstable_by(ceil_idx, cmp);
    let ceil_val = *mid;

    // Select floor only within the left partition - avoids touching ceil position
    let (_, mid, _) = data[..ceil_idx].select_nth_unstable_by(floor_idx, cmp);
    let floor_val = *mid;

    (floor_val + ceil_val) / 2.0
}

/// Compute a quantile from data that is already sorted ascending.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot compute quantile of empty slice");
    debug_assert!(
        sorted.windows(2).all(|w| w[0] <= w[1]),
        "quantile_sorted input must be sorted"
    );
    let (floor_idx, ceil_idx) = type2_indices(sorted.len(), p.clamp(0.0, 1.0));
    (sorted[floor_idx] + sorted[ceil_idx]) / 2.0
}

/// Compute several quantiles with a single sort.
pub fn compute_quantiles(data: &[f64], probs: &[f64]) -> Vec<f64> {
    assert!(!data.is_empty(), "Cannot compute quantiles of empty slice");
    debug_assert_finite(data);
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    probs.iter().map(|&p| quantile_sorted(&sorted, p)).collect()
}

/// Median of the finite values in `data`, or `None` if there are none.
pub fn finite_median(data: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(compute_quantile(&mut finite, 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type2_median_even_and_odd() {
        let mut odd = [3.0, 1.0, 2.0];
        assert_eq!(compute_quantile(&mut odd, 0.5), 2.0);

        let mut even = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(compute_quantile(&mut even, 0.5), 2.5);
    }

    #[test]
    fn test_compute_quantiles_matches_single() {
        let data: Vec<f64> = (0..101).map(|i| i as f64).collect();
        let qs = compute_quantiles(&data, &[0.025, 0.5, 0.975]);
        for (q, p) in qs.iter().zip([0.025, 0.5, 0.975]) {
            let mut copy = data.clone();
            assert_eq!(*q, compute_quantile(&mut copy, p));
        }
        assert_eq!(qs[1], 50.0);
    }

    #[test]
    fn test_finite_median_skips_nan() {
        let data = [1.0, f64::NAN, 3.0, f64::INFINITY, 2.0];
        assert_eq!(finite_median(&data), Some(2.0));
        assert_eq!(finite_median(&[f64::NAN]), None);
    }
}

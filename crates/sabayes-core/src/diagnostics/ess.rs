//! Multi-chain effective sample size.

use alloc::vec::Vec;

use super::split_chains;
use crate::math;

/// Effective sample size of one parameter over `chains`.
///
/// Uses split chains and Geyer's initial monotone sequence estimator: the
/// combined autocorrelation
///
/// ```text
/// ρ̂_t = 1 − (W − mean_c γ̂_c(t)) / var⁺
/// ```
///
/// is summed in adjacent pairs `P_k = ρ̂_2k + ρ̂_2k+1` while the pairs stay
/// positive, each pair capped by the previous one, giving
/// `τ = −1 + 2 Σ P_k` and `ESS = m·n / τ`.
///
/// Autocovariances are computed lag by lag and only as far as the
/// truncation point, so the cost is O(draws × lags) rather than O(draws²).
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let m = halves.len();
    let n = halves.first().map(|h| h.len()).unwrap_or(0);
    if m == 0 || n < 4 {
        return (m * n) as f64;
    }
    let total = (m * n) as f64;
    let nf = n as f64;

    let means: Vec<f64> = halves.iter().map(|h| math::mean(h)).collect();
    // Biased (1/n) autocovariance at lag t, averaged over halves
    let mean_autocov = |t: usize| -> f64 {
        halves
            .iter()
            .zip(&means)
            .map(|(h, &mu)| {
                (0..n - t)
                    .map(|i| (h[i] - mu) * (h[i + t] - mu))
                    .sum::<f64>()
                    / nf
            })
            .sum::<f64>()
            / m as f64
    };

    let gamma0 = mean_autocov(0);
    let within = gamma0 * nf / (nf - 1.0);
    let var_plus = within * (nf - 1.0) / nf + math::variance(&means);
    if var_plus <= 0.0 || !var_plus.is_finite() {
        // No variance, treat as independent
        return total;
    }
    let rho = |t: usize| -> f64 { 1.0 - (within - mean_autocov(t)) / var_plus };

    let mut tau = -1.0;
    let mut previous_pair = f64::INFINITY;
    let mut t = 0;
    while t + 1 < n {
        let rho_even = if t == 0 { 1.0 } else { rho(t) };
        let pair = rho_even + rho(t + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous_pair);
        tau += 2.0 * pair;
        previous_pair = pair;
        t += 2;
    }

    // Antithetic chains can push τ below 1; cap ESS as Stan does.
    let tau = tau.max(core::f64::consts::LN_10 / math::ln(total));
    total / tau
}

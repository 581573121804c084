//! Split potential scale reduction factor.

use alloc::vec::Vec;

use super::split_chains;
use crate::math;

/// Split-R̂ over `chains` (one vector of draws per chain).
///
/// Each chain is halved so that within-chain drift shows up as
/// between-chain disagreement:
///
/// ```text
/// W    = mean of within-half variances
/// B/n  = variance of half means
/// var⁺ = (n − 1)/n · W + B/n
/// R̂    = √(var⁺ / W)
/// ```
///
/// Returns NaN with fewer than two draws per half, 1 for a parameter that
/// never moves, and ∞ when halves are individually constant but disagree.
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let n = halves.first().map(|h| h.len()).unwrap_or(0);
    if halves.len() < 2 || n < 2 {
        return f64::NAN;
    }

    let means: Vec<f64> = halves.iter().map(|h| math::mean(h)).collect();
    let within = math::mean(&halves.iter().map(|h| math::variance(h)).collect::<Vec<_>>());
    let between_over_n = math::variance(&means);

    if within <= 0.0 {
        return if between_over_n <= 0.0 {
            1.0
        } else {
            f64::INFINITY
        };
    }

    let nf = n as f64;
    let var_plus = (nf - 1.0) / nf * within + between_over_n;
    math::sqrt(var_plus / within)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn iid_chains(chains: usize, draws: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..chains)
            .map(|_| (0..draws).map(|_| rng.sample(StandardNormal)).collect())
            .collect()
    }

    #[test]
    fn test_iid_chains_are_near_one() {
        let r = split_r_hat(&iid_chains(4, 1000, 3));
        assert!((r - 1.0).abs() < 0.01, "R̂ = {r}");
    }

    #[test]
    fn test_shifted_chain_is_flagged() {
        let mut chains = iid_chains(4, 500, 5);
        for v in chains[0].iter_mut() {
            *v += 3.0;
        }
        assert!(split_r_hat(&chains) > 1.1);
    }

    #[test]
    fn test_trending_single_chain_is_flagged() {
        let chain: Vec<f64> = (0..400).map(|i| i as f64 / 100.0).collect();
        assert!(split_r_hat(&[chain]) > 1.1);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(split_r_hat(&[vec![1.0, 2.0, 3.0]]).is_nan());
        assert_eq!(split_r_hat(&[vec![2.0; 10], vec![2.0; 10]]), 1.0);
        assert_eq!(split_r_hat(&[vec![1.0; 10], vec![2.0; 10]]), f64::INFINITY);
    }
}

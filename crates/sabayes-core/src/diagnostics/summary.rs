//! Per-parameter posterior summaries and the convergence verdict.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::{effective_sample_size, split_r_hat};
use crate::constants::{CREDIBLE_INTERVAL, DEFAULT_ESS_TARGET, DEFAULT_R_HAT_TARGET};
use crate::math;
use crate::statistics::compute_quantiles;
use crate::trace::PosteriorTrace;

/// Posterior summary of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter name.
    pub name: String,
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation.
    pub sd: f64,
    /// 2.5% quantile.
    pub q025: f64,
    /// 97.5% quantile.
    pub q975: f64,
    /// Split-R̂.
    pub r_hat: f64,
    /// Effective sample size.
    pub ess: f64,
}

/// Thresholds a run must meet to count as converged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceTargets {
    /// Every R̂ must be strictly below this. Default: 1.01.
    pub r_hat: f64,
    /// Every ESS must be strictly above this. Default: 400.
    pub ess: f64,
}

impl Default for ConvergenceTargets {
    fn default() -> Self {
        Self {
            r_hat: DEFAULT_R_HAT_TARGET,
            ess: DEFAULT_ESS_TARGET,
        }
    }
}

impl ConvergenceTargets {
    /// Whether one summary meets both targets. NaN never does.
    pub fn is_met_by(&self, summary: &ParameterSummary) -> bool {
        summary.r_hat < self.r_hat && summary.ess > self.ess
    }
}

/// Overall convergence outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// Every parameter met the targets and no sweep diverged.
    Converged,
    /// Some parameter missed a target.
    NotConverged,
    /// Targets met, but some sweeps diverged.
    Divergent,
}

impl ConvergenceStatus {
    /// Whether the run can be treated as converged.
    pub fn is_converged(self) -> bool {
        self == ConvergenceStatus::Converged
    }
}

/// Convergence verdict over all parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Largest R̂ (NaN if any parameter's R̂ is undefined).
    pub max_r_hat: f64,
    /// Smallest ESS.
    pub min_ess: f64,
    /// Parameters that missed a target.
    pub failing: Vec<String>,
    /// Divergent sweeps over all chains.
    pub divergences: usize,
    /// Verdict.
    pub status: ConvergenceStatus,
    /// Targets that were applied.
    pub targets: ConvergenceTargets,
}

/// Summaries for every parameter plus the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    /// One entry per parameter, in trace order.
    pub parameters: Vec<ParameterSummary>,
    /// Convergence verdict.
    pub convergence: ConvergenceReport,
}

impl TraceSummary {
    /// Summary of parameter `name`.
    pub fn get(&self, name: &str) -> Option<&ParameterSummary> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Summarize one parameter from its per-chain draws.
pub fn summarize_parameter(name: &str, chains: &[Vec<f64>]) -> ParameterSummary {
    let pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    let quantiles = compute_quantiles(&pooled, &[CREDIBLE_INTERVAL.0, CREDIBLE_INTERVAL.1]);
    ParameterSummary {
        name: String::from(name),
        mean: math::mean(&pooled),
        sd: math::sqrt(math::variance(&pooled)),
        q025: quantiles[0],
        q975: quantiles[1],
        r_hat: split_r_hat(chains),
        ess: effective_sample_size(chains),
    }
}

/// Summarize every parameter of `trace` and judge convergence.
///
/// Deterministic: the same trace always yields the same numbers, which is
/// what lets a reloaded trace reproduce a persisted summary.
pub fn summarize_trace(trace: &PosteriorTrace, targets: &ConvergenceTargets) -> TraceSummary {
    let summarize = |p: usize| summarize_parameter(&trace.names()[p], &trace.param_chains(p));

    #[cfg(feature = "parallel")]
    let parameters: Vec<ParameterSummary> = {
        use rayon::prelude::*;
        (0..trace.n_params()).into_par_iter().map(summarize).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let parameters: Vec<ParameterSummary> = (0..trace.n_params()).map(summarize).collect();

    let convergence =
        ConvergenceReport::assess(&parameters, trace.total_divergences(), *targets);
    TraceSummary {
        parameters,
        convergence,
    }
}

impl ConvergenceReport {
    /// Judge already-summarized parameters against `targets`.
    pub fn assess(
        parameters: &[ParameterSummary],
        divergences: usize,
        targets: ConvergenceTargets,
    ) -> Self {
        let max_r_hat = parameters
            .iter()
            .map(|p| p.r_hat)
            .fold(f64::NEG_INFINITY, |acc, r| {
                if r.is_nan() || acc.is_nan() {
                    f64::NAN
                } else {
                    acc.max(r)
                }
            });
        let min_ess = parameters
            .iter()
            .map(|p| p.ess)
            .fold(f64::INFINITY, f64::min);
        let failing: Vec<String> = parameters
            .iter()
            .filter(|p| !targets.is_met_by(p))
            .map(|p| p.name.clone())
            .collect();

        let status = if !failing.is_empty() {
            ConvergenceStatus::NotConverged
        } else if divergences > 0 {
            ConvergenceStatus::Divergent
        } else {
            ConvergenceStatus::Converged
        };

        Self {
            max_r_hat,
            min_ess,
            failing,
            divergences,
            status,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn trace(shift_first_chain: f64, divergences: Vec<usize>) -> PosteriorTrace {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let (chains, draws) = (4, 1000);
        let mut values = Vec::with_capacity(chains * draws * 2);
        for c in 0..chains {
            for _ in 0..draws {
                let a: f64 = rng.sample(StandardNormal);
                let b: f64 = rng.sample(StandardNormal);
                values.push(a + if c == 0 { shift_first_chain } else { 0.0 });
                values.push(10.0 + 2.0 * b);
            }
        }
        PosteriorTrace::new(
            vec!["a".to_string(), "b".to_string()],
            chains,
            draws,
            values,
            divergences,
        )
        .unwrap()
    }

    #[test]
    fn test_well_mixed_trace_converges() {
        let summary = summarize_trace(&trace(0.0, vec![0; 4]), &ConvergenceTargets::default());
        assert_eq!(summary.convergence.status, ConvergenceStatus::Converged);
        assert!(summary.convergence.failing.is_empty());

        let b = summary.get("b").unwrap();
        assert!((b.mean - 10.0).abs() < 0.15);
        assert!((b.sd - 2.0).abs() < 0.15);
        assert!(b.q025 < b.mean && b.mean < b.q975);
        assert!((b.q975 - b.q025 - 4.0 * 1.96).abs() < 0.6);
    }

    #[test]
    fn test_shifted_chain_fails() {
        let summary = summarize_trace(&trace(2.0, vec![0; 4]), &ConvergenceTargets::default());
        assert_eq!(summary.convergence.status, ConvergenceStatus::NotConverged);
        assert_eq!(summary.convergence.failing, vec!["a".to_string()]);
        assert!(summary.convergence.max_r_hat > 1.01);
    }

    #[test]
    fn test_divergences_are_reported() {
        let summary = summarize_trace(&trace(0.0, vec![0, 3, 0, 1]), &ConvergenceTargets::default());
        assert_eq!(summary.convergence.divergences, 4);
        assert_eq!(summary.convergence.status, ConvergenceStatus::Divergent);
        assert!(!summary.convergence.status.is_converged());
    }

    #[test]
    fn test_summary_is_deterministic() {
        let t = trace(0.0, vec![0; 4]);
        let targets = ConvergenceTargets::default();
        assert_eq!(summarize_trace(&t, &targets), summarize_trace(&t.clone(), &targets));
    }

    #[test]
    fn test_nan_r_hat_fails_targets() {
        let summary = summarize_parameter("x", &[vec![1.0, 2.0, 3.0]]);
        assert!(summary.r_hat.is_nan());
        assert!(!ConvergenceTargets::default().is_met_by(&summary));
    }
}

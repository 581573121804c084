//! Convergence diagnostics and posterior summaries.
//!
//! Reference: Gelman et al. (2013), "Bayesian Data Analysis", Ch. 11, and
//! Vehtari et al. (2021) for split-R̂ and the multi-chain ESS.

mod ess;
mod moran;
mod rhat;
mod summary;
mod variance;

pub use ess::effective_sample_size;
pub use moran::MoransI;
pub use rhat::split_r_hat;
pub use summary::{
    summarize_parameter, summarize_trace, ConvergenceReport, ConvergenceStatus,
    ConvergenceTargets, ParameterSummary, TraceSummary,
};
pub use variance::{VarianceComponent, VarianceDecomposition};

use alloc::vec::Vec;

/// Split each chain into its first and second half, dropping the middle
/// draw of odd-length chains.
pub(crate) fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let mut halves = Vec::with_capacity(2 * chains.len());
    for chain in chains {
        let half = chain.len() / 2;
        halves.push(&chain[..half]);
        halves.push(&chain[chain.len() - half..]);
    }
    halves
}

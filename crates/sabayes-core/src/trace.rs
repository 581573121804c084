//! Posterior draws from all chains.

use alloc::string::String;
use alloc::vec::Vec;

use crate::model::ModelError;

/// Immutable posterior trace with layout `[chain][draw][param]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorTrace {
    names: Vec<String>,
    chains: usize,
    draws: usize,
    values: Vec<f64>,
    divergences: Vec<usize>,
}

impl PosteriorTrace {
    /// Wrap a flat buffer of `chains × draws × names.len()` values.
    ///
    /// `divergences` holds one count per chain.
    pub fn new(
        names: Vec<String>,
        chains: usize,
        draws: usize,
        values: Vec<f64>,
        divergences: Vec<usize>,
    ) -> Result<Self, ModelError> {
        let params = names.len();
        let expected = chains * draws * params;
        if values.len() != expected {
            return Err(ModelError::TraceShape {
                chains,
                draws,
                params,
                expected,
                actual: values.len(),
            });
        }
        if divergences.len() != chains {
            return Err(ModelError::DimensionMismatch {
                what: String::from("divergence counts"),
                expected: chains,
                actual: divergences.len(),
            });
        }
        Ok(Self {
            names,
            chains,
            draws,
            values,
            divergences,
        })
    }

    /// Parameter names, in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of chains.
    pub fn n_chains(&self) -> usize {
        self.chains
    }

    /// Draws per chain.
    pub fn n_draws(&self) -> usize {
        self.draws
    }

    /// Number of parameters.
    pub fn n_params(&self) -> usize {
        self.names.len()
    }

    /// Shape `(chains, draws, params)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.chains, self.draws, self.names.len())
    }

    /// The flat buffer.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Divergent sweeps per chain.
    pub fn divergences(&self) -> &[usize] {
        &self.divergences
    }

    /// Divergent sweeps over all chains.
    pub fn total_divergences(&self) -> usize {
        self.divergences.iter().sum()
    }

    /// Column of parameter `name`.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// One value.
    #[inline]
    pub fn value(&self, chain: usize, draw: usize, param: usize) -> f64 {
        self.values[(chain * self.draws + draw) * self.names.len() + param]
    }

    /// Draws of parameter `param` in chain `chain`.
    pub fn chain_draws(&self, param: usize, chain: usize) -> Vec<f64> {
        (0..self.draws)
            .map(|d| self.value(chain, d, param))
            .collect()
    }

    /// Draws of parameter `param`, one vector per chain.
    pub fn param_chains(&self, param: usize) -> Vec<Vec<f64>> {
        (0..self.chains)
            .map(|c| self.chain_draws(param, c))
            .collect()
    }

    /// Draws of parameter `param` pooled over chains.
    pub fn pooled(&self, param: usize) -> Vec<f64> {
        (0..self.chains)
            .flat_map(|c| (0..self.draws).map(move |d| (c, d)))
            .map(|(c, d)| self.value(c, d, param))
            .collect()
    }

    /// Posterior mean of `name` over all draws.
    pub fn mean_of(&self, name: &str) -> Option<f64> {
        let p = self.param_index(name)?;
        Some(crate::math::mean(&self.pooled(p)))
    }

    /// Posterior mean of the square of `name`.
    pub fn mean_square_of(&self, name: &str) -> Option<f64> {
        let p = self.param_index(name)?;
        let pooled = self.pooled(p);
        Some(pooled.iter().map(|v| v * v).sum::<f64>() / pooled.len().max(1) as f64)
    }
}

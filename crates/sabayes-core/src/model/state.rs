//! Current values of every unknown in one chain.

use alloc::vec;
use alloc::vec::Vec;

use rand::Rng;
use rand_distr::StandardNormal;

use super::{ModelData, ModelSpec};

/// Parameter values after the latest accepted sweep.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChainState {
    /// Coefficients, intercept first.
    pub beta: Vec<f64>,
    /// Random intercepts per level, coarsest first.
    pub u: Vec<Vec<f64>>,
    /// Random-intercept variances τ_l² per level.
    pub tau2: Vec<f64>,
    /// Spatial effects; empty without the spatial term.
    pub phi: Vec<f64>,
    /// Spatial variance τ_s².
    pub tau2_spatial: f64,
    /// Index of ρ in the log-determinant grid.
    pub rho_index: usize,
    /// Residual variance σ².
    pub sigma2: f64,
    /// Cached `Xβ`.
    pub xb: Vec<f64>,
}

impl ChainState {
    /// Dispersed starting point so that chains begin in different places.
    pub fn initial<R: Rng>(data: &ModelData, spec: &ModelSpec, rng: &mut R) -> Self {
        let n = data.n();
        let mut normal = |scale: f64| -> f64 { scale * rng.sample::<f64, _>(StandardNormal) };

        let beta: Vec<f64> = (0..data.p()).map(|_| normal(1.0)).collect();
        let u: Vec<Vec<f64>> = data
            .levels
            .iter()
            .map(|level| (0..level.len()).map(|_| normal(0.5)).collect())
            .collect();
        let phi = if spec.has_spatial() {
            (0..n).map(|_| normal(0.1)).collect()
        } else {
            Vec::new()
        };

        let tau2 = (0..data.depth()).map(|_| 0.1 + rng.random::<f64>()).collect();
        let tau2_spatial = 0.1 + rng.random::<f64>();
        let sigma2 = 0.5 + rng.random::<f64>();
        let rho_index = match &data.spatial {
            Some(s) if spec.has_spatial() => rng.random_range(0..s.logdet.len()),
            _ => 0,
        };

        let mut state = Self {
            beta,
            u,
            tau2,
            phi,
            tau2_spatial,
            rho_index,
            sigma2,
            xb: vec![0.0; n],
        };
        state.refresh_xb(data);
        state
    }

    /// Recompute `Xβ` after β changed.
    pub fn refresh_xb(&mut self, data: &ModelData) {
        for (i, xb) in self.xb.iter_mut().enumerate() {
            *xb = self
                .beta
                .iter()
                .enumerate()
                .map(|(k, b)| data.x[(i, k)] * b)
                .sum();
        }
    }

    /// Random intercept of area `i` at the finest level, or 0.
    #[inline]
    pub fn area_intercept(&self, data: &ModelData, i: usize) -> f64 {
        match self.u.last() {
            Some(finest) => finest[data.area_group[i]],
            None => 0.0,
        }
    }

    /// Spatial effect of area `i`, or 0 without the spatial term.
    #[inline]
    pub fn area_spatial(&self, i: usize) -> f64 {
        self.phi.get(i).copied().unwrap_or(0.0)
    }

    /// Linear predictor `x_iᵀβ + u_g(i) + φ_i`.
    #[inline]
    pub fn fitted(&self, data: &ModelData, i: usize) -> f64 {
        self.xb[i] + self.area_intercept(data, i) + self.area_spatial(i)
    }

    /// Every value is finite.
    pub fn is_finite(&self) -> bool {
        let all = |v: &[f64]| v.iter().all(|x| x.is_finite());
        all(&self.beta)
            && self.u.iter().all(|level| all(level))
            && all(&self.tau2)
            && all(&self.phi)
            && all(&self.xb)
            && self.tau2_spatial.is_finite()
            && self.sigma2.is_finite()
    }
}

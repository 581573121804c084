//! Blocked Gibbs sampler for the nested random-intercept CAR model.
//!
//! One sweep draws every block from its full conditional:
//!
//! 1. β | · ~ N(Q⁻¹Xᵀt/σ², Q⁻¹), Q = XᵀX/σ² + I/s_β², t = y − u − φ
//! 2. u⁽ˡ⁾ | ·, level by level from the coarsest down. Each unit combines
//!    its parent-centred prior with its children: next-level units with
//!    variance τ_{l+1}², or area residuals with variance σ² at the finest level
//! 3. φ_i | ·, single-site in area order:
//!    precision d_i/τ_s² + 1/σ², mean (d_i ρ (Wφ)_i/τ_s² + e_i/σ²) / precision
//! 4. τ_l² | u ~ InvGamma(a + J_l/2, b + Σ(u_j − u_parent)²/2)
//! 5. τ_s² | φ, ρ ~ InvGamma(a + n/2, b + φᵀ(D − ρA)φ/2)
//! 6. ρ | φ, τ_s² on the grid: log p(ρ_g) = ½ log det(I − ρ_g W) + ρ_g φᵀAφ / (2τ_s²)
//! 7. σ² | · ~ InvGamma(a + n/2, b + Σ r_i²/2)
//!
//! Isolated areas use d_i = 1 and (Wφ)_i = 0, i.e. an independent
//! N(0, τ_s²) prior.
//!
//! A sweep that produces any non-finite value is rolled back and counted as
//! a divergence; the chain continues from the previous state.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use nalgebra::{Cholesky, DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Gamma, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::state::ChainState;
use super::{ModelData, ModelSpec, SamplerConfig};
use crate::math;

/// Minimum variance to prevent numerical issues.
const VARIANCE_MIN: f64 = 1e-10;

/// Maximum variance to prevent numerical issues.
const VARIANCE_MAX: f64 = 1e10;

/// Jitter added to the β precision if its Cholesky factorization fails.
const PRECISION_JITTER: f64 = 1e-8;

/// Draws and bookkeeping from one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    /// Retained draws, row-major `[draw][param]`.
    pub draws: Vec<f64>,
    /// Sweeps rolled back because they produced a non-finite value.
    pub divergences: usize,
    /// Posterior mean of the linear predictor per area (standardized units).
    pub fitted_mean: Vec<f64>,
}

/// Gibbs sampler for one chain.
pub struct GibbsSampler<'a> {
    data: &'a ModelData,
    spec: ModelSpec,

    /// XᵀX, constant for the whole run.
    xtx: DMatrix<f64>,

    state: ChainState,
    divergences: usize,

    /// Deterministic RNG.
    rng: Xoshiro256PlusPlus,
}

impl<'a> GibbsSampler<'a> {
    /// Create a sampler starting from a dispersed random state.
    pub fn new(data: &'a ModelData, spec: ModelSpec, mut rng: Xoshiro256PlusPlus) -> Self {
        let state = ChainState::initial(data, &spec, &mut rng);
        Self {
            data,
            spec,
            xtx: data.x.transpose() * &data.x,
            state,
            divergences: 0,
            rng,
        }
    }

    /// Number of rolled-back sweeps so far.
    pub fn divergences(&self) -> usize {
        self.divergences
    }

    /// Run warm-up plus retained sweeps and collect the draws.
    pub fn run(mut self, config: &SamplerConfig) -> ChainOutput {
        let n = self.data.n();
        let names = parameter_names(self.data, &self.spec, config.store_area_effects);
        let mut draws = Vec::with_capacity(config.draws * names.len());
        let mut fitted_sum = vec![0.0; n];

        for _ in 0..config.tune {
            self.sweep();
        }
        for _ in 0..config.draws {
            for _ in 0..config.thin {
                self.sweep();
            }
            self.record(config.store_area_effects, &mut draws);
            for (i, sum) in fitted_sum.iter_mut().enumerate() {
                *sum += self.state.fitted(self.data, i);
            }
        }

        let kept = config.draws.max(1) as f64;
        ChainOutput {
            draws,
            divergences: self.divergences,
            fitted_mean: fitted_sum.into_iter().map(|s| s / kept).collect(),
        }
    }

    /// One full sweep. Returns `false` if it diverged and was rolled back.
    pub fn sweep(&mut self) -> bool {
        let previous = self.state.clone();

        self.update_beta();
        self.update_intercepts();
        if self.spec.has_spatial() {
            self.update_spatial_effects();
        }
        self.update_level_variances();
        if self.spec.has_spatial() {
            let (quad_degree, quad_adjacency) = self.spatial_quadratics();
            self.update_spatial_variance(quad_degree, quad_adjacency);
            self.update_rho(quad_adjacency);
        }
        self.update_residual_variance();

        if self.state.is_finite() {
            true
        } else {
            self.state = previous;
            self.divergences += 1;
            false
        }
    }

    fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Sample InvGamma(shape, rate) as 1 / Gamma(shape, 1/rate).
    fn sample_inv_gamma(&mut self, shape: f64, rate: f64) -> f64 {
        // rand_distr uses shape-scale, so scale = 1/rate
        match Gamma::new(shape, 1.0 / rate) {
            Ok(gamma) => {
                let g: f64 = gamma.sample(&mut self.rng);
                (1.0 / g).clamp(VARIANCE_MIN, VARIANCE_MAX)
            }
            Err(_) => f64::NAN,
        }
    }

    /// Step 1: β block.
    fn update_beta(&mut self) {
        let data = self.data;
        let p = data.p();
        let inv_sigma2 = 1.0 / self.state.sigma2;
        let prior_precision = 1.0 / math::sq(self.spec.priors.beta_sd);

        // Xᵀt / σ²
        let mut rhs = DVector::<f64>::zeros(p);
        for i in 0..data.n() {
            let t = data.y[i] - self.state.area_intercept(data, i) - self.state.area_spatial(i);
            for k in 0..p {
                rhs[k] += data.x[(i, k)] * t;
            }
        }
        rhs *= inv_sigma2;

        let q = &self.xtx * inv_sigma2 + DMatrix::<f64>::identity(p, p) * prior_precision;
        let q_chol = match Cholesky::new(q.clone()) {
            Some(c) => c,
            None => match Cholesky::new(q + DMatrix::<f64>::identity(p, p) * PRECISION_JITTER) {
                Some(c) => c,
                None => {
                    self.state.beta.fill(f64::NAN);
                    return;
                }
            },
        };

        let mu = q_chol.solve(&rhs);

        // β = μ + L⁻ᵀ z, since Q⁻¹ = L⁻ᵀ L⁻¹
        let z = DVector::<f64>::from_fn(p, |_, _| self.standard_normal());
        let offset = q_chol
            .l()
            .tr_solve_lower_triangular(&z)
            .unwrap_or_else(|| DVector::from_element(p, f64::NAN));

        for k in 0..p {
            self.state.beta[k] = mu[k] + offset[k];
        }
        self.state.refresh_xb(data);
    }

    /// Step 2: random intercepts, top-down.
    fn update_intercepts(&mut self) {
        let data = self.data;
        let depth = data.depth();
        let inv_sigma2 = 1.0 / self.state.sigma2;

        for l in 0..depth {
            let level = &data.levels[l];
            let inv_tau2 = 1.0 / self.state.tau2[l];
            let child_precision = if l + 1 < depth {
                1.0 / self.state.tau2[l + 1]
            } else {
                inv_sigma2
            };

            for j in 0..level.len() {
                let prior_mean = if l == 0 {
                    0.0
                } else {
                    self.state.u[l - 1][level.parent[j]]
                };
                let members = level.members(j);
                let child_sum: f64 = if l + 1 < depth {
                    members.iter().map(|&c| self.state.u[l + 1][c]).sum()
                } else {
                    members
                        .iter()
                        .map(|&i| data.y[i] - self.state.xb[i] - self.state.area_spatial(i))
                        .sum()
                };

                let precision = inv_tau2 + members.len() as f64 * child_precision;
                let mean = (prior_mean * inv_tau2 + child_sum * child_precision) / precision;
                let z = self.standard_normal();
                self.state.u[l][j] = mean + z / math::sqrt(precision);
            }
        }
    }

    /// Step 3: single-site spatial effects.
    fn update_spatial_effects(&mut self) {
        let data = self.data;
        let Some(spatial) = &data.spatial else {
            return;
        };
        let weights = &spatial.weights;
        let rho = spatial.logdet.rho[self.state.rho_index];
        let inv_tau2 = 1.0 / self.state.tau2_spatial;
        let inv_sigma2 = 1.0 / self.state.sigma2;

        for i in 0..data.n() {
            let degree = weights.degree(i).max(1) as f64;
            let neighbour_mean = weights.row_dot(i, &self.state.phi);
            let e = data.y[i] - self.state.xb[i] - self.state.area_intercept(data, i);

            let precision = degree * inv_tau2 + inv_sigma2;
            let mean = (degree * rho * neighbour_mean * inv_tau2 + e * inv_sigma2) / precision;
            let z = self.standard_normal();
            self.state.phi[i] = mean + z / math::sqrt(precision);
        }
    }

    /// `(Σ d_i φ_i², Σ d_i φ_i (Wφ)_i)` with d_i = 1 for isolated areas.
    ///
    /// The second term equals `φᵀAφ`.
    fn spatial_quadratics(&self) -> (f64, f64) {
        let Some(spatial) = &self.data.spatial else {
            return (0.0, 0.0);
        };
        let weights = &spatial.weights;
        let phi = &self.state.phi;
        let mut quad_degree = 0.0;
        let mut quad_adjacency = 0.0;
        for i in 0..phi.len() {
            let d = weights.degree(i);
            quad_degree += d.max(1) as f64 * math::sq(phi[i]);
            if d > 0 {
                quad_adjacency += d as f64 * phi[i] * weights.row_dot(i, phi);
            }
        }
        (quad_degree, quad_adjacency)
    }

    /// Step 4: random-intercept variances.
    fn update_level_variances(&mut self) {
        let data = self.data;
        let a = self.spec.priors.variance_shape;
        let b = self.spec.priors.variance_scale;

        for l in 0..data.depth() {
            let level = &data.levels[l];
            let ss: f64 = (0..level.len())
                .map(|j| {
                    let prior_mean = if l == 0 {
                        0.0
                    } else {
                        self.state.u[l - 1][level.parent[j]]
                    };
                    math::sq(self.state.u[l][j] - prior_mean)
                })
                .sum();
            let shape = a + level.len() as f64 / 2.0;
            self.state.tau2[l] = self.sample_inv_gamma(shape, b + ss / 2.0);
        }
    }

    /// Step 5: spatial variance.
    fn update_spatial_variance(&mut self, quad_degree: f64, quad_adjacency: f64) {
        let Some(spatial) = &self.data.spatial else {
            return;
        };
        let rho = spatial.logdet.rho[self.state.rho_index];
        let quad = (quad_degree - rho * quad_adjacency).max(0.0);
        let shape = self.spec.priors.variance_shape + self.data.n() as f64 / 2.0;
        let rate = self.spec.priors.variance_scale + quad / 2.0;
        self.state.tau2_spatial = self.sample_inv_gamma(shape, rate);
    }

    /// Step 6: griddy-Gibbs draw of ρ.
    fn update_rho(&mut self, quad_adjacency: f64) {
        let Some(spatial) = &self.data.spatial else {
            return;
        };
        let table = &spatial.logdet;
        let scale = quad_adjacency / (2.0 * self.state.tau2_spatial);
        let log_density: Vec<f64> = table
            .rho
            .iter()
            .zip(&table.logdet)
            .map(|(&r, &ld)| 0.5 * ld + r * scale)
            .collect();
        let log_norm = math::log_sum_exp(&log_density);
        if !log_norm.is_finite() {
            self.state.tau2_spatial = f64::NAN;
            return;
        }

        let target: f64 = self.rng.random();
        let mut cumulative = 0.0;
        let mut chosen = log_density.len() - 1;
        for (g, &lp) in log_density.iter().enumerate() {
            cumulative += math::exp(lp - log_norm);
            if target < cumulative {
                chosen = g;
                break;
            }
        }
        self.state.rho_index = chosen;
    }

    /// Step 7: residual variance.
    fn update_residual_variance(&mut self) {
        let data = self.data;
        let ss: f64 = (0..data.n())
            .map(|i| math::sq(data.y[i] - self.state.fitted(data, i)))
            .sum();
        let shape = self.spec.priors.variance_shape + data.n() as f64 / 2.0;
        let rate = self.spec.priors.variance_scale + ss / 2.0;
        self.state.sigma2 = self.sample_inv_gamma(shape, rate);
    }

    /// Append the current state in [`parameter_names`] order.
    fn record(&self, store_area_effects: bool, out: &mut Vec<f64>) {
        let state = &self.state;
        let spatial = self.spec.has_spatial();

        out.extend_from_slice(&state.beta);
        for level in &state.u {
            out.extend_from_slice(level);
        }
        if spatial && store_area_effects {
            out.extend_from_slice(&state.phi);
        }
        out.extend(state.tau2.iter().map(|&t| math::sqrt(t)));
        if spatial {
            out.push(math::sqrt(state.tau2_spatial));
            let rho = self
                .data
                .spatial
                .as_ref()
                .map(|s| s.logdet.rho[state.rho_index])
                .unwrap_or(0.0);
            out.push(rho);
        }
        out.push(math::sqrt(state.sigma2));
        if spatial {
            out.push(math::variance(&state.phi));
        }
    }
}

/// Trace parameter names, in recording order:
///
/// `beta[<coef>]…`, `u_<LEVEL>[<unit>]…`, `phi[<area>]…` (optional),
/// `sigma_<LEVEL>…`, `sigma_spatial`, `rho`, `sigma`, `var_spatial`.
pub fn parameter_names(data: &ModelData, spec: &ModelSpec, store_area_effects: bool) -> Vec<String> {
    let spatial = spec.has_spatial();
    let mut names = Vec::new();
    names.extend(data.coefficient_names.iter().map(|c| format!("beta[{c}]")));
    for level in &data.levels {
        names.extend(level.codes.iter().map(|c| format!("u_{}[{c}]", level.name)));
    }
    if spatial && store_area_effects {
        names.extend(data.area_codes.iter().map(|c| format!("phi[{c}]")));
    }
    names.extend(data.levels.iter().map(|l| format!("sigma_{}", l.name)));
    if spatial {
        names.push(String::from("sigma_spatial"));
        names.push(String::from("rho"));
    }
    names.push(String::from("sigma"));
    if spatial {
        names.push(String::from("var_spatial"));
    }
    names
}

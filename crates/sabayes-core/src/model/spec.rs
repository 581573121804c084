//! Model and sampler settings.

use alloc::string::ToString;

use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::constants::{
    DEFAULT_BETA_PRIOR_SD, DEFAULT_CHAINS, DEFAULT_DRAWS, DEFAULT_SEED, DEFAULT_TUNE,
    DEFAULT_VARIANCE_SCALE, DEFAULT_VARIANCE_SHAPE, RHO_GRID_POINTS,
};

/// Whether the model carries the per-area spatial effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialTerm {
    /// Proper CAR effect φ with autocorrelation ρ ∈ [0, 1].
    #[default]
    ProperCar,
    /// Random intercepts only.
    None,
}

/// Prior hyperparameters, all on the standardized scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Standard deviation `s_β` of the coefficient prior.
    pub beta_sd: f64,
    /// Inverse-gamma shape `a` shared by every variance.
    pub variance_shape: f64,
    /// Inverse-gamma scale `b` shared by every variance.
    pub variance_scale: f64,
    /// Points in the ρ grid.
    pub rho_grid_points: usize,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            beta_sd: DEFAULT_BETA_PRIOR_SD,
            variance_shape: DEFAULT_VARIANCE_SHAPE,
            variance_scale: DEFAULT_VARIANCE_SCALE,
            rho_grid_points: RHO_GRID_POINTS,
        }
    }
}

impl PriorConfig {
    /// Check that every hyperparameter is usable.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.beta_sd.is_finite() && self.beta_sd > 0.0) {
            return Err(ModelError::InvalidPrior("beta_sd must be positive".to_string()));
        }
        if !(self.variance_shape.is_finite() && self.variance_shape > 0.0) {
            return Err(ModelError::InvalidPrior(
                "variance_shape must be positive".to_string(),
            ));
        }
        if !(self.variance_scale.is_finite() && self.variance_scale > 0.0) {
            return Err(ModelError::InvalidPrior(
                "variance_scale must be positive".to_string(),
            ));
        }
        if self.rho_grid_points < 2 {
            return Err(ModelError::InvalidPrior(
                "rho_grid_points must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Model structure: priors plus the optional spatial term.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// Prior hyperparameters.
    pub priors: PriorConfig,
    /// Spatial term.
    pub spatial: SpatialTerm,
}

impl ModelSpec {
    /// Whether φ, ρ and τ_s are part of the model.
    pub fn has_spatial(&self) -> bool {
        self.spatial == SpatialTerm::ProperCar
    }
}

/// How the chains are run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of independent chains.
    ///
    /// At least two are needed for a meaningful R̂. Default: 4.
    pub chains: usize,

    /// Warm-up sweeps discarded at the start of every chain. Default: 1000.
    pub tune: usize,

    /// Retained draws per chain. Default: 1000.
    pub draws: usize,

    /// Keep every `thin`-th sweep after warm-up. Default: 1.
    pub thin: usize,

    /// Base seed. Chain `c` uses this seed's stream jumped `c` times.
    pub seed: u64,

    /// Record every area's spatial effect φ in the trace.
    ///
    /// Off by default: with tens of thousands of areas the trace would be
    /// dominated by φ.
    pub store_area_effects: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: DEFAULT_CHAINS,
            tune: DEFAULT_TUNE,
            draws: DEFAULT_DRAWS,
            thin: 1,
            seed: DEFAULT_SEED,
            store_area_effects: false,
        }
    }
}

impl SamplerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of chains.
    pub fn chains(mut self, chains: usize) -> Self {
        assert!(chains > 0, "chains must be positive");
        self.chains = chains;
        self
    }

    /// Set the number of warm-up sweeps.
    pub fn tune(mut self, tune: usize) -> Self {
        self.tune = tune;
        self
    }

    /// Set the number of retained draws per chain.
    pub fn draws(mut self, draws: usize) -> Self {
        assert!(draws > 0, "draws must be positive");
        self.draws = draws;
        self
    }

    /// Set the thinning interval.
    pub fn thin(mut self, thin: usize) -> Self {
        assert!(thin > 0, "thin must be positive");
        self.thin = thin;
        self
    }

    /// Set the base seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Record per-area spatial effects.
    pub fn store_area_effects(mut self, store: bool) -> Self {
        self.store_area_effects = store;
        self
    }

    /// Total sweeps per chain.
    pub fn sweeps_per_chain(&self) -> usize {
        self.tune + self.draws * self.thin
    }

    /// Validate without panicking.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.chains == 0 {
            return Err(ModelError::InvalidSampler("chains must be positive".to_string()));
        }
        if self.draws == 0 {
            return Err(ModelError::InvalidSampler("draws must be positive".to_string()));
        }
        if self.thin == 0 {
            return Err(ModelError::InvalidSampler("thin must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(PriorConfig::default().validate().is_ok());
        assert!(ModelSpec::default().has_spatial());
    }

    #[test]
    fn test_builder() {
        let config = SamplerConfig::new().chains(2).tune(50).draws(100).thin(2).seed(9);
        assert_eq!(config.sweeps_per_chain(), 250);
        assert_eq!(config.seed, 9);
    }

    #[test]
    #[should_panic(expected = "chains must be positive")]
    fn test_builder_rejects_zero_chains() {
        let _ = SamplerConfig::new().chains(0);
    }

    #[test]
    fn test_validate_catches_bad_values() {
        let config = SamplerConfig {
            thin: 0,
            ..SamplerConfig::default()
        };
        assert!(config.validate().is_err());

        let priors = PriorConfig {
            variance_scale: -1.0,
            ..PriorConfig::default()
        };
        assert!(priors.validate().is_err());
    }
}

//! Constants shared across the crate.

/// Default deterministic seed for RNG operations.
///
/// Same seed + same data = same posterior trace.
/// The value `0x73613162617973` is "sa1bays" encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x7361_3162_6179_73;

/// Lower and upper tail probabilities of the reported credible interval.
pub const CREDIBLE_INTERVAL: (f64, f64) = (0.025, 0.975);

// =============================================================================
// Default sampler configuration
// =============================================================================

/// Default number of independent chains.
pub const DEFAULT_CHAINS: usize = 4;

/// Default number of warm-up sweeps discarded per chain.
pub const DEFAULT_TUNE: usize = 1000;

/// Default number of retained draws per chain.
pub const DEFAULT_DRAWS: usize = 1000;

// =============================================================================
// Convergence targets
// =============================================================================

/// Split-R̂ must stay below this value for every parameter.
pub const DEFAULT_R_HAT_TARGET: f64 = 1.01;

/// Effective sample size must exceed this value for every parameter.
pub const DEFAULT_ESS_TARGET: f64 = 400.0;

// =============================================================================
// Spatial structure
// =============================================================================

/// Default neighbour count for the k-nearest-neighbour graph.
pub const DEFAULT_K_NEIGHBOURS: usize = 6;

/// Number of points in the ρ grid used for the log-determinant table.
pub const RHO_GRID_POINTS: usize = 200;

/// Largest n for which log det(I − ρW) is computed from exact eigenvalues.
pub const EXACT_LOGDET_MAX_N: usize = 400;

/// Number of Rademacher probes for the stochastic trace estimator.
pub const LOGDET_PROBES: usize = 30;

/// Number of terms kept in the log-determinant power series.
pub const LOGDET_SERIES_ORDER: usize = 40;

/// Spread factor between consecutive levels of the proxy embedding.
///
/// Must exceed the largest sibling count so that units under different
/// parents never sit closer than units sharing a parent.
pub const PROXY_LEVEL_SPREAD: f64 = 1.0e4;

/// Maximum number of points stored in a k-d tree leaf.
pub const KDTREE_LEAF_SIZE: usize = 16;

// =============================================================================
// Priors
// =============================================================================

/// Default prior standard deviation of the fixed-effect coefficients
/// (standardized units).
pub const DEFAULT_BETA_PRIOR_SD: f64 = 2.5;

/// Default inverse-gamma shape for every variance parameter.
pub const DEFAULT_VARIANCE_SHAPE: f64 = 2.0;

/// Default inverse-gamma scale for every variance parameter.
pub const DEFAULT_VARIANCE_SCALE: f64 = 0.5;

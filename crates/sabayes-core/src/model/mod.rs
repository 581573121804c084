//! Hierarchical regression with nested random intercepts and a proper CAR
//! spatial effect.
//!
//! On standardized data the model is
//!
//! ```text
//! y_i       = x_iᵀβ + u⁽ᴸ⁾_g(i) + φ_i + ε_i,        ε_i ~ N(0, σ²)
//! β         ~ N(0, s_β² I)
//! u⁽¹⁾_j     ~ N(0, τ₁²)
//! u⁽ˡ⁾_j     ~ N(u⁽ˡ⁻¹⁾_parent(j), τ_l²)            l = 2..L
//! φ | ρ, τ_s ~ N(0, τ_s² (D − ρA)⁻¹)
//! ρ         ~ Uniform(0, 1)
//! τ_l², τ_s², σ² ~ InvGamma(a, b)
//! ```
//!
//! Each level's intercepts are centred on their parent's value, so any
//! number of levels is handled by one traversal from the coarsest level down.
//! The posterior is explored by a blocked Gibbs sampler ([`GibbsSampler`]);
//! independent chains are driven by [`run_chains`].

mod chains;
mod data;
mod gibbs;
mod spec;
mod stage;
mod state;

pub use chains::{chain_rng, run_chains, SamplerOutput};
pub use data::{GroupLevel, ModelData, SpatialStructure, INTERCEPT};
pub use gibbs::{parameter_names, ChainOutput, GibbsSampler};
pub use spec::{ModelSpec, PriorConfig, SamplerConfig, SpatialTerm};
pub use stage::RunStage;

use alloc::string::String;

/// Errors raised while setting up or running the model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// No observations.
    #[error("model has no observations")]
    EmptyData,

    /// Two inputs disagree on the number of rows or entries.
    #[error("{what}: expected {expected} entries, got {actual}")]
    DimensionMismatch {
        /// Which input disagrees.
        what: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// An input contains NaN or infinity.
    #[error("{what} contains a non-finite value at row {row}")]
    NonFinite {
        /// Which input.
        what: String,
        /// First offending row.
        row: usize,
    },

    /// Sampler settings are unusable.
    #[error("invalid sampler configuration: {0}")]
    InvalidSampler(String),

    /// Prior settings are unusable.
    #[error("invalid prior configuration: {0}")]
    InvalidPrior(String),

    /// The spatial term was requested without weights.
    #[error("spatial term requested but no spatial weights were supplied")]
    MissingWeights,

    /// The CAR prior needs a symmetric neighbour structure.
    #[error("spatial weights must be structurally symmetric for the CAR prior")]
    AsymmetricWeights,

    /// A pipeline stage was entered out of order.
    #[error("invalid stage transition {from} → {to}")]
    InvalidTransition {
        /// Current stage.
        from: RunStage,
        /// Requested stage.
        to: RunStage,
    },

    /// Trace buffer does not match its declared shape.
    #[error("trace of shape {chains}×{draws}×{params} needs {expected} values, got {actual}")]
    TraceShape {
        /// Chains.
        chains: usize,
        /// Draws per chain.
        draws: usize,
        /// Parameters.
        params: usize,
        /// Expected buffer length.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },
}

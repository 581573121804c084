//! Core statistics for hierarchical spatial models over census areas.
//!
//! This crate holds every numerical piece of the pipeline: hierarchy
//! extraction from fixed-width area codes, the k-nearest-neighbour spatial
//! weights, the Gibbs sampler for the nested random-intercept model with a
//! proper CAR spatial term, and the convergence diagnostics computed from
//! the resulting posterior trace. It works in `no_std` environments with
//! only an allocator.
//!
//! # Features
//!
//! - `std` (default): Enable standard library support
//! - `parallel`: Run independent chains and per-parameter diagnostics on
//!   the rayon pool (requires `std`)
//!
//! # Usage
//!
//! This crate is normally driven by the `sabayes` pipeline crate, which
//! handles CSV loading, configuration and artifact persistence.
//!
//! ```ignore
//! use sabayes_core::{
//!     hierarchy::{Hierarchy, HierarchySpec},
//!     spatial::{Coordinates, KnnGraph, SpatialWeights},
//!     model::{ModelData, ModelSpec, SamplerConfig, run_chains},
//!     diagnostics::summarize_trace,
//! };
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod diagnostics;
pub mod hierarchy;
pub mod math;
pub mod model;
pub mod spatial;
pub mod statistics;
pub mod trace;

// Re-export commonly used items at crate root
pub use diagnostics::{
    summarize_trace, ConvergenceReport, ConvergenceStatus, ConvergenceTargets, MoransI,
    ParameterSummary, TraceSummary, VarianceComponent, VarianceDecomposition,
};
pub use hierarchy::{Hierarchy, HierarchyError, HierarchySpec, LevelSpec};
pub use model::{
    ModelData, ModelError, ModelSpec, PriorConfig, RunStage, SamplerConfig, SamplerOutput,
    SpatialTerm,
};
pub use spatial::{Coordinates, KnnGraph, LogDetTable, SpatialWeights, WeightsError};
pub use statistics::Standardizer;
pub use trace::PosteriorTrace;

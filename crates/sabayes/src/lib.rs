//! Hierarchical spatial Bayesian model for census statistical areas.
//!
//! `sabayes` runs one batch pipeline over per-area census tables:
//!
//! 1. load and merge the configured CSV tables, derive ratios, impute
//!    missing values ([`data`]);
//! 2. derive the geographic hierarchy from the fixed-width area codes;
//! 3. build k-nearest-neighbour spatial weights;
//! 4. fit nested random intercepts plus a proper CAR spatial effect with a
//!    Gibbs sampler;
//! 5. summarize, check convergence and write the artifacts ([`artifacts`]).
//!
//! The numerical work lives in `sabayes-core`; this crate adds I/O,
//! configuration, logging and reporting.
//!
//! # Quick Start
//!
//! ```ignore
//! use sabayes::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_json_file(Path::new("pipeline.json"))?;
//! let artifacts = Pipeline::new(&config).run_and_save(&config.output_dir)?;
//! println!("{}", sabayes::output::format_report(&artifacts, &artifacts.summary));
//! ```
//!
//! # Reloading
//!
//! ```ignore
//! let artifacts = sabayes::ArtifactSet::load(Path::new("sabayes-output"))?;
//! let summary = artifacts.recompute_summary();
//! assert!(sabayes::artifacts::summaries_identical(&summary, &artifacts.summary));
//! ```

#![warn(missing_docs)]

pub mod artifacts;
pub mod config;
pub mod data;
mod error;
pub mod output;
pub mod pipeline;

pub use artifacts::{ArtifactError, ArtifactSet, Metadata};
pub use config::{ConfigError, PipelineConfig, WeightsConfig};
pub use data::{DataError, DerivedColumn, FieldSpec, TableSchema};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, Prediction, WeightsReport};

// Re-export the core types users configure or inspect.
pub use sabayes_core::{
    ConvergenceStatus, ConvergenceTargets, HierarchySpec, LevelSpec, ModelSpec, PriorConfig,
    RunStage, SamplerConfig, SpatialTerm, TraceSummary,
};

//! Descriptive statistics used across the pipeline.

mod quantile;
mod standardize;

pub use quantile::{compute_quantile, compute_quantiles, finite_median, quantile_sorted};
pub use standardize::{impute_median, Standardizer};

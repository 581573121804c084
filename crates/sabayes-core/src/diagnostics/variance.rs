//! Share of outcome variance attributed to each model component.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::trace::PosteriorTrace;

/// One component of the decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceComponent {
    /// Component name: a level name, `spatial` or `residual`.
    pub name: String,
    /// Posterior mean variance (standardized units).
    pub variance: f64,
    /// Percentage of the summed variance.
    pub percent: f64,
}

/// Posterior-mean variances of every random term as percentages of their
/// sum.
///
/// Level variances are `E[τ_l²]`, the spatial share is `E[var(φ)]` (the
/// realised variance of the spatial effects across areas, since τ_s² alone
/// depends on ρ and the neighbour counts), and the residual share is
/// `E[σ²]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceDecomposition {
    /// Components, levels coarsest first, then spatial, then residual.
    pub components: Vec<VarianceComponent>,
    /// Sum of all component variances.
    pub total: f64,
}

impl VarianceDecomposition {
    /// Decompose using the `sigma_<LEVEL>`, `var_spatial` and `sigma`
    /// columns of `trace`. Missing columns are skipped.
    pub fn from_trace<S: AsRef<str>>(trace: &PosteriorTrace, level_names: &[S]) -> Self {
        let mut parts: Vec<(String, f64)> = Vec::new();
        for level in level_names {
            let level = level.as_ref();
            if let Some(v) = trace.mean_square_of(&format!("sigma_{level}")) {
                parts.push((String::from(level), v));
            }
        }
        if let Some(v) = trace.mean_of("var_spatial") {
            parts.push((String::from("spatial"), v));
        }
        if let Some(v) = trace.mean_square_of("sigma") {
            parts.push((String::from("residual"), v));
        }
        Self::from_parts(parts)
    }

    /// Build from `(name, variance)` pairs.
    pub fn from_parts(parts: Vec<(String, f64)>) -> Self {
        let total: f64 = parts.iter().map(|(_, v)| v).sum();
        let components = parts
            .into_iter()
            .map(|(name, variance)| VarianceComponent {
                percent: if total > 0.0 {
                    100.0 * variance / total
                } else {
                    0.0
                },
                name,
                variance,
            })
            .collect();
        Self { components, total }
    }

    /// Component by name.
    pub fn get(&self, name: &str) -> Option<&VarianceComponent> {
        self.components.iter().find(|c| c.name == name)
    }
}

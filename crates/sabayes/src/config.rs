//! Pipeline configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sabayes_core::constants::DEFAULT_K_NEIGHBOURS;
use sabayes_core::{ConvergenceTargets, HierarchySpec, ModelSpec, SamplerConfig, SpatialTerm};

use crate::data::{CentroidSource, DerivedColumn, TableSchema, DEFAULT_SENTINELS};

/// Errors raised while reading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the neighbour graph is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    /// Neighbours per area.
    ///
    /// Default: 6
    pub k: usize,

    /// Neighbours farther than this are ignored, which can leave areas with
    /// fewer than `k` neighbours or none at all.
    ///
    /// Default: None (no cut-off)
    pub max_distance: Option<f64>,

    /// Make the neighbour relation mutual before row-normalizing.
    ///
    /// Default: true. The proper CAR prior needs symmetric adjacency, so
    /// this can only be turned off when the spatial term is disabled.
    pub symmetrize: bool,

    /// True centroids. Without them areas are placed by the proxy
    /// embedding derived from their codes.
    pub centroids: Option<CentroidSource>,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K_NEIGHBOURS,
            max_distance: None,
            symmetrize: true,
            centroids: None,
        }
    }
}

/// Full configuration of one pipeline run.
///
/// Built once at entry (usually from JSON) and passed by reference to every
/// stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input tables, merged in order; the first one fixes the row order.
    pub tables: Vec<TableSchema>,

    /// Ratio columns computed after merging, in order.
    pub derived: Vec<DerivedColumn>,

    /// Code layout of the geographic levels.
    pub hierarchy: HierarchySpec,

    /// Outcome field.
    pub outcome: String,

    /// Predictor fields.
    pub predictors: Vec<String>,

    /// Cell values read as missing.
    ///
    /// Default: `..`, `np`, `-` and the empty string
    pub sentinels: Vec<String>,

    /// Neighbour graph settings.
    pub weights: WeightsConfig,

    /// Priors and spatial term.
    pub model: ModelSpec,

    /// Chains, tuning, draws and seed.
    pub sampler: SamplerConfig,

    /// Convergence targets.
    pub diagnostics: ConvergenceTargets,

    /// Directory receiving the artifacts.
    ///
    /// Default: `sabayes-output`
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    /// A starter configuration: median weekly rent explained by median
    /// income and the share of rented dwellings, over SA1 areas.
    fn default() -> Self {
        Self {
            tables: vec![
                TableSchema::new("g02", "2021Census_G02_AUST_SA1.csv", "SA1_CODE_2021")
                    .field("median_income", "Median_tot_prsnl_inc_weekly")
                    .field("median_rent", "Median_rent_weekly"),
                TableSchema::new("g37", "2021Census_G37_AUST_SA1.csv", "SA1_CODE_2021")
                    .field("rented", "R_Tot_Total")
                    .field("dwellings", "Total_Total"),
            ],
            derived: vec![
                DerivedColumn::ratio("renter_share", &["rented"], &["dwellings"]).scaled(100.0),
            ],
            hierarchy: HierarchySpec::default(),
            outcome: "median_rent".to_string(),
            predictors: vec!["median_income".to_string(), "renter_share".to_string()],
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            weights: WeightsConfig::default(),
            model: ModelSpec::default(),
            sampler: SamplerConfig::default(),
            diagnostics: ConvergenceTargets::default(),
            output_dir: PathBuf::from("sabayes-output"),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with no tables and default settings.
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            tables: Vec::new(),
            derived: Vec::new(),
            outcome: outcome.into(),
            predictors: Vec::new(),
            ..Default::default()
        }
    }

    /// Read a JSON configuration.
    ///
    /// Relative table and centroid paths are resolved against the directory
    /// holding the file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Rewrite relative input paths as paths under `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for table in &mut self.tables {
            table.file = table.resolve(base);
        }
        if let Some(centroids) = &mut self.weights.centroids {
            centroids.file = centroids.resolve(base);
        }
    }

    /// Add an input table.
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Add a derived column.
    pub fn with_derived(mut self, derived: DerivedColumn) -> Self {
        self.derived.push(derived);
        self
    }

    /// Set the predictor fields.
    pub fn with_predictors<S: Into<String>>(mut self, predictors: impl IntoIterator<Item = S>) -> Self {
        self.predictors = predictors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the hierarchy layout.
    pub fn with_hierarchy(mut self, hierarchy: HierarchySpec) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Set the number of neighbours per area.
    pub fn with_neighbours(mut self, k: usize) -> Self {
        assert!(k > 0, "k must be positive");
        self.weights.k = k;
        self
    }

    /// Ignore neighbours farther than `distance`.
    pub fn with_max_distance(mut self, distance: f64) -> Self {
        assert!(
            distance.is_finite() && distance > 0.0,
            "max_distance must be positive and finite"
        );
        self.weights.max_distance = Some(distance);
        self
    }

    /// Use true centroids instead of the proxy embedding.
    pub fn with_centroids(mut self, centroids: CentroidSource) -> Self {
        self.weights.centroids = Some(centroids);
        self
    }

    /// Select the spatial term.
    pub fn with_spatial(mut self, spatial: SpatialTerm) -> Self {
        self.model.spatial = spatial;
        self
    }

    /// Set the sampler configuration.
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    /// Set the artifact directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Model columns: the outcome followed by the predictors.
    pub fn model_columns(&self) -> Vec<String> {
        std::iter::once(self.outcome.clone())
            .chain(self.predictors.iter().cloned())
            .collect()
    }

    /// Check the configuration for inconsistencies before any data is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.tables.is_empty() {
            return invalid("at least one input table is required".to_string());
        }
        let mut ids = HashSet::new();
        let mut fields: HashSet<&str> = HashSet::new();
        for table in &self.tables {
            if !ids.insert(table.id.as_str()) {
                return invalid(format!("table id '{}' is used twice", table.id));
            }
            if table.code_column.trim().is_empty() {
                return invalid(format!("table '{}' has no code column", table.id));
            }
            for field in &table.fields {
                if !fields.insert(field.name.as_str()) {
                    return invalid(format!("field '{}' is defined twice", field.name));
                }
            }
        }

        for derived in &self.derived {
            if derived.numerator.is_empty() || derived.denominator.is_empty() {
                return invalid(format!(
                    "derived column '{}' needs a numerator and a denominator",
                    derived.name
                ));
            }
            if !derived.scale.is_finite() || !derived.denominator_offset.is_finite() {
                return invalid(format!(
                    "derived column '{}' has a non-finite scale or offset",
                    derived.name
                ));
            }
            for input in derived.numerator.iter().chain(&derived.denominator) {
                if !fields.contains(input.as_str()) {
                    return invalid(format!(
                        "derived column '{}' uses unknown field '{}'",
                        derived.name, input
                    ));
                }
            }
            if !fields.insert(derived.name.as_str()) {
                return invalid(format!("field '{}' is defined twice", derived.name));
            }
        }

        if self.outcome.is_empty() {
            return invalid("an outcome field is required".to_string());
        }
        let mut model_columns = HashSet::new();
        for column in self.model_columns() {
            if !fields.contains(column.as_str()) {
                return invalid(format!("model column '{column}' is not a known field"));
            }
            if !model_columns.insert(column.clone()) {
                return invalid(format!("model column '{column}' is listed twice"));
            }
        }

        if self.weights.k == 0 {
            return invalid("weights.k must be positive".to_string());
        }
        if let Some(d) = self.weights.max_distance {
            if !(d.is_finite() && d > 0.0) {
                return invalid(format!("weights.max_distance must be positive, got {d}"));
            }
        }
        if self.model.has_spatial() && !self.weights.symmetrize {
            return invalid("the proper CAR term requires weights.symmetrize = true".to_string());
        }

        self.hierarchy
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.model
            .priors
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.sampler
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !(self.diagnostics.r_hat > 1.0) || !(self.diagnostics.ess > 0.0) {
            return invalid(format!(
                "convergence targets need r_hat > 1 and ess > 0, got {} and {}",
                self.diagnostics.r_hat, self.diagnostics.ess
            ));
        }
        Ok(())
    }
}

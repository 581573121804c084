//! Nested geographic hierarchy derived from fixed-width area codes.
//!
//! Australian statistical-area codes embed their containing regions as
//! prefixes. An 11-digit SA1 code such as `10101001001` decomposes as
//!
//! ```text
//! 1 01 01 0010 01
//! │ │  │  │    └─ SA1 within SA2
//! │ │  │  └────── SA2 within SA3   (prefix of width 9)
//! │ │  └───────── SA3 within SA4   (prefix of width 5)
//! │ └──────────── SA4 within state (prefix of width 3)
//! └────────────── state
//! ```
//!
//! Every coarser identifier is a prefix truncation of the finer one, so
//! containment is a strict partition by construction: an area has exactly
//! one unit at every level and units at one level never overlap.
//!
//! Units at each level receive dense zero-based indices in sorted code
//! order; those indices are the random-effect group labels used by the model.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

/// Errors raised while deriving the hierarchy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HierarchyError {
    /// An area code contains something other than ASCII digits or is wider
    /// than the configured area width.
    #[error("malformed area code '{code}': {reason}")]
    MalformedCode {
        /// The offending code as read from the input.
        code: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The level widths do not describe a nested hierarchy.
    #[error("invalid hierarchy specification: {0}")]
    InvalidSpec(String),

    /// The same area code appears twice.
    #[error("duplicate area code '{0}'")]
    DuplicateArea(String),
}

/// One level of the hierarchy: a display name and a prefix width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    /// Level name, e.g. `"SA2"`.
    pub name: String,
    /// Number of leading digits that identify a unit at this level.
    pub width: usize,
}

impl LevelSpec {
    /// Create a level with the given name and width.
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Digit layout of the area codes and of every coarser level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySpec {
    /// The finest level (the areas themselves).
    pub area: LevelSpec,
    /// Coarser levels, coarsest first.
    pub levels: Vec<LevelSpec>,
}

impl Default for HierarchySpec {
    /// ABS ASGS 2021: SA1 (11) → SA2 (9) → SA3 (5) → SA4 (3).
    fn default() -> Self {
        Self {
            area: LevelSpec::new("SA1", 11),
            levels: alloc::vec![
                LevelSpec::new("SA4", 3),
                LevelSpec::new("SA3", 5),
                LevelSpec::new("SA2", 9),
            ],
        }
    }
}

impl HierarchySpec {
    /// Check that widths strictly increase from coarsest to the area level.
    pub fn validate(&self) -> Result<(), HierarchyError> {
        if self.area.width == 0 {
            return Err(HierarchyError::InvalidSpec(
                "area width must be positive".to_string(),
            ));
        }
        let mut previous = 0usize;
        for level in &self.levels {
            if level.width == 0 || level.width <= previous {
                return Err(HierarchyError::InvalidSpec(alloc::format!(
                    "level '{}' width {} must be positive and wider than its parent ({})",
                    level.name, level.width, previous
                )));
            }
            previous = level.width;
        }
        if previous >= self.area.width {
            return Err(HierarchyError::InvalidSpec(alloc::format!(
                "area width {} must exceed every level width (largest {})",
                self.area.width, previous
            )));
        }
        let mut names: Vec<&str> = self.levels.iter().map(|l| l.name.as_str()).collect();
        names.push(self.area.name.as_str());
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(HierarchyError::InvalidSpec(
                "level names must be unique".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of coarser levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}

/// Normalize a raw area code to exactly `width` digits.
///
/// Surrounding whitespace is trimmed and shorter codes are left-padded with
/// zeros (codes that went through a numeric column lose their leading zeros).
pub fn normalize_code(raw: &str, width: usize) -> Result<String, HierarchyError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(HierarchyError::MalformedCode {
            code: raw.to_string(),
            reason: "empty".to_string(),
        });
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HierarchyError::MalformedCode {
            code: raw.to_string(),
            reason: "contains non-digit characters".to_string(),
        });
    }
    if code.len() > width {
        return Err(HierarchyError::MalformedCode {
            code: raw.to_string(),
            reason: alloc::format!("longer than {} digits", width),
        });
    }
    let mut padded = String::with_capacity(width);
    for _ in code.len()..width {
        padded.push('0');
    }
    padded.push_str(code);
    Ok(padded)
}

/// Truncate a normalized code to the prefix that identifies its unit at a
/// coarser level.
#[inline]
pub fn truncate_code(code: &str, width: usize) -> &str {
    &code[..width.min(code.len())]
}

/// Units at one hierarchy level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    /// Level name.
    pub name: String,
    /// Prefix width.
    pub width: usize,
    /// Sorted distinct unit codes; position is the dense index.
    pub codes: Vec<String>,
    /// Index of each unit's parent in the previous (coarser) level.
    /// Empty for the coarsest level.
    pub parent: Vec<usize>,
}

impl HierarchyLevel {
    /// Number of units at this level.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Check if the level has no units.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Number of children of every unit, given the next finer level's
    /// parent links (or the area → unit mapping for the finest level).
    pub fn child_counts(&self, child_parent: &[usize]) -> Vec<usize> {
        let mut counts = alloc::vec![0usize; self.len()];
        for &p in child_parent {
            counts[p] += 1;
        }
        counts
    }
}

/// The derived hierarchy for a set of areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    /// Name of the area level.
    pub area_name: String,
    /// Normalized area codes, in input order.
    pub area_codes: Vec<String>,
    /// Coarser levels, coarsest first.
    pub levels: Vec<HierarchyLevel>,
    /// `area_units[l][i]` is the index of area `i`'s unit at level `l`.
    pub area_units: Vec<Vec<usize>>,
}

impl Hierarchy {
    /// Derive the hierarchy for the given raw area codes.
    ///
    /// Codes are normalized with [`normalize_code`]; area order is preserved.
    pub fn extract<S: AsRef<str>>(
        spec: &HierarchySpec,
        raw_codes: &[S],
    ) -> Result<Self, HierarchyError> {
        spec.validate()?;

        let mut area_codes = Vec::with_capacity(raw_codes.len());
        let mut seen: BTreeMap<String, ()> = BTreeMap::new();
        for raw in raw_codes {
            let code = normalize_code(raw.as_ref(), spec.area.width)?;
            if seen.insert(code.clone(), ()).is_some() {
                return Err(HierarchyError::DuplicateArea(code));
            }
            area_codes.push(code);
        }

        let mut levels = Vec::with_capacity(spec.levels.len());
        let mut area_units = Vec::with_capacity(spec.levels.len());

        for (l, level_spec) in spec.levels.iter().enumerate() {
            // Sorted distinct prefixes → dense indices
            let mut index: BTreeMap<&str, usize> = BTreeMap::new();
            for code in &area_codes {
                index.insert(truncate_code(code, level_spec.width), 0);
            }
            for (i, slot) in index.values_mut().enumerate() {
                *slot = i;
            }
            let codes: Vec<String> = index.keys().map(|k| k.to_string()).collect();

            let units: Vec<usize> = area_codes
                .iter()
                .map(|code| index[truncate_code(code, level_spec.width)])
                .collect();

            let parent = if l == 0 {
                Vec::new()
            } else {
                let coarser: &HierarchyLevel = &levels[l - 1];
                codes
                    .iter()
                    .map(|code| {
                        let prefix = truncate_code(code, coarser.width);
                        // Every prefix of a unit code is itself a unit code
                        // one level up, since both come from the same areas.
                        coarser
                            .codes
                            .binary_search_by(|c| c.as_str().cmp(prefix))
                            .map_err(|_| {
                                HierarchyError::InvalidSpec(alloc::format!(
                                    "unit '{}' has no parent at level '{}'",
                                    code, coarser.name
                                ))
                            })
                    })
                    .collect::<Result<Vec<usize>, _>>()?
            };

            levels.push(HierarchyLevel {
                name: level_spec.name.clone(),
                width: level_spec.width,
                codes,
                parent,
            });
            area_units.push(units);
        }

        Ok(Self {
            area_name: spec.area.name.clone(),
            area_codes,
            levels,
            area_units,
        })
    }

    /// Number of areas.
    pub fn n_areas(&self) -> usize {
        self.area_codes.len()
    }

    /// Number of coarser levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Index of each area's unit at the finest coarser level, if any.
    pub fn finest_groups(&self) -> Option<&[usize]> {
        self.area_units.last().map(|v| v.as_slice())
    }

    /// Code of area `i`'s unit at level `l`.
    pub fn unit_code(&self, l: usize, area: usize) -> &str {
        &self.levels[l].codes[self.area_units[l][area]]
    }

    /// Unit counts per level, coarsest first.
    pub fn unit_counts(&self) -> Vec<(String, usize)> {
        self.levels
            .iter()
            .map(|l| (l.name.clone(), l.len()))
            .collect()
    }

    /// Verify the partition invariants: each area's unit at every level is
    /// the prefix truncation of its code and the chain of parents agrees.
    pub fn check_containment(&self) -> bool {
        for (i, code) in self.area_codes.iter().enumerate() {
            for (l, level) in self.levels.iter().enumerate() {
                let unit = self.area_units[l][i];
                if level.codes[unit] != truncate_code(code, level.width) {
                    return false;
                }
                if l > 0 && level.parent[unit] != self.area_units[l - 1][i] {
                    return false;
                }
            }
        }
        true
    }
}

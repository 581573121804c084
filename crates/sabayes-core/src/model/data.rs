//! Inputs to the sampler, fixed for the whole run.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use nalgebra::DMatrix;

use super::ModelError;
use crate::hierarchy::Hierarchy;
use crate::spatial::{LogDetTable, SpatialWeights};

/// Name of the intercept coefficient.
pub const INTERCEPT: &str = "intercept";

/// One level of random intercepts.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupLevel {
    /// Level name, e.g. `SA3`.
    pub name: String,
    /// Unit codes; position is the unit index.
    pub codes: Vec<String>,
    /// Parent unit index in the previous level. Empty for the coarsest.
    pub parent: Vec<usize>,
    /// `members[member_ptr[j]..member_ptr[j + 1]]` are the children of unit
    /// `j`: units of the next level, or areas for the finest level.
    member_ptr: Vec<usize>,
    members: Vec<usize>,
}

impl GroupLevel {
    fn new(name: String, codes: Vec<String>, parent: Vec<usize>, child_parent: &[usize]) -> Self {
        let n_units = codes.len();
        let mut member_ptr = vec![0usize; n_units + 1];
        for &p in child_parent {
            member_ptr[p + 1] += 1;
        }
        for j in 0..n_units {
            member_ptr[j + 1] += member_ptr[j];
        }
        let mut next = member_ptr.clone();
        let mut members = vec![0usize; child_parent.len()];
        for (child, &p) in child_parent.iter().enumerate() {
            members[next[p]] = child;
            next[p] += 1;
        }
        Self {
            name,
            codes,
            parent,
            member_ptr,
            members,
        }
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Check if the level has no units.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Children of unit `j`.
    #[inline]
    pub fn members(&self, j: usize) -> &[usize] {
        &self.members[self.member_ptr[j]..self.member_ptr[j + 1]]
    }
}

/// Neighbour structure used by the CAR prior.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialStructure {
    /// Row-standardized weights `W = D⁻¹A`.
    pub weights: SpatialWeights,
    /// `log det(I − ρW)` on the ρ grid.
    pub logdet: LogDetTable,
}

/// Standardized observations and the structure they are grouped by.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    /// Standardized outcome, one entry per area.
    pub y: Vec<f64>,
    /// Design matrix `n × p`; the first column is the intercept.
    pub x: DMatrix<f64>,
    /// Coefficient names, starting with [`INTERCEPT`].
    pub coefficient_names: Vec<String>,
    /// Area codes, in row order.
    pub area_codes: Vec<String>,
    /// Random-intercept levels, coarsest first.
    pub levels: Vec<GroupLevel>,
    /// Index of each area's unit in the finest level. Empty without levels.
    pub area_group: Vec<usize>,
    /// Neighbour structure, when the spatial term is in use.
    pub spatial: Option<SpatialStructure>,
}

impl ModelData {
    /// Assemble model inputs.
    ///
    /// `predictors` are `(name, standardized column)` pairs; an intercept
    /// column is prepended. Rows follow the hierarchy's area order.
    pub fn new(
        y: Vec<f64>,
        predictors: &[(String, Vec<f64>)],
        hierarchy: &Hierarchy,
    ) -> Result<Self, ModelError> {
        let n = y.len();
        if n == 0 {
            return Err(ModelError::EmptyData);
        }
        check_finite("outcome", &y)?;
        if hierarchy.n_areas() != n {
            return Err(ModelError::DimensionMismatch {
                what: "hierarchy areas".to_string(),
                expected: n,
                actual: hierarchy.n_areas(),
            });
        }

        let p = predictors.len() + 1;
        let mut x = DMatrix::<f64>::from_element(n, p, 1.0);
        let mut coefficient_names = Vec::with_capacity(p);
        coefficient_names.push(INTERCEPT.to_string());
        for (k, (name, column)) in predictors.iter().enumerate() {
            if column.len() != n {
                return Err(ModelError::DimensionMismatch {
                    what: format!("predictor '{name}'"),
                    expected: n,
                    actual: column.len(),
                });
            }
            check_finite(&format!("predictor '{name}'"), column)?;
            for (i, &v) in column.iter().enumerate() {
                x[(i, k + 1)] = v;
            }
            coefficient_names.push(name.clone());
        }

        let depth = hierarchy.depth();
        let mut levels = Vec::with_capacity(depth);
        for (l, level) in hierarchy.levels.iter().enumerate() {
            let child_parent: &[usize] = if l + 1 < depth {
                &hierarchy.levels[l + 1].parent
            } else {
                &hierarchy.area_units[l]
            };
            levels.push(GroupLevel::new(
                level.name.clone(),
                level.codes.clone(),
                level.parent.clone(),
                child_parent,
            ));
        }
        let area_group = hierarchy
            .finest_groups()
            .map(|g| g.to_vec())
            .unwrap_or_default();

        Ok(Self {
            y,
            x,
            coefficient_names,
            area_codes: hierarchy.area_codes.clone(),
            levels,
            area_group,
            spatial: None,
        })
    }

    /// Attach the neighbour structure for the CAR prior.
    pub fn with_spatial(
        mut self,
        weights: SpatialWeights,
        logdet: LogDetTable,
    ) -> Result<Self, ModelError> {
        if weights.n() != self.n() {
            return Err(ModelError::DimensionMismatch {
                what: "spatial weights".to_string(),
                expected: self.n(),
                actual: weights.n(),
            });
        }
        if !weights.is_symmetric_structure() {
            return Err(ModelError::AsymmetricWeights);
        }
        if logdet.len() < 2 {
            return Err(ModelError::InvalidPrior(
                "log-determinant grid needs at least two points".to_string(),
            ));
        }
        self.spatial = Some(SpatialStructure { weights, logdet });
        Ok(self)
    }

    /// Number of areas.
    pub fn n(&self) -> usize {
        self.y.len()
    }

    /// Number of coefficients, including the intercept.
    pub fn p(&self) -> usize {
        self.x.ncols()
    }

    /// Number of random-intercept levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}

fn check_finite(what: &str, values: &[f64]) -> Result<(), ModelError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(row) => Err(ModelError::NonFinite {
            what: what.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchySpec;

    fn hierarchy() -> Hierarchy {
        let codes = ["10101001001", "10101001002", "10101002001", "20201003001"];
        Hierarchy::extract(&HierarchySpec::default(), &codes).unwrap()
    }

    #[test]
    fn test_members_follow_parent_links() {
        let data = ModelData::new(
            vec![0.1, -0.2, 0.3, 0.0],
            &[("income".to_string(), vec![1.0, 0.0, -1.0, 0.5])],
            &hierarchy(),
        )
        .unwrap();

        assert_eq!(data.p(), 2);
        assert_eq!(data.coefficient_names, vec!["intercept", "income"]);
        assert_eq!(data.x[(2, 1)], -1.0);
        assert_eq!(data.x[(3, 0)], 1.0);
        assert_eq!(data.depth(), 3);

        // SA4: 101 and 202; 101 has SA3 units 10101 only
        let sa4 = &data.levels[0];
        assert_eq!(sa4.codes, vec!["101", "202"]);
        assert_eq!(sa4.members(0), &[0]);

        // Finest level lists areas
        let sa2 = &data.levels[2];
        assert_eq!(sa2.members(0), &[0, 1]);
        assert_eq!(sa2.members(1), &[2]);
        assert_eq!(data.area_group, vec![0, 0, 1, 2]);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let h = hierarchy();
        assert_eq!(ModelData::new(vec![], &[], &h), Err(ModelError::EmptyData));
        assert!(matches!(
            ModelData::new(vec![0.0, f64::NAN, 0.0, 0.0], &[], &h),
            Err(ModelError::NonFinite { row: 1, .. })
        ));
        assert!(matches!(
            ModelData::new(vec![0.0; 4], &[("a".to_string(), vec![0.0; 3])], &h),
            Err(ModelError::DimensionMismatch { expected: 4, actual: 3, .. })
        ));
        assert!(matches!(
            ModelData::new(vec![0.0; 3], &[], &h),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_with_spatial_requires_symmetry() {
        let data = ModelData::new(vec![0.0; 4], &[], &hierarchy()).unwrap();
        let asym = SpatialWeights::from_triplets(4, vec![(0, 1, 1.0)]).unwrap();
        let table = LogDetTable::exact(&asym, 10);
        assert_eq!(
            data.clone().with_spatial(asym, table.clone()),
            Err(ModelError::AsymmetricWeights)
        );

        let sym = SpatialWeights::from_triplets(4, vec![(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        let data = data.with_spatial(sym, table).unwrap();
        assert!(data.spatial.is_some());
    }
}

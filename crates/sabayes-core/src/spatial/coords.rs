//! Area coordinates: true centroids or the proxy embedding.

use alloc::vec;
use alloc::vec::Vec;

use super::WeightsError;
use crate::constants::PROXY_LEVEL_SPREAD;
use crate::hierarchy::Hierarchy;
use crate::math;

/// Points in a `dim`-dimensional space, one per area, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    dim: usize,
    values: Vec<f64>,
}

impl Coordinates {
    /// Wrap a row-major buffer of `dim`-dimensional points.
    pub fn new(dim: usize, values: Vec<f64>) -> Result<Self, WeightsError> {
        if dim == 0 || values.len() % dim != 0 {
            return Err(WeightsError::DimensionMismatch {
                dim,
                len: values.len(),
            });
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(WeightsError::NonFiniteCoordinate { index: pos / dim });
        }
        Ok(Self { dim, values })
    }

    /// Planar points such as projected centroids.
    pub fn from_xy(points: &[(f64, f64)]) -> Result<Self, WeightsError> {
        let values = points.iter().flat_map(|&(x, y)| [x, y]).collect();
        Self::new(2, values)
    }

    /// Proxy embedding derived from the code hierarchy.
    ///
    /// Each area is placed at
    ///
    /// ```text
    /// ( r₀·S^L, r₁·S^(L−1), …, r_(L−1)·S, r_area )
    /// ```
    ///
    /// where `r_l` is the ordinal of the area's unit among its siblings at
    /// level `l`, `r_area` the area's ordinal within its finest unit and `S`
    /// is [`PROXY_LEVEL_SPREAD`]. Areas sharing a unit are therefore always
    /// closer to each other than to areas in any other unit, which is the
    /// only adjacency information the codes carry.
    pub fn proxy_from_hierarchy(hierarchy: &Hierarchy) -> Self {
        let n = hierarchy.n_areas();
        let depth = hierarchy.depth();
        let dim = depth + 1;
        let mut values = vec![0.0; n * dim];

        for (l, level) in hierarchy.levels.iter().enumerate() {
            // Units are sorted by code, so siblings are contiguous.
            let mut rank = vec![0usize; level.len()];
            for u in 1..level.len() {
                let same_parent = l == 0 || level.parent[u] == level.parent[u - 1];
                rank[u] = if l == 0 {
                    u
                } else if same_parent {
                    rank[u - 1] + 1
                } else {
                    0
                };
            }
            let scale = math::pow(PROXY_LEVEL_SPREAD, (depth - l) as f64);
            for i in 0..n {
                values[i * dim + l] = rank[hierarchy.area_units[l][i]] as f64 * scale;
            }
        }

        // Ordinal of each area within its finest unit, by code.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| hierarchy.area_codes[a].cmp(&hierarchy.area_codes[b]));
        let groups = hierarchy.finest_groups();
        let mut previous_group = usize::MAX;
        let mut within = 0usize;
        for (pos, &i) in order.iter().enumerate() {
            let group = groups.map(|g| g[i]).unwrap_or(0);
            within = if pos > 0 && group == previous_group {
                within + 1
            } else if groups.is_none() {
                pos
            } else {
                0
            };
            previous_group = group;
            values[i * dim + depth] = within as f64;
        }

        Self { dim, values }
    }

    /// Dimension of each point.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    /// Check if there are no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `i`-th point.
    #[inline]
    pub fn point(&self, i: usize) -> &[f64] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }

    /// Squared Euclidean distance between points `i` and `j`.
    #[inline]
    pub fn dist2(&self, i: usize, j: usize) -> f64 {
        squared_distance(self.point(i), self.point(j))
    }
}

/// Squared Euclidean distance between two points of equal dimension.
#[inline]
pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| math::sq(x - y)).sum()
}

//! Directed k-nearest-neighbour graph.

use alloc::vec::Vec;

use super::{Coordinates, KdTree, WeightsError};

/// For every area, the indices of its nearest neighbours.
///
/// Rows hold at most `k_effective` entries, sorted by (distance, index).
/// Rows can be shorter when a distance cut-off applies.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnGraph {
    /// Neighbour count that was asked for.
    pub k_requested: usize,
    /// Neighbour count actually used (`min(k, n − 1)`).
    pub k_effective: usize,
    offsets: Vec<usize>,
    neighbours: Vec<usize>,
}

impl KnnGraph {
    /// Query the `k` nearest neighbours of every area.
    ///
    /// With fewer than `k + 1` areas, `k` is reduced to `n − 1`; callers can
    /// detect this through [`Self::was_reduced`]. A single area yields an
    /// empty row.
    pub fn build(
        coords: &Coordinates,
        k: usize,
        max_distance: Option<f64>,
    ) -> Result<Self, WeightsError> {
        if k == 0 {
            return Err(WeightsError::InvalidNeighbourCount(k));
        }
        let n = coords.len();
        if n == 0 {
            return Err(WeightsError::EmptyInput);
        }
        let k_effective = k.min(n - 1);
        let tree = KdTree::build(coords);

        let rows = query_all(&tree, n, k_effective, max_distance);

        let mut offsets = Vec::with_capacity(n + 1);
        let mut neighbours = Vec::with_capacity(n * k_effective);
        offsets.push(0);
        for row in rows {
            neighbours.extend_from_slice(&row);
            offsets.push(neighbours.len());
        }

        Ok(Self {
            k_requested: k,
            k_effective,
            offsets,
            neighbours,
        })
    }

    /// Number of areas.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Check if the graph has no areas.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbours of area `i`.
    #[inline]
    pub fn neighbours(&self, i: usize) -> &[usize] {
        &self.neighbours[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Whether `k` had to be reduced because there were too few areas.
    pub fn was_reduced(&self) -> bool {
        self.k_effective < self.k_requested
    }

    /// Directed edges `(i, j)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len()).flat_map(move |i| self.neighbours(i).iter().map(move |&j| (i, j)))
    }
}

#[cfg(feature = "parallel")]
fn query_all(tree: &KdTree<'_>, n: usize, k: usize, max_distance: Option<f64>) -> Vec<Vec<usize>> {
    use rayon::prelude::*;
    (0..n)
        .into_par_iter()
        .map(|i| tree.nearest(i, k, max_distance))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn query_all(tree: &KdTree<'_>, n: usize, k: usize, max_distance: Option<f64>) -> Vec<Vec<usize>> {
    (0..n).map(|i| tree.nearest(i, k, max_distance)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_rows_hold_at_most_k() {
        let coords = Coordinates::from_xy(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (5.0, 5.0),
            (6.0, 5.0),
        ])
        .unwrap();
        let graph = KnnGraph::build(&coords, 2, None).unwrap();
        assert_eq!(graph.len(), 5);
        for i in 0..5 {
            assert!(graph.neighbours(i).len() <= 2);
            assert!(!graph.neighbours(i).contains(&i));
        }
        assert_eq!(graph.neighbours(0), &[1, 2]);
        assert_eq!(graph.neighbours(3), &[4, 1]);
    }

    #[test]
    fn test_k_reduced_for_small_inputs() {
        let coords = Coordinates::from_xy(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]).unwrap();
        let graph = KnnGraph::build(&coords, 8, None).unwrap();
        assert!(graph.was_reduced());
        assert_eq!(graph.k_effective, 2);
        assert_eq!(graph.neighbours(1), &[0, 2]);
    }

    #[test]
    fn test_single_area_has_empty_row() {
        let coords = Coordinates::from_xy(&[(0.0, 0.0)]).unwrap();
        let graph = KnnGraph::build(&coords, 4, None).unwrap();
        assert_eq!(graph.k_effective, 0);
        assert!(graph.neighbours(0).is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let coords = Coordinates::from_xy(&[(0.0, 0.0), (1.0, 0.0)]).unwrap();
        assert_eq!(
            KnnGraph::build(&coords, 0, None),
            Err(WeightsError::InvalidNeighbourCount(0))
        );
        let empty = Coordinates::new(2, vec![]).unwrap();
        assert_eq!(KnnGraph::build(&empty, 2, None), Err(WeightsError::EmptyInput));
    }
}

//! Static k-d tree for k-nearest-neighbour queries.
//!
//! Built once over all area coordinates by splitting on the axis of widest
//! spread at the median; leaves hold up to [`KDTREE_LEAF_SIZE`] points.
//! Queries keep a bounded max-heap of the best candidates so far and prune
//! subtrees whose splitting plane is farther than the current worst
//! candidate. Ties are broken by area index, which makes neighbour sets
//! deterministic regardless of traversal order.

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Ordering;

use super::coords::{squared_distance, Coordinates};
use crate::constants::KDTREE_LEAF_SIZE;
use crate::math;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// A neighbour candidate ordered by (squared distance, index).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist2: f64,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// k-d tree borrowing the coordinates it indexes.
#[derive(Debug, Clone)]
pub struct KdTree<'a> {
    coords: &'a Coordinates,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl<'a> KdTree<'a> {
    /// Build the tree. O(n log n).
    pub fn build(coords: &'a Coordinates) -> Self {
        let n = coords.len();
        let mut tree = Self {
            coords,
            order: (0..n).collect(),
            nodes: Vec::with_capacity(2 * n / KDTREE_LEAF_SIZE + 1),
        };
        if n > 0 {
            tree.build_node(0, n);
        }
        tree
    }

    /// Recursively build the node covering `order[start..end]`, returning
    /// its index in `nodes`.
    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        if end - start <= KDTREE_LEAF_SIZE {
            self.nodes.push(Node::Leaf { start, end });
            return id;
        }

        let axis = self.widest_axis(start, end);
        let spread = self.axis_spread(start, end, axis);
        if spread <= 0.0 {
            // All points coincide; no split can separate them.
            self.nodes.push(Node::Leaf { start, end });
            return id;
        }

        let mid = start + (end - start) / 2;
        let coords = self.coords;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            coords.point(a)[axis].total_cmp(&coords.point(b)[axis])
        });
        let value = coords.point(self.order[mid])[axis];

        // Reserve our slot, then fill in children.
        self.nodes.push(Node::Leaf { start, end });
        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[id] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        id
    }

    fn axis_spread(&self, start: usize, end: usize, axis: usize) -> f64 {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &i in &self.order[start..end] {
            let v = self.coords.point(i)[axis];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        hi - lo
    }

    fn widest_axis(&self, start: usize, end: usize) -> usize {
        (0..self.coords.dim())
            .map(|axis| (axis, self.axis_spread(start, end, axis)))
            .fold((0, f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
            .0
    }

    /// The up to `k` nearest neighbours of point `query`, excluding itself,
    /// sorted by (distance, index).
    ///
    /// When `max_dist` is given, neighbours farther than it are never
    /// returned, so fewer than `k` (possibly zero) may come back.
    pub fn nearest(&self, query: usize, k: usize, max_dist: Option<f64>) -> Vec<usize> {
        if k == 0 || self.nodes.is_empty() {
            return Vec::new();
        }
        let bound2 = max_dist.map(math::sq).unwrap_or(f64::INFINITY);
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        self.search(0, query, k, bound2, &mut heap);

        let mut found = heap.into_vec();
        found.sort();
        found.into_iter().map(|c| c.index).collect()
    }

    fn search(
        &self,
        node: usize,
        query: usize,
        k: usize,
        bound2: f64,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let q = self.coords.point(query);
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &i in &self.order[start..end] {
                    if i == query {
                        continue;
                    }
                    let cand = Candidate {
                        dist2: squared_distance(q, self.coords.point(i)),
                        index: i,
                    };
                    if cand.dist2 > bound2 {
                        continue;
                    }
                    if heap.len() < k {
                        heap.push(cand);
                    } else if heap.peek().is_some_and(|worst| cand < *worst) {
                        heap.pop();
                        heap.push(cand);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = q[axis] - value;
                let (near, far) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.search(near, query, k, bound2, heap);

                // Equal distances must still be visited so ties resolve by index.
                let plane2 = math::sq(diff);
                let worst = if heap.len() < k {
                    bound2
                } else {
                    heap.peek().map(|c| c.dist2).unwrap_or(bound2).min(bound2)
                };
                if plane2 <= worst {
                    self.search(far, query, k, bound2, heap);
                }
            }
        }
    }
}

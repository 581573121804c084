//! Spatial neighbourhood structure over areas.
//!
//! The pipeline approximates geographic adjacency with a k-nearest-neighbour
//! graph over area coordinates, which are either true centroids or a proxy
//! embedding derived from the area codes:
//!
//! ```text
//! Coordinates ──► KdTree ──► KnnGraph (≤ k per row, directed)
//!                                │ symmetrize, binarize
//!                                ▼
//!                          SpatialWeights (CSR, row-stochastic)
//!                                │
//!                                ▼
//!                          LogDetTable  log det(I − ρW) on a ρ grid
//! ```
//!
//! Everything stays sparse: memory is O(n·k), never O(n²), except for the
//! exact log-determinant path which is only taken for small n.

mod coords;
mod kdtree;
mod knn;
mod logdet;
mod weights;

pub use coords::Coordinates;
pub use kdtree::KdTree;
pub use knn::KnnGraph;
pub use logdet::{LogDetMethod, LogDetTable};
pub use weights::SpatialWeights;

use alloc::string::String;

/// Errors raised while building the spatial structure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightsError {
    /// No areas to build a graph over.
    #[error("cannot build spatial weights over zero areas")]
    EmptyInput,

    /// The neighbour count is unusable.
    #[error("neighbour count k must be at least 1, got {0}")]
    InvalidNeighbourCount(usize),

    /// Coordinate buffer does not match the declared dimension.
    #[error("coordinate buffer of length {len} is not a multiple of dimension {dim}")]
    DimensionMismatch {
        /// Declared dimension.
        dim: usize,
        /// Buffer length.
        len: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("coordinate of area {index} is not finite")]
    NonFiniteCoordinate {
        /// Area index.
        index: usize,
    },

    /// A CSR matrix read back from disk is inconsistent.
    #[error("invalid sparse matrix: {0}")]
    InvalidCsr(String),
}

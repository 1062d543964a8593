//! Error types.

use crate::{DiamondId, PointId, TriangleId};

/// Errors from building a [`View`](crate::View) out of raw matrices.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ViewError {
    /// The viewport has zero or negative width or height.
    #[error("viewport {0:?} has no area")]
    EmptyViewport([i32; 4]),

    /// A matrix entry is NaN or infinite.
    #[error("{0} matrix contains non-finite entries")]
    NonFiniteMatrix(&'static str),
}

/// A broken mesh invariant reported by [`Sphere::validate`](crate::Sphere::validate).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TopologyError {
    /// A point's reference count disagrees with the leaves citing it.
    #[error("point {point:?} counts {recorded} triangles but {actual} leaves use it")]
    RefCount {
        point: PointId,
        recorded: u32,
        actual: u32,
    },

    /// A leaf links to a neighbour that does not link back.
    #[error("leaf {triangle:?} links to {neighbor:?}, which does not link back")]
    OneWayNeighbor {
        triangle: TriangleId,
        neighbor: TriangleId,
    },

    /// A leaf links to a triangle that is not a live leaf.
    #[error("leaf {triangle:?} links to non-leaf {neighbor:?}")]
    NeighborNotLeaf {
        triangle: TriangleId,
        neighbor: TriangleId,
    },

    /// A triangle is queued and has children, or neither.
    #[error("triangle {0:?} is half leaf, half internal")]
    HalfState(TriangleId),

    /// A leaf's parent diamond does not list the leaf's parent triangle.
    #[error("leaf {triangle:?} is not a grandchild of its diamond {diamond:?}")]
    ForeignParent {
        triangle: TriangleId,
        diamond: DiamondId,
    },

    /// A diamond's activity disagrees with whether it can be merged.
    #[error("diamond {diamond:?} active={active} but mergeable={mergeable}")]
    DiamondQueue {
        diamond: DiamondId,
        active: bool,
        mergeable: bool,
    },

    /// The polygon counter disagrees with the triangle queue.
    #[error("polygon count {recorded} but {queued} leaves queued")]
    PolyCount { recorded: usize, queued: usize },
}

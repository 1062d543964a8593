//! ROAM (Realtime Optimally-Adapting Meshes) on a full globe.
//!
//! A [`Sphere`] starts as an octahedron of eight root triangles and is
//! refined and coarsened every frame from per-triangle screen-space error.
//! Triangles are split in base-neighbour pairs, producing a [`Diamond`] that a
//! later merge reverses. All mesh records live in generation-checked arenas so
//! a stale id is detected rather than aliased.

mod arena;
mod diamond;
mod error;
mod geo;
mod heap;
mod point;
mod sphere;
mod triangle;
mod validate;
mod view;

pub use arena::{DiamondId, PointId, TriangleId};
pub use diamond::Diamond;
pub use error::{TopologyError, ViewError};
pub use geo::{EARTH_RADIUS, GeoBounds, lle_to_xyz, lon_avg};
pub use heap::{HeapOrder, IndexedHeap, QueueHandle};
pub use point::{HeightFn, Point};
pub use sphere::{ROOT_COUNT, RoamSettings, Sphere, SphereStats};
pub use triangle::{Neighbors, Triangle, Vertices};
pub use view::View;

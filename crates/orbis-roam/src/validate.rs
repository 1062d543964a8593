//! Whole-mesh consistency check.

use rustc_hash::FxHashMap;

use crate::{PointId, Sphere, TopologyError};

impl Sphere {
    /// Walk the whole mesh and report the first broken invariant.
    ///
    /// Read-only and linear in the mesh size; intended for tests and debug
    /// builds rather than every frame of a release build.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.polys != self.triangle_queue.len() {
            return Err(TopologyError::PolyCount {
                recorded: self.polys,
                queued: self.triangle_queue.len(),
            });
        }

        let mut uses: FxHashMap<PointId, u32> = FxHashMap::default();
        for (id, triangle) in self.triangles.iter() {
            if triangle.is_leaf() == triangle.children.is_some() {
                return Err(TopologyError::HalfState(id));
            }
            if !triangle.is_leaf() {
                continue;
            }
            for p in triangle.vertices.to_array() {
                *uses.entry(p).or_default() += 1;
            }

            for neighbor in triangle.neighbors.to_array() {
                let Some(other) = self.triangles.get(neighbor).filter(|t| t.is_leaf()) else {
                    return Err(TopologyError::NeighborNotLeaf {
                        triangle: id,
                        neighbor,
                    });
                };
                if !other.neighbors.to_array().contains(&id) {
                    return Err(TopologyError::OneWayNeighbor {
                        triangle: id,
                        neighbor,
                    });
                }
            }

            if let Some(diamond) = triangle.parent {
                let adopted = self.diamonds.get(diamond).is_some_and(|d| {
                    d.parents.iter().any(|&p| {
                        self.triangles
                            .get(p)
                            .and_then(|parent| parent.children)
                            .is_some_and(|kids| kids.contains(&id))
                    })
                });
                if !adopted {
                    return Err(TopologyError::ForeignParent {
                        triangle: id,
                        diamond,
                    });
                }
            }
        }

        for (id, point) in self.points.iter() {
            let actual = uses.get(&id).copied().unwrap_or(0);
            if point.tris != actual {
                return Err(TopologyError::RefCount {
                    point: id,
                    recorded: point.tris,
                    actual,
                });
            }
        }

        for (id, diamond) in self.diamonds.iter() {
            let mergeable = self.diamond_mergeable(id);
            if diamond.is_active() != mergeable {
                return Err(TopologyError::DiamondQueue {
                    diamond: id,
                    active: diamond.is_active(),
                    mergeable,
                });
            }
        }
        Ok(())
    }
}

//! Triangles: creation, queue membership, screen-space error and splitting.

use glam::DVec3;
use tracing::trace;

use crate::arena::Arena;
use crate::geo::{is_pole, lon_avg};
use crate::{Diamond, DiamondId, GeoBounds, Point, PointId, QueueHandle, Sphere, TriangleId, View};

/// Longest chain of base neighbours a single split may force.
///
/// Each forced split steps one level coarser, so the chain is bounded by
/// the subdivision depth, which f64 lat/lon runs out of well before this.
const MAX_FORCED_SPLITS: usize = 128;

/// Corner points in winding order.
///
/// The base edge runs from `right` back to `left`; `middle` is the apex
/// opposite it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vertices {
    pub left: PointId,
    pub middle: PointId,
    pub right: PointId,
}

impl Vertices {
    pub fn to_array(self) -> [PointId; 3] {
        [self.left, self.middle, self.right]
    }
}

/// Adjacent triangles, one per edge.
///
/// `left` shares the left-middle edge, `right` the middle-right edge and
/// `base` the right-left edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbors {
    pub left: TriangleId,
    pub base: TriangleId,
    pub right: TriangleId,
}

impl Neighbors {
    pub(crate) const UNLINKED: Self = Self {
        left: TriangleId::UNLINKED,
        base: TriangleId::UNLINKED,
        right: TriangleId::UNLINKED,
    };

    pub fn to_array(self) -> [TriangleId; 3] {
        [self.left, self.base, self.right]
    }

    /// Point the link that references `old` at `new` instead.
    fn replace(&mut self, old: TriangleId, new: TriangleId) -> bool {
        if self.left == old {
            self.left = new;
        } else if self.base == old {
            self.base = new;
        } else if self.right == old {
            self.right = new;
        } else {
            return false;
        }
        true
    }
}

/// A mesh triangle, either a queued leaf or an internal node with two
/// children.
#[derive(Clone, Debug)]
pub struct Triangle {
    pub(crate) vertices: Vertices,
    pub(crate) neighbors: Neighbors,
    /// Vertex a split of this triangle would introduce on the base edge.
    pub(crate) split: PointId,
    /// Diamond produced by the split that created this triangle.
    pub(crate) parent: Option<DiamondId>,
    pub(crate) children: Option<[TriangleId; 2]>,
    pub(crate) normal: DVec3,
    /// Area-weighted screen error; -1 when not visible.
    pub(crate) error: f64,
    pub(crate) bounds: GeoBounds,
    pub(crate) handle: Option<QueueHandle>,
}

impl Triangle {
    fn new(
        vertices: Vertices,
        corners: [&Point; 3],
        split: PointId,
        parent: Option<DiamondId>,
    ) -> Self {
        let [l, m, r] = corners;
        let normal = (l.xyz - m.xyz).cross(r.xyz - m.xyz).normalize_or_zero();
        let bounds = GeoBounds::from_corners(&[(l.lat, l.lon), (m.lat, m.lon), (r.lat, r.lon)]);
        Self {
            vertices,
            neighbors: Neighbors::UNLINKED,
            split,
            parent,
            children: None,
            normal,
            error: -1.0,
            bounds,
            handle: None,
        }
    }

    pub fn vertices(&self) -> Vertices {
        self.vertices
    }

    pub fn neighbors(&self) -> Neighbors {
        self.neighbors
    }

    pub fn split_point(&self) -> PointId {
        self.split
    }

    pub fn parent(&self) -> Option<DiamondId> {
        self.parent
    }

    pub fn children(&self) -> Option<[TriangleId; 2]> {
        self.children
    }

    /// Unit face normal, fixed at creation.
    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Whether this triangle is currently part of the rendered mesh.
    pub fn is_leaf(&self) -> bool {
        self.handle.is_some()
    }
}

/// Twice-halved cross product of the projected corners; positive when the
/// triangle faces the camera.
fn signed_area(l: DVec3, m: DVec3, r: DVec3) -> f64 {
    ((l.x - m.x) * (r.y - m.y) - (l.y - m.y) * (r.x - m.x)) / 2.0
}

fn visible(view: &View, corners: [DVec3; 3]) -> bool {
    if corners.iter().any(|c| !(0.0..=1.0).contains(&c.z)) {
        return false;
    }
    let min = corners.iter().fold((f64::INFINITY, f64::INFINITY), |acc, c| {
        (acc.0.min(c.x), acc.1.min(c.y))
    });
    let max = corners
        .iter()
        .fold((f64::NEG_INFINITY, f64::NEG_INFINITY), |acc, c| {
            (acc.0.max(c.x), acc.1.max(c.y))
        });
    view.rect_visible(min, max)
}

fn project_corners(
    points: &mut Arena<PointId, Point>,
    view: &View,
    epoch: u64,
    vertices: Vertices,
) -> [DVec3; 3] {
    vertices.to_array().map(|p| {
        let point = &mut points[p];
        point.update_projection(view, epoch);
        point.screen
    })
}

fn triangle_error(
    points: &mut Arena<PointId, Point>,
    triangles: &Arena<TriangleId, Triangle>,
    view: &View,
    epoch: u64,
    silhouette_bias: f64,
    id: TriangleId,
) -> f64 {
    let triangle = &triangles[id];
    let corners = project_corners(points, view, epoch, triangle.vertices);
    if !visible(view, corners) {
        return -1.0;
    }
    let split = &mut points[triangle.split];
    split.update_projection(view, epoch);
    let split = split.screen;

    let [l, m, r] = corners;
    let edge_mid = (l + r) / 2.0;
    let distance = (edge_mid.truncate() - split.truncate()).length();
    let mut error = distance * signed_area(l, m, r);

    // Internal triangles may still name neighbours that were merged away.
    let silhouette = triangle.neighbors.to_array().into_iter().any(|n| {
        triangles.get(n).is_some_and(|neighbor| {
            let [nl, nm, nr] = project_corners(points, view, epoch, neighbor.vertices);
            signed_area(nl, nm, nr) < 0.0
        })
    });
    if silhouette {
        error *= silhouette_bias;
    }
    error
}

impl Sphere {
    /// Allocate a triangle and its split point. The triangle is neither
    /// linked nor queued yet.
    pub(crate) fn new_triangle(
        &mut self,
        left: PointId,
        middle: PointId,
        right: PointId,
        parent: Option<DiamondId>,
    ) -> TriangleId {
        let split = self.new_split_point(left, right);
        let corners = [&self.points[left], &self.points[middle], &self.points[right]];
        let triangle = Triangle::new(
            Vertices {
                left,
                middle,
                right,
            },
            corners,
            split,
            parent,
        );
        self.triangles.insert(triangle)
    }

    /// Midpoint of the `left` to `right` edge, lifted by the height function
    /// inherited from either endpoint.
    pub(crate) fn new_split_point(&mut self, left: PointId, right: PointId) -> PointId {
        let (l, r) = (&self.points[left], &self.points[right]);
        let lon = if is_pole(l.lat) {
            r.lon
        } else if is_pole(r.lat) {
            l.lon
        } else {
            lon_avg(l.lon, r.lon)
        };
        let mut point = Point::new((l.lat + r.lat) / 2.0, lon, (l.elev + r.elev) / 2.0);
        point.height = l.height.clone().or_else(|| r.height.clone());
        point.update_height();
        self.points.insert(point)
    }

    /// Link a triangle to its neighbours, register it with its corners and
    /// queue it as a leaf.
    pub(crate) fn add_triangle(
        &mut self,
        id: TriangleId,
        left: TriangleId,
        base: TriangleId,
        right: TriangleId,
    ) {
        let triangle = &mut self.triangles[id];
        assert!(triangle.handle.is_none(), "triangle {id:?} queued twice");
        triangle.neighbors = Neighbors { left, base, right };
        let (vertices, normal) = (triangle.vertices, triangle.normal);
        for p in vertices.to_array() {
            self.points[p].add_triangle(normal);
        }

        self.update_triangle_errors(id);
        let error = self.triangles[id].error;
        let handle = self.triangle_queue.push(id, error);
        self.triangles[id].handle = Some(handle);
    }

    /// Unregister a leaf from its corners and take it out of the queue.
    pub(crate) fn remove_triangle(&mut self, id: TriangleId) {
        let triangle = &mut self.triangles[id];
        let Some(handle) = triangle.handle.take() else {
            panic!("removing triangle {id:?} that is not queued");
        };
        let (vertices, normal) = (triangle.vertices, triangle.normal);
        self.triangle_queue.remove(handle);
        for p in vertices.to_array() {
            self.points[p].remove_triangle(normal);
        }
    }

    /// Drop an unqueued triangle record along with its unused split point.
    pub(crate) fn free_triangle(&mut self, id: TriangleId) {
        let Some(triangle) = self.triangles.remove(id) else {
            panic!("freeing stale triangle {id:?}");
        };
        assert!(triangle.handle.is_none(), "freeing queued triangle {id:?}");
        self.free_point(triangle.split);
    }

    pub(crate) fn free_point(&mut self, id: PointId) {
        let tris = self.points[id].tris;
        assert_eq!(tris, 0, "freeing point {id:?} still used by {tris} triangles");
        self.points.remove(id);
    }

    /// Recompute one triangle's error from the current view. No-op without
    /// a view.
    pub(crate) fn update_triangle_errors(&mut self, id: TriangleId) {
        let Some(view) = self.view.as_ref() else {
            return;
        };
        let error = triangle_error(
            &mut self.points,
            &self.triangles,
            view,
            self.epoch,
            self.settings.silhouette_bias,
            id,
        );
        self.triangles[id].error = error;
    }

    /// Retarget `neighbor`'s link from `old` to `new`.
    pub(crate) fn relink(&mut self, neighbor: TriangleId, old: TriangleId, new: TriangleId) {
        let linked = self.triangles[neighbor].neighbors.replace(old, new);
        assert!(linked, "{neighbor:?} does not link to {old:?}");
    }

    /// Split a leaf triangle together with its base neighbour.
    ///
    /// If the base neighbour does not share its own base edge with this
    /// triangle it is coarser, and is split first (recursively, up the chain
    /// of base neighbours). The chain is located before anything is mutated
    /// and then split from the far end back.
    pub fn split(&mut self, id: TriangleId) {
        assert!(self.triangles[id].is_leaf(), "splitting non-leaf {id:?}");
        let mut chain = vec![id];
        loop {
            let top = chain[chain.len() - 1];
            let base = self.triangles[top].neighbors.base;
            if self.triangles[base].neighbors.base == top {
                break;
            }
            chain.push(base);
            assert!(
                chain.len() <= MAX_FORCED_SPLITS,
                "split of {id:?} forces more than {MAX_FORCED_SPLITS} base splits"
            );
        }
        while let Some(top) = chain.pop() {
            self.split_pair(top);
        }
    }

    fn split_pair(&mut self, s: TriangleId) {
        let this = &self.triangles[s];
        let (sv, sn, mid, s_parent) = (this.vertices, this.neighbors, this.split, this.parent);
        let b = sn.base;
        let base = &self.triangles[b];
        assert_eq!(
            base.neighbors.base, s,
            "base neighbours {s:?} and {b:?} are not mutual"
        );
        let (bv, bn, b_parent) = (base.vertices, base.neighbors, base.parent);
        debug_assert!(bv.left == sv.right && bv.right == sv.left);

        let diamond = self.diamonds.insert(Diamond::new([s, b]));
        let sl = self.new_triangle(sv.middle, mid, sv.left, Some(diamond));
        let sr = self.new_triangle(sv.right, mid, sv.middle, Some(diamond));
        let bl = self.new_triangle(bv.middle, mid, bv.left, Some(diamond));
        let br = self.new_triangle(bv.right, mid, bv.middle, Some(diamond));
        self.triangles[s].children = Some([sl, sr]);
        self.triangles[b].children = Some([bl, br]);

        self.add_triangle(sl, sr, sn.left, br);
        self.add_triangle(sr, bl, sn.right, sl);
        self.add_triangle(bl, br, bn.left, sr);
        self.add_triangle(br, sl, bn.right, bl);

        self.relink(sn.left, s, sl);
        self.relink(sn.right, s, sr);
        self.relink(bn.left, b, bl);
        self.relink(bn.right, b, br);

        self.remove_triangle(s);
        self.remove_triangle(b);

        self.update_diamond_errors(diamond);
        self.add_diamond(diamond);
        for parent in [s_parent, b_parent].into_iter().flatten() {
            self.remove_diamond(parent);
        }

        self.polys += 2;
        self.splits += 1;
        trace!(?s, ?b, ?diamond, polys = self.polys, "split");
    }
}

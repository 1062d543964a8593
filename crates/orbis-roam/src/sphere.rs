//! The globe mesh: root octahedron, priority queues, per-frame driver and
//! spatial queries.

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::arena::Arena;
use crate::{
    Diamond, DiamondId, GeoBounds, HeapOrder, HeightFn, IndexedHeap, Point, PointId, Triangle,
    TriangleId, View,
};

/// Octahedron corners as `(lat, lon)`: north pole, four equator points 90
/// degrees apart, south pole.
const ROOT_POINTS: [(f64, f64); 6] = [
    (90.0, 0.0),
    (0.0, 0.0),
    (0.0, 90.0),
    (0.0, 180.0),
    (0.0, -90.0),
    (-90.0, 0.0),
];

/// Root triangles: `(left, middle, right)` indices into [`ROOT_POINTS`] and
/// `(left, base, right)` neighbour indices into this table. Northern
/// triangles come first, each sharing its base edge with the southern
/// triangle four entries later.
const ROOT_TRIANGLES: [([usize; 3], [usize; 3]); 8] = [
    ([1, 0, 2], [3, 4, 1]),
    ([2, 0, 3], [0, 5, 2]),
    ([3, 0, 4], [1, 6, 3]),
    ([4, 0, 1], [2, 7, 0]),
    ([2, 5, 1], [5, 0, 7]),
    ([3, 5, 2], [6, 1, 4]),
    ([4, 5, 3], [7, 2, 5]),
    ([1, 5, 4], [4, 3, 6]),
];

/// Number of triangles in the base mesh.
pub const ROOT_COUNT: usize = ROOT_TRIANGLES.len();

/// Tuning for [`Sphere::split_merge`] and the error metric.
#[derive(Clone, Debug, PartialEq)]
pub struct RoamSettings {
    /// Polygon count the driver steers toward.
    pub target_polys: usize,
    /// Upper bound on split/merge steps per call.
    pub max_iterations: usize,
    /// How far from the target the count may drift before the driver
    /// fills or drains in bulk.
    pub slack: usize,
    /// Error multiplier for triangles bordering a back-facing neighbour.
    pub silhouette_bias: f64,
}

impl Default for RoamSettings {
    fn default() -> Self {
        Self {
            target_polys: 2000,
            max_iterations: 500,
            slack: 100,
            silhouette_bias: 500.0,
        }
    }
}

/// Counters describing the current mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SphereStats {
    pub polys: usize,
    pub leaves: usize,
    pub triangles: usize,
    pub diamonds: usize,
    pub active_diamonds: usize,
    pub points: usize,
    pub splits: u64,
    pub merges: u64,
    pub epoch: u64,
}

/// A continuously refined triangle mesh covering the globe.
///
/// All topology changes go through [`Sphere::split`] and [`Sphere::merge`]
/// (or the drivers built on them). Ids handed out by queries stay valid only
/// until the next split or merge; a stale id no longer resolves.
pub struct Sphere {
    pub(crate) points: Arena<PointId, Point>,
    pub(crate) triangles: Arena<TriangleId, Triangle>,
    pub(crate) diamonds: Arena<DiamondId, Diamond>,
    pub(crate) roots: [TriangleId; ROOT_COUNT],
    /// Leaves, largest error first.
    pub(crate) triangle_queue: IndexedHeap<TriangleId>,
    /// Mergeable diamonds, smallest error first.
    pub(crate) diamond_queue: IndexedHeap<DiamondId>,
    pub(crate) view: Option<View>,
    /// Bumped on every view change; points cache projections per epoch.
    pub(crate) epoch: u64,
    pub(crate) polys: usize,
    pub(crate) settings: RoamSettings,
    pub(crate) splits: u64,
    pub(crate) merges: u64,
}

// Callers may hand the whole mesh to another thread behind a lock.
static_assertions::assert_impl_all!(Sphere: Send);

impl Default for Sphere {
    fn default() -> Self {
        Self::new()
    }
}

impl Sphere {
    /// Build the base octahedron with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(RoamSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: RoamSettings) -> Self {
        let mut sphere = Self {
            points: Arena::new(),
            triangles: Arena::new(),
            diamonds: Arena::new(),
            roots: [TriangleId::UNLINKED; ROOT_COUNT],
            triangle_queue: IndexedHeap::new(HeapOrder::Max),
            diamond_queue: IndexedHeap::new(HeapOrder::Min),
            view: None,
            epoch: 0,
            polys: 0,
            settings,
            splits: 0,
            merges: 0,
        };

        let corners = ROOT_POINTS.map(|(lat, lon)| sphere.points.insert(Point::new(lat, lon, 0.0)));
        for (i, ([l, m, r], _)) in ROOT_TRIANGLES.iter().enumerate() {
            let root = sphere.new_triangle(corners[*l], corners[*m], corners[*r], None);
            sphere.roots[i] = root;
        }
        for (i, (_, [left, base, right])) in ROOT_TRIANGLES.iter().enumerate() {
            let roots = sphere.roots;
            sphere.add_triangle(roots[i], roots[*left], roots[*base], roots[*right]);
        }
        sphere.polys = ROOT_COUNT;

        info!(
            polys = sphere.polys,
            target = sphere.settings.target_polys,
            "created sphere"
        );
        sphere
    }

    pub fn settings(&self) -> &RoamSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RoamSettings) {
        self.settings = settings;
    }

    /// Snapshot a new camera. Every cached projection goes stale.
    pub fn update_view(&mut self, view: View) {
        self.view = Some(view);
        self.epoch += 1;
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of leaf triangles in the mesh.
    pub fn polys(&self) -> usize {
        self.polys
    }

    pub fn roots(&self) -> &[TriangleId; ROOT_COUNT] {
        &self.roots
    }

    pub fn triangle(&self, id: TriangleId) -> Option<&Triangle> {
        self.triangles.get(id)
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id)
    }

    pub fn diamond(&self, id: DiamondId) -> Option<&Diamond> {
        self.diamonds.get(id)
    }

    /// Corner points of a triangle, in winding order.
    pub fn corners(&self, id: TriangleId) -> Option<[&Point; 3]> {
        let vertices = self.triangles.get(id)?.vertices;
        Some([
            self.points.get(vertices.left)?,
            self.points.get(vertices.middle)?,
            self.points.get(vertices.right)?,
        ])
    }

    /// Every leaf triangle currently in the mesh, in no particular order.
    pub fn leaves(&self) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangle_queue.iter().map(|(_, id, _)| id)
    }

    /// Diamonds currently eligible for merging.
    pub fn mergeable_diamonds(&self) -> impl Iterator<Item = DiamondId> + '_ {
        self.diamond_queue.iter().map(|(_, id, _)| id)
    }

    pub fn stats(&self) -> SphereStats {
        SphereStats {
            polys: self.polys,
            leaves: self.triangle_queue.len(),
            triangles: self.triangles.len(),
            diamonds: self.diamonds.len(),
            active_diamonds: self.diamond_queue.len(),
            points: self.points.len(),
            splits: self.splits,
            merges: self.merges,
            epoch: self.epoch,
        }
    }

    /// Recompute the error of every queued triangle, then every queued
    /// diamond, and re-sort both queues.
    pub fn update_errors(&mut self) {
        let leaves: Vec<_> = self
            .triangle_queue
            .iter()
            .map(|(handle, id, _)| (handle, id))
            .collect();
        for (handle, id) in leaves {
            self.update_triangle_errors(id);
            self.triangle_queue
                .update_priority(handle, self.triangles[id].error);
        }

        let diamonds: Vec<_> = self
            .diamond_queue
            .iter()
            .map(|(handle, id, _)| (handle, id))
            .collect();
        for (handle, id) in diamonds {
            self.update_diamond_errors(id);
            self.diamond_queue
                .update_priority(handle, self.diamonds[id].error);
        }
    }

    /// Largest leaf error, or negative infinity for an empty queue.
    pub fn max_triangle_error(&self) -> f64 {
        self.triangle_queue
            .peek()
            .map_or(f64::NEG_INFINITY, |(_, error)| error)
    }

    /// Smallest mergeable diamond error, or infinity when nothing can merge.
    pub fn min_diamond_error(&self) -> f64 {
        self.diamond_queue
            .peek()
            .map_or(f64::INFINITY, |(_, error)| error)
    }

    /// Split the leaf with the largest error. Returns `false` if there is none.
    pub fn split_one(&mut self) -> bool {
        match self.triangle_queue.peek() {
            Some((id, _)) => {
                self.split(id);
                true
            }
            None => false,
        }
    }

    /// Merge the diamond with the smallest error. Returns `false` if there
    /// is none.
    pub fn merge_one(&mut self) -> bool {
        match self.diamond_queue.peek() {
            Some((id, _)) => {
                self.merge(id);
                true
            }
            None => false,
        }
    }

    /// One frame of refinement.
    ///
    /// Fills toward the polygon target when far below it, drains when far
    /// above, then trades merges for splits while some leaf has more error
    /// than some mergeable diamond, stopping early once a trade would only
    /// re-split what it merged. Returns the number of steps taken, 0 when
    /// no view has been set.
    pub fn split_merge(&mut self) -> usize {
        if self.view.is_none() {
            return 0;
        }
        let RoamSettings {
            target_polys: target,
            max_iterations,
            slack,
            ..
        } = self.settings;
        let mut iters = 0;

        if self.polys + slack < target {
            while self.polys < target && iters < max_iterations {
                iters += 1;
                if !self.split_one() {
                    break;
                }
            }
        }
        if self.polys > target + slack {
            while self.polys > target && iters < max_iterations {
                iters += 1;
                if !self.merge_one() {
                    break;
                }
            }
        }
        while self.max_triangle_error() > self.min_diamond_error() && iters < max_iterations {
            iters += 1;
            let merged = self
                .diamond_queue
                .peek()
                .map(|(id, _)| self.diamonds[id].parents);
            self.merge_one();
            // Re-splitting a parent of the diamond just merged restores the
            // mesh as it was, so the inversion cannot be traded away.
            let undone = match (merged, self.triangle_queue.peek()) {
                (Some(parents), Some((next, _))) => parents.contains(&next),
                _ => false,
            };
            self.split_one();
            if undone {
                break;
            }
        }

        debug!(
            iters,
            polys = self.polys,
            max_error = self.max_triangle_error(),
            min_error = self.min_diamond_error(),
            "split_merge"
        );
        iters
    }

    /// Triangles whose bounding box overlaps `bounds`.
    ///
    /// Leaves are always returned; internal triangles only when
    /// `include_internal` is set. A leaf that only partly overlaps is
    /// returned whole.
    pub fn get_intersect(&self, bounds: &GeoBounds, include_internal: bool) -> Vec<TriangleId> {
        let mut found = Vec::new();
        for &root in &self.roots {
            self.intersect_rec(root, bounds, include_internal, &mut found);
        }
        found
    }

    fn intersect_rec(
        &self,
        id: TriangleId,
        bounds: &GeoBounds,
        include_internal: bool,
        found: &mut Vec<TriangleId>,
    ) {
        let triangle = &self.triangles[id];
        if !triangle.bounds.overlaps(bounds) {
            return;
        }
        match triangle.children {
            None => found.push(id),
            Some(_) if bounds.contains(&triangle.bounds) => {
                self.collect_subtree(id, include_internal, found);
            }
            Some(children) => {
                if include_internal {
                    found.push(id);
                }
                for child in children {
                    self.intersect_rec(child, bounds, include_internal, found);
                }
            }
        }
    }

    fn collect_subtree(&self, id: TriangleId, include_internal: bool, found: &mut Vec<TriangleId>) {
        match self.triangles[id].children {
            None => found.push(id),
            Some(children) => {
                if include_internal {
                    found.push(id);
                }
                for child in children {
                    self.collect_subtree(child, include_internal, found);
                }
            }
        }
    }

    /// Give every point inside `bounds` a height function and re-derive its
    /// elevation. Returns the number of points updated.
    ///
    /// Vertices and pending split points of all intersecting triangles are
    /// covered, so later splits inherit the function. Follow with
    /// [`Sphere::update_errors`] to re-rank the queues.
    pub fn set_height_func(&mut self, bounds: &GeoBounds, height: HeightFn) -> usize {
        let mut seen = FxHashSet::default();
        for id in self.get_intersect(bounds, true) {
            let triangle = &self.triangles[id];
            let candidates = [
                triangle.vertices.left,
                triangle.vertices.middle,
                triangle.vertices.right,
                triangle.split,
            ];
            for p in candidates {
                let point = &mut self.points[p];
                if !bounds.contains_point(point.lat, point.lon) || !seen.insert(p) {
                    continue;
                }
                point.height = Some(height.clone());
                point.update_height();
            }
        }
        debug!(points = seen.len(), ?bounds, "height function attached");
        seen.len()
    }

    /// Merge every diamond until only the root triangles remain. Returns the
    /// number of merges.
    pub fn merge_all(&mut self) -> usize {
        let mut merged = 0;
        while self.merge_one() {
            merged += 1;
        }
        merged
    }

    /// Collapse the mesh to its roots through ordinary merges, then release
    /// the queues and the view.
    pub fn free(mut self) {
        let merged = self.merge_all();
        debug_assert_eq!(self.polys, ROOT_COUNT);
        self.triangle_queue.clear();
        self.diamond_queue.clear();
        self.view = None;
        info!(merged, splits = self.splits, merges = self.merges, "freed sphere");
    }
}

//! Diamonds: the pair of triangles a split produced children for, and the
//! merge that undoes it.

use tracing::trace;

use crate::{DiamondId, QueueHandle, Sphere, TriangleId};

/// Two triangles sharing a base edge that were split together.
#[derive(Clone, Debug)]
pub struct Diamond {
    pub(crate) parents: [TriangleId; 2],
    /// Larger of the two parents' errors.
    pub(crate) error: f64,
    /// Present while the diamond is in the merge queue.
    pub(crate) handle: Option<QueueHandle>,
}

impl Diamond {
    pub(crate) fn new(parents: [TriangleId; 2]) -> Self {
        Self {
            parents,
            error: 0.0,
            handle: None,
        }
    }

    pub fn parents(&self) -> [TriangleId; 2] {
        self.parents
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    /// Whether the diamond is queued for merging.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl Sphere {
    /// Queue a diamond for merging, or re-sort it if already queued.
    pub(crate) fn add_diamond(&mut self, id: DiamondId) {
        let diamond = &self.diamonds[id];
        let (error, handle) = (diamond.error, diamond.handle);
        match handle {
            Some(handle) => {
                self.diamond_queue.update_priority(handle, error);
            }
            None => {
                let handle = self.diamond_queue.push(id, error);
                self.diamonds[id].handle = Some(handle);
            }
        }
    }

    /// Take a diamond out of the merge queue. Inactive diamonds are left
    /// alone.
    pub(crate) fn remove_diamond(&mut self, id: DiamondId) {
        if let Some(handle) = self.diamonds[id].handle.take() {
            self.diamond_queue.remove(handle);
        }
    }

    pub(crate) fn update_diamond_errors(&mut self, id: DiamondId) {
        let [p0, p1] = self.diamonds[id].parents;
        self.update_triangle_errors(p0);
        self.update_triangle_errors(p1);
        let error = self.triangles[p0].error.max(self.triangles[p1].error);
        self.diamonds[id].error = error;
    }

    /// A diamond can merge once all four of its grandchildren are leaves.
    pub(crate) fn diamond_mergeable(&self, id: DiamondId) -> bool {
        self.diamonds[id].parents.iter().all(|&p| {
            self.triangles[p].children.is_some_and(|kids| {
                kids.iter()
                    .all(|&kid| self.triangles[kid].children.is_none())
            })
        })
    }

    /// Undo the split that produced a diamond.
    ///
    /// Both parents return to the mesh as leaves, the four children and the
    /// shared edge midpoint are freed, and the parents' own diamonds are
    /// queued again if this merge made them mergeable.
    pub fn merge(&mut self, id: DiamondId) {
        let [s, b] = self.diamonds[id].parents;
        let Some([sl, sr]) = self.triangles[s].children.take() else {
            panic!("merging diamond {id:?} whose parent {s:?} has no children");
        };
        let Some([bl, br]) = self.triangles[b].children.take() else {
            panic!("merging diamond {id:?} whose parent {b:?} has no children");
        };
        let kids = [sl, sr, bl, br];
        for kid in kids {
            assert!(
                self.triangles[kid].children.is_none(),
                "merging diamond {id:?} over split child {kid:?}"
            );
        }
        let [sl_out, sr_out, bl_out, br_out] = kids.map(|kid| self.triangles[kid].neighbors.base);

        for kid in kids {
            self.remove_triangle(kid);
        }
        self.remove_diamond(id);
        for kid in kids {
            self.free_triangle(kid);
        }

        // The shared midpoint is unreferenced now; derive a fresh one.
        let this = &self.triangles[s];
        let (mid, left, right) = (this.split, this.vertices.left, this.vertices.right);
        self.free_point(mid);
        let fresh = self.new_split_point(left, right);
        self.triangles[s].split = fresh;

        self.add_triangle(s, sl_out, b, sr_out);
        self.add_triangle(b, bl_out, s, br_out);
        self.relink(sl_out, sl, s);
        self.relink(sr_out, sr, s);
        self.relink(bl_out, bl, b);
        self.relink(br_out, br, b);

        self.diamonds.remove(id);
        self.polys -= 2;
        self.merges += 1;
        trace!(?s, ?b, diamond = ?id, polys = self.polys, "merge");

        let s_parent = self.triangles[s].parent;
        let b_parent = self.triangles[b].parent.filter(|&p| Some(p) != s_parent);
        for parent in [s_parent, b_parent].into_iter().flatten() {
            if self.diamond_mergeable(parent) {
                self.update_diamond_errors(parent);
                self.add_diamond(parent);
            }
        }
    }
}

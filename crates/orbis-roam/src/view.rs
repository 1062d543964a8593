//! Camera snapshot used to project mesh points to window coordinates.

use glam::{DMat4, DVec3, DVec4};

use crate::ViewError;

/// Model matrix, projection matrix and viewport captured for one frame.
///
/// Projection follows the fixed-function object-to-window transform: window
/// x/y are in pixels with y growing upward from the viewport origin, and
/// depth maps the near..far range to 0..1.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    model: DMat4,
    projection: DMat4,
    viewport: [i32; 4],
    combined: DMat4,
}

impl View {
    /// Build a view from matrices and an `[x, y, width, height]` viewport.
    pub fn new(model: DMat4, projection: DMat4, viewport: [i32; 4]) -> Result<Self, ViewError> {
        if viewport[2] <= 0 || viewport[3] <= 0 {
            return Err(ViewError::EmptyViewport(viewport));
        }
        if !model.is_finite() {
            return Err(ViewError::NonFiniteMatrix("model"));
        }
        if !projection.is_finite() {
            return Err(ViewError::NonFiniteMatrix("projection"));
        }
        Ok(Self {
            model,
            projection,
            viewport,
            combined: projection * model,
        })
    }

    /// Build a view from column-major 16-element matrices, as read back from
    /// a GL-style matrix stack.
    pub fn from_cols(
        model: &[f64; 16],
        projection: &[f64; 16],
        viewport: [i32; 4],
    ) -> Result<Self, ViewError> {
        Self::new(
            DMat4::from_cols_array(model),
            DMat4::from_cols_array(projection),
            viewport,
        )
    }

    /// Perspective camera at `eye` looking at `target`.
    ///
    /// `viewport` is `[x, y, width, height]`; the aspect ratio is taken from it.
    pub fn look_at(
        eye: DVec3,
        target: DVec3,
        up: DVec3,
        fov_y_deg: f64,
        near: f64,
        far: f64,
        viewport: [i32; 4],
    ) -> Result<Self, ViewError> {
        if viewport[2] <= 0 || viewport[3] <= 0 {
            return Err(ViewError::EmptyViewport(viewport));
        }
        let aspect = f64::from(viewport[2]) / f64::from(viewport[3]);
        let projection = DMat4::perspective_rh_gl(fov_y_deg.to_radians(), aspect, near, far);
        Self::new(DMat4::look_at_rh(eye, target, up), projection, viewport)
    }

    pub fn model(&self) -> &DMat4 {
        &self.model
    }

    pub fn projection(&self) -> &DMat4 {
        &self.projection
    }

    pub fn viewport(&self) -> [i32; 4] {
        self.viewport
    }

    /// Project a model-space point to window coordinates `(x, y, depth)`.
    ///
    /// Returns `None` when the point lies on the eye plane (`w == 0`).
    #[must_use]
    pub fn project(&self, point: DVec3) -> Option<DVec3> {
        let clip = self.combined * DVec4::new(point.x, point.y, point.z, 1.0);
        if clip.w == 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let [x, y, w, h] = self.viewport;
        Some(DVec3::new(
            f64::from(x) + f64::from(w) * (ndc.x + 1.0) / 2.0,
            f64::from(y) + f64::from(h) * (ndc.y + 1.0) / 2.0,
            (ndc.z + 1.0) / 2.0,
        ))
    }

    /// Whether a window-space rectangle touches the viewport.
    #[must_use]
    pub fn rect_visible(&self, min: (f64, f64), max: (f64, f64)) -> bool {
        let [x, y, w, h] = self.viewport;
        let (left, bottom) = (f64::from(x), f64::from(y));
        let (right, top) = (left + f64::from(w), bottom + f64::from(h));
        !(max.0 < left || max.1 < bottom || min.0 > right || min.1 > top)
    }
}

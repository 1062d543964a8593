//! Mesh vertices.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use crate::View;
use crate::geo::lle_to_xyz;

/// Elevation in metres for a `(lat, lon)` in degrees.
///
/// Any per-source data the function needs is captured by the closure.
pub type HeightFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// A mesh vertex shared by every triangle that uses it.
#[derive(Clone)]
pub struct Point {
    pub(crate) lat: f64,
    pub(crate) lon: f64,
    pub(crate) elev: f64,
    pub(crate) xyz: DVec3,
    /// Window coordinates, valid when `projected_at` matches the sphere epoch.
    pub(crate) screen: DVec3,
    pub(crate) projected_at: Option<u64>,
    pub(crate) normal: DVec3,
    /// Number of leaf triangles using this point as a vertex.
    pub(crate) tris: u32,
    pub(crate) height: Option<HeightFn>,
}

impl Point {
    pub fn new(lat: f64, lon: f64, elev: f64) -> Self {
        Self {
            lat,
            lon,
            elev,
            xyz: lle_to_xyz(lat, lon, elev),
            screen: DVec3::ZERO,
            projected_at: None,
            normal: DVec3::ZERO,
            tris: 0,
            height: None,
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn elev(&self) -> f64 {
        self.elev
    }

    /// Model-space position.
    pub fn position(&self) -> DVec3 {
        self.xyz
    }

    /// Average of the normals of the leaf triangles using this point.
    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    /// Cached window coordinates from the last projection.
    pub fn screen(&self) -> DVec3 {
        self.screen
    }

    /// Number of leaf triangles using this point.
    pub fn triangle_count(&self) -> u32 {
        self.tris
    }

    pub fn height_fn(&self) -> Option<&HeightFn> {
        self.height.as_ref()
    }

    /// Attach (or detach) a height function. Call [`Point::update_height`]
    /// afterwards to apply it.
    pub fn set_height_fn(&mut self, height: Option<HeightFn>) {
        self.height = height;
    }

    /// Re-derive elevation and position from the height function.
    ///
    /// Latitude and longitude never change. Without a height function this
    /// does nothing.
    pub fn update_height(&mut self) {
        if let Some(height) = &self.height {
            self.elev = height(self.lat, self.lon);
            self.xyz = lle_to_xyz(self.lat, self.lon, self.elev);
            self.projected_at = None;
        }
    }

    /// Project to window space unless already projected for `epoch`.
    pub fn update_projection(&mut self, view: &View, epoch: u64) {
        if self.projected_at == Some(epoch) {
            return;
        }
        // On the eye plane: park it outside the depth range so it culls.
        self.screen = view
            .project(self.xyz)
            .unwrap_or(DVec3::new(0.0, 0.0, -1.0));
        self.projected_at = Some(epoch);
    }

    /// Register a leaf triangle with the given face normal.
    pub fn add_triangle(&mut self, normal: DVec3) {
        let count = f64::from(self.tris);
        self.normal = (self.normal * count + normal) / (count + 1.0);
        self.tris += 1;
    }

    /// Unregister a leaf triangle previously added with the same normal.
    pub fn remove_triangle(&mut self, normal: DVec3) {
        assert!(self.tris > 0, "removing a triangle from an unused point");
        let count = f64::from(self.tris);
        self.normal = self.normal * count - normal;
        self.tris -= 1;
        if self.tris > 0 {
            self.normal /= f64::from(self.tris);
        }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point")
            .field("lat", &self.lat)
            .field("lon", &self.lon)
            .field("elev", &self.elev)
            .field("tris", &self.tris)
            .field("height", &self.height.is_some())
            .finish()
    }
}

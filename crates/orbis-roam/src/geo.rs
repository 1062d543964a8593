//! Geographic helpers: lat/lon/elevation to model space and lat/lon boxes.

use glam::DVec3;

/// Mean Earth radius in metres. Elevations are offsets from this radius.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Convert latitude/longitude (degrees) and elevation (metres) to model space.
///
/// The y axis runs through the north pole, longitude 0 lies on +z and
/// longitude 90 on +x.
#[must_use]
pub fn lle_to_xyz(lat: f64, lon: f64, elev: f64) -> DVec3 {
    let radius = EARTH_RADIUS + elev;
    let azimuth = lon.to_radians();
    let inclination = (90.0 - lat).to_radians();
    DVec3::new(
        radius * azimuth.sin() * inclination.sin(),
        radius * inclination.cos(),
        radius * azimuth.cos() * inclination.sin(),
    )
}

/// Circular mean of two longitudes in degrees, taking the short way round.
#[must_use]
pub fn lon_avg(a: f64, b: f64) -> f64 {
    let avg = (a + b) / 2.0;
    if (a - b).abs() > 180.0 {
        if avg >= 0.0 { avg - 180.0 } else { avg + 180.0 }
    } else {
        avg
    }
}

pub(crate) fn is_pole(lat: f64) -> bool {
    lat.abs() == 90.0
}

pub(crate) fn is_seam(lon: f64) -> bool {
    lon.abs() == 180.0
}

/// A latitude/longitude box in degrees.
///
/// `n >= s` and `e >= w` for well-formed boxes; boxes never wrap across the
/// antimeridian.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub n: f64,
    pub s: f64,
    pub e: f64,
    pub w: f64,
}

impl GeoBounds {
    /// The whole globe.
    pub const WORLD: Self = Self {
        n: 90.0,
        s: -90.0,
        e: 180.0,
        w: -180.0,
    };

    #[must_use]
    pub fn new(n: f64, s: f64, e: f64, w: f64) -> Self {
        Self { n, s, e, w }
    }

    /// Bounding box of a triangle's corners given as `(lat, lon)` pairs.
    ///
    /// A pole has every longitude, so it contributes none. A corner on the
    /// antimeridian is recorded after the others: it pushes the box to 180
    /// when the rest of the triangle lies east of Greenwich and to -180
    /// otherwise.
    #[must_use]
    pub fn from_corners(corners: &[(f64, f64)]) -> Self {
        let mut bounds = Self {
            n: -90.0,
            s: 90.0,
            e: -180.0,
            w: 180.0,
        };
        let mut on_seam = false;
        for &(lat, lon) in corners {
            bounds.n = bounds.n.max(lat);
            bounds.s = bounds.s.min(lat);
            if is_pole(lat) {
                continue;
            }
            if is_seam(lon) {
                on_seam = true;
                continue;
            }
            bounds.e = bounds.e.max(lon);
            bounds.w = bounds.w.min(lon);
        }
        if bounds.e < bounds.w {
            // Nothing but poles and seam corners.
            bounds.e = 180.0;
            bounds.w = -180.0;
        } else if on_seam {
            if bounds.e < 0.0 {
                bounds.w = -180.0;
            } else {
                bounds.e = 180.0;
            }
        }
        bounds
    }

    /// Strict overlap: boxes that only touch along an edge do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &GeoBounds) -> bool {
        !(self.n <= other.s || self.s >= other.n || self.e <= other.w || self.w >= other.e)
    }

    /// Whether `other` lies entirely inside `self` (edges inclusive).
    #[must_use]
    pub fn contains(&self, other: &GeoBounds) -> bool {
        other.n <= self.n && other.s >= self.s && other.e <= self.e && other.w >= self.w
    }

    /// Whether a point lies inside the box (edges inclusive).
    ///
    /// Poles match any longitude and a point on the antimeridian matches a
    /// box touching either side of it.
    #[must_use]
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        if lat > self.n || lat < self.s {
            return false;
        }
        if is_pole(lat) {
            return true;
        }
        if is_seam(lon) {
            return self.e == 180.0 || self.w == -180.0;
        }
        lon <= self.e && lon >= self.w
    }
}

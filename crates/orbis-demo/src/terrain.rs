//! Fractal Brownian motion terrain sampled on the unit sphere.

use std::sync::Arc;

use noise::{NoiseFn, Simplex};
use orbis_config::TerrainConfig;
use orbis_roam::{EARTH_RADIUS, HeightFn, lle_to_xyz};

const LACUNARITY: f64 = 2.0;
const PERSISTENCE: f64 = 0.5;

/// Elevation in meters as a function of latitude and longitude.
///
/// Noise is sampled at the 3D surface direction rather than in lat/lon, so
/// there is no seam at the antimeridian and no pinching at the poles.
pub struct Terrain {
    noise: Simplex,
    amplitude: f64,
    frequency: f64,
    octaves: usize,
}

impl Terrain {
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            noise: Simplex::new(config.seed),
            amplitude: config.amplitude_m,
            frequency: config.frequency,
            octaves: config.octaves,
        }
    }

    pub fn sample(&self, lat: f64, lon: f64) -> f64 {
        let dir = lle_to_xyz(lat, lon, 0.0) / EARTH_RADIUS;
        let mut total = 0.0;
        let mut frequency = self.frequency;
        let mut amplitude = self.amplitude;
        for _ in 0..self.octaves {
            let p = dir * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;
            frequency *= LACUNARITY;
            amplitude *= PERSISTENCE;
        }
        total
    }

    /// Geometric sum of the octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        (0..self.octaves)
            .map(|i| self.amplitude * PERSISTENCE.powi(i as i32))
            .sum()
    }

    /// Share the sampler as a mesh height function.
    pub fn into_height_fn(self) -> HeightFn {
        Arc::new(move |lat: f64, lon: f64| self.sample(lat, lon))
    }
}

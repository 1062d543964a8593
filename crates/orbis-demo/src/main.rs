//! Orbit a camera around a terrain-covered globe, keeping the ROAM mesh
//! refined every frame, then report where the detail ended up.

mod obj;
mod terrain;

use std::path::Path;
use std::time::Instant;

use clap::Parser;
use glam::DVec3;
use orbis_config::{CliArgs, Config, RoamConfig, ViewConfig, default_config_dir};
use orbis_roam::{
    GeoBounds, RoamSettings, Sphere, TopologyError, View, ViewError, lle_to_xyz,
};
use tracing::{debug, error, info, warn};

use crate::terrain::Terrain;

/// Camera latitude while orbiting.
const ORBIT_LATITUDE: f64 = 20.0;
/// Edge length of the tiles surveyed after the run.
const TILE_DEGREES: f64 = 30.0;
/// Frames between config hot-reload checks.
const RELOAD_INTERVAL: u32 = 60;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("invalid camera: {0}")]
    View(#[from] ViewError),

    #[error("mesh check failed after frame {frame}: {source}")]
    Topology {
        frame: u32,
        #[source]
        source: TopologyError,
    },

    #[error("failed to export {path}: {source}")]
    Export {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn roam_settings(config: &RoamConfig) -> RoamSettings {
    RoamSettings {
        target_polys: config.target_polys,
        max_iterations: config.max_iterations,
        slack: config.slack,
        silhouette_bias: config.silhouette_bias,
    }
}

fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Camera for `frame`, circling eastward above [`ORBIT_LATITUDE`] and looking
/// at the centre of the globe.
fn orbit_view(config: &ViewConfig, frame: u32) -> Result<View, ViewError> {
    let lon = wrap_lon(f64::from(frame) * config.orbit_degrees_per_frame);
    let eye = lle_to_xyz(ORBIT_LATITUDE, lon, config.orbit_altitude_m);
    let viewport = [
        0,
        0,
        i32::try_from(config.width).unwrap_or(i32::MAX),
        i32::try_from(config.height).unwrap_or(i32::MAX),
    ];
    View::look_at(
        eye,
        DVec3::ZERO,
        DVec3::Y,
        config.fov_deg,
        config.near_m,
        config.far_m,
        viewport,
    )
}

/// Tile of the global grid holding the most leaf triangles.
fn densest_tile(sphere: &Sphere) -> Option<(GeoBounds, usize)> {
    let rows = (180.0 / TILE_DEGREES) as i32;
    let cols = (360.0 / TILE_DEGREES) as i32;
    (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (row, col)))
        .map(|(row, col)| {
            let s = -90.0 + f64::from(row) * TILE_DEGREES;
            let w = -180.0 + f64::from(col) * TILE_DEGREES;
            let tile = GeoBounds::new(s + TILE_DEGREES, s, w + TILE_DEGREES, w);
            (tile, sphere.get_intersect(&tile, false).len())
        })
        .max_by_key(|&(_, count)| count)
}

fn run(
    mut config: Config,
    config_dir: &Path,
    frames: u32,
    obj_path: Option<&Path>,
) -> Result<Sphere, DemoError> {
    let mut sphere = Sphere::with_settings(roam_settings(&config.roam));
    if config.terrain.enabled {
        let terrain = Terrain::new(&config.terrain);
        let peak_m = terrain.max_amplitude();
        let points = sphere.set_height_func(&GeoBounds::WORLD, terrain.into_height_fn());
        info!(points, peak_m, seed = config.terrain.seed, "Terrain attached");
    }

    let start = Instant::now();
    for frame in 0..frames {
        if frame > 0 && frame % RELOAD_INTERVAL == 0 {
            match config.reload(config_dir) {
                Ok(Some(new_config)) => {
                    sphere.set_settings(roam_settings(&new_config.roam));
                    config = new_config;
                    info!(frame, target = config.roam.target_polys, "Applied new settings");
                }
                Ok(None) => {}
                Err(e) => warn!(frame, "Config reload failed: {e}"),
            }
        }

        sphere.update_view(orbit_view(&config.view, frame)?);
        sphere.update_errors();
        let iters = sphere.split_merge();
        if config.debug.validate_every_frame {
            sphere
                .validate()
                .map_err(|source| DemoError::Topology { frame, source })?;
        }
        debug!(
            frame,
            iters,
            polys = sphere.polys(),
            saturated = iters == config.roam.max_iterations,
            "Frame refined"
        );
    }

    let stats = sphere.stats();
    let ms_per_frame = start.elapsed().as_secs_f64() * 1000.0 / f64::from(frames.max(1));
    info!(
        frames,
        polys = stats.polys,
        diamonds = stats.diamonds,
        points = stats.points,
        splits = stats.splits,
        merges = stats.merges,
        ms_per_frame,
        "Orbit finished"
    );
    if let Some((tile, triangles)) = densest_tile(&sphere) {
        info!(
            n = tile.n,
            s = tile.s,
            e = tile.e,
            w = tile.w,
            triangles,
            "Densest tile"
        );
    }
    sphere
        .validate()
        .map_err(|source| DemoError::Topology { frame: frames, source })?;

    if let Some(path) = obj_path {
        let counts = obj::export_obj(path, &sphere).map_err(|source| DemoError::Export {
            path: path.display().to_string(),
            source,
        })?;
        info!(
            path = %path.display(),
            vertices = counts.vertices,
            faces = counts.faces,
            "Wrote OBJ"
        );
    }
    Ok(sphere)
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    orbis_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(2);
    }

    match run(config, &config_dir, args.frames, args.obj.as_deref()) {
        Ok(sphere) => sphere.free(),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Frames simulated when `--frames` is not given.
pub const DEFAULT_FRAMES: u32 = 240;

/// Orbis command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "orbis", about = "Continuous level-of-detail globe mesh")]
pub struct CliArgs {
    /// Number of frames to simulate.
    #[arg(long, default_value_t = DEFAULT_FRAMES)]
    pub frames: u32,

    /// Polygon count to steer toward.
    #[arg(long)]
    pub target_polys: Option<usize>,

    /// Maximum split/merge steps per frame.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Camera altitude above the surface in meters.
    #[arg(long)]
    pub altitude: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Write the final mesh to this Wavefront OBJ file.
    #[arg(long)]
    pub obj: Option<PathBuf>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Default for CliArgs {
    /// Same values as parsing an empty command line.
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            target_polys: None,
            max_iterations: None,
            altitude: None,
            log_level: None,
            obj: None,
            config: None,
        }
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(target) = args.target_polys {
            self.roam.target_polys = target;
        }
        if let Some(iters) = args.max_iterations {
            self.roam.max_iterations = iters;
        }
        if let Some(altitude) = args.altitude {
            self.view.orbit_altitude_m = altitude;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            target_polys: Some(10_000),
            altitude: Some(25_000.0),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.roam.target_polys, 10_000);
        assert_eq!(config.view.orbit_altitude_m, 25_000.0);
        // Non-overridden fields retain defaults
        assert_eq!(config.roam.max_iterations, 500);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "orbis",
            "--frames",
            "10",
            "--max-iterations",
            "64",
            "--log-level",
            "debug",
            "--obj",
            "globe.obj",
        ])
        .unwrap();
        assert_eq!(args.frames, 10);
        assert_eq!(args.max_iterations, Some(64));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.obj, Some(PathBuf::from("globe.obj")));
        assert_eq!(args.target_polys, None);
    }

    #[test]
    fn test_cli_default_frames() {
        let args = CliArgs::try_parse_from(["orbis"]).unwrap();
        assert_eq!(args.frames, 240);
    }

    #[test]
    fn test_default_matches_empty_command_line() {
        let parsed = CliArgs::try_parse_from(["orbis"]).unwrap();
        let built = CliArgs::default();
        assert_eq!(built.frames, DEFAULT_FRAMES);
        assert_eq!(built.frames, parsed.frames);
        assert_eq!(built.target_polys, parsed.target_polys);
        assert_eq!(built.max_iterations, parsed.max_iterations);
        assert_eq!(built.altitude, parsed.altitude);
        assert_eq!(built.log_level, parsed.log_level);
        assert_eq!(built.obj, parsed.obj);
        assert_eq!(built.config, parsed.config);
    }
}

//! Configuration for the Orbis globe tools.
//!
//! Settings persist to disk as RON, every section falls back to defaults when
//! missing, and command-line flags override what was loaded.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, DEFAULT_FRAMES};
pub use config::{Config, DebugConfig, RoamConfig, TerrainConfig, ViewConfig, default_config_dir};
pub use error::ConfigError;

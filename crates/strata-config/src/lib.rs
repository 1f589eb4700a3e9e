//! Configuration for Strata worlds.
//!
//! Settings persist to disk as a RON file and can be overridden from the
//! command line via clap. Missing fields fall back to their defaults so older
//! config files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, WorldConfig, default_config_dir};
pub use error::ConfigError;

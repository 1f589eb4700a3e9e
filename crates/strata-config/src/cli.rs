//! Command-line overrides shared by Strata binaries.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Options that override values loaded from `config.ron`.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// World directory.
    #[arg(long, global = true)]
    pub world: Option<PathBuf>,

    /// Seed for newly created worlds.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Maximum number of region files held open.
    #[arg(long, global = true)]
    pub max_open_files: Option<usize>,

    /// Disable light propagation.
    #[arg(long, global = true)]
    pub no_lighting: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref dir) = args.world {
            self.world.directory = dir.clone();
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(max) = args.max_open_files {
            self.world.max_open_region_files = max;
        }
        if args.no_lighting {
            self.world.lighting = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

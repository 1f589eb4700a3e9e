//! `strata`: maintenance tool for world directories.
//!
//! Run with: `cargo run -p strata-tool -- --world saves/alpha inspect`

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use strata_config::{CliArgs, Config, default_config_dir};
use strata_region::RegionLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Strata world maintenance tool")]
struct ToolArgs {
    #[command(flatten)]
    overrides: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print world metadata.
    Info,

    /// List the region files of one layer.
    Inspect {
        #[arg(long, value_enum, default_value_t = LayerArg::Voxels)]
        layer: LayerArg,

        /// List the chunks stored in region RX RZ instead.
        #[arg(long, num_args = 2, value_names = ["RX", "RZ"], allow_negative_numbers = true)]
        region: Option<Vec<i32>>,
    },

    /// Generate, light and save every chunk within RADIUS of a center chunk.
    Generate {
        #[arg(long, default_value_t = 4)]
        radius: u32,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        cx: i32,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        cz: i32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayerArg {
    Voxels,
    Lights,
    Inventories,
    Blocksdata,
}

impl From<LayerArg> for RegionLayer {
    fn from(arg: LayerArg) -> Self {
        match arg {
            LayerArg::Voxels => RegionLayer::Voxels,
            LayerArg::Lights => RegionLayer::Lights,
            LayerArg::Inventories => RegionLayer::Inventories,
            LayerArg::Blocksdata => RegionLayer::BlocksData,
        }
    }
}

fn main() {
    let args = ToolArgs::parse();

    let config_dir = args
        .overrides
        .config
        .clone()
        .unwrap_or_else(default_config_dir);
    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}, using defaults");
            Config::default()
        }
    };
    config.apply_cli_overrides(&args.overrides);

    strata_log::init_logging(None, cfg!(debug_assertions), Some(&config));
    info!("world directory: {}", config.world.directory.display());

    let result = match args.command {
        Command::Info => commands::info(&config.world.directory).map(|summary| print!("{summary}")),
        Command::Inspect {
            layer,
            region: Some(region),
        } => commands::region_chunks(&config.world.directory, layer.into(), region[0], region[1])
            .map(|chunks| {
                for (cx, cz) in chunks {
                    println!("{cx} {cz}");
                }
            }),
        Command::Inspect { layer, region: None } => {
            commands::inspect(&config.world.directory, layer.into()).map(|regions| {
                for region in regions {
                    println!("{region}");
                }
            })
        }
        Command::Generate { radius, cx, cz } => {
            commands::generate(&config.world, radius, (cx, cz)).map(|count| {
                println!("generated {count} chunks");
            })
        }
    };

    if let Err(e) = result {
        eprintln!("strata: {e}");
        std::process::exit(1);
    }
}

use clap::Parser;
use std::path::PathBuf;

use rasterprep::PansharpMethod;

#[derive(Parser)]
#[command(name = "rasterprep", version, about = "RASTERPREP CLI")]
pub struct CliArgs {
    /// JSON run configuration (base dir, glob pattern sets, extensions,
    /// process options)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rebuild the tile list from a prior run's restart manifest instead of
    /// globbing
    #[arg(long)]
    pub input_csv: Option<PathBuf>,

    /// Pansharpening method (overrides the config file)
    #[arg(long, value_enum)]
    pub method: Option<PansharpMethod>,

    /// Max RAM allocated to the Orfeo Toolbox during pansharp, in megabytes
    #[arg(long)]
    pub ram: Option<usize>,

    /// Overwrite all existing outputs. Careful!
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Run discovery and planning but skip every time-consuming external call
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Delete prep-folder intermediates of error-free images
    #[arg(long, default_value_t = false)]
    pub delete_intermediate: bool,

    /// Repackage final band files as Cloud-Optimized GeoTIFFs
    #[arg(long, default_value_t = false)]
    pub cog: bool,

    /// Restart manifest recording every discovered tile (overrides config)
    #[arg(long)]
    pub out_csv: Option<PathBuf>,

    /// Per-image outcome log (overrides config)
    #[arg(long)]
    pub log_csv: Option<PathBuf>,

    /// Enable logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}

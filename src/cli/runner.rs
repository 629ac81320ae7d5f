use tracing::info;

use rasterprep::api;
use rasterprep::{PipelineConfig, ProcessParams};

use super::args::CliArgs;
use super::errors::AppError;

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    info!("Started");

    let config = match &args.config {
        Some(path) => Some(PipelineConfig::from_file(path)?),
        None => None,
    };
    if config.is_none() && args.input_csv.is_none() {
        return Err(AppError::MissingArgument {
            arg: "--config or --input-csv".to_string(),
        }
        .into());
    }

    let mut process: ProcessParams = config
        .as_ref()
        .map(|c| c.process.clone())
        .unwrap_or_default();
    if let Some(method) = args.method {
        process.method = method;
    }
    if let Some(ram) = args.ram {
        process.ram_mb = ram;
    }
    process.overwrite |= args.overwrite;
    process.dry_run |= args.dry_run;
    process.delete_intermediate |= args.delete_intermediate;
    process.cog |= args.cog;
    if args.log_csv.is_some() {
        process.log_csv = args.log_csv.clone();
    }

    let mut glob = config.map(|c| c.glob);
    if let (Some(glob), Some(out_csv)) = (glob.as_mut(), &args.out_csv) {
        glob.out_csv = Some(out_csv.clone());
    }

    let report = api::run_pipeline(glob.as_ref(), &process, args.input_csv.as_deref())?;

    // The summary must reach the user even when logging is off.
    println!(
        "Processed tiles: {} (pansharpened: {}, already pansharpened: {})",
        report.tiles, report.pansharpened, report.already_sharpened
    );
    println!(
        "Images: {} (merged: {}, single tile: {}, errored: {}, skipped existing outputs: {})",
        report.images,
        report.merged,
        report.single_tile,
        report.errored_images,
        report.skipped_existing
    );

    info!("Finished");
    Ok(())
}

//! High-level, ergonomic library API: discover an archive's work units and
//! drive them through the preparation pipeline. Prefer these entrypoints
//! over the low-level core modules when embedding RASTERPREP.
use std::path::Path;

use tracing::warn;

use crate::core::discovery;
use crate::core::model::{Image, Tile};
use crate::core::params::{GlobParams, ProcessParams};
use crate::core::pipeline::{self, PipelineOptions, PipelineReport};
use crate::error::{Error, Result};
use crate::io::backends::{GdalToolBackend, ProcessingBackend};
use crate::io::report;

/// Discover all work units under the configured base directory, writing the
/// restart manifest when one is configured.
pub fn discover(glob: &GlobParams) -> Result<Vec<Tile>> {
    let tiles = discovery::discover_tiles(glob)?;
    if let Some(requested) = &glob.out_csv {
        if let Some(path) = report::resolve_csv_path(requested) {
            report::write_tile_manifest(&path, &tiles)?;
        }
    }
    Ok(tiles)
}

/// Rebuild the work-unit list from a prior run's restart manifest.
pub fn discover_from_manifest(input_csv: &Path) -> Result<Vec<Tile>> {
    report::read_tile_manifest(input_csv)
}

/// Run the full preparation pipeline with the production tool backend.
///
/// Work units come from `input_csv` when given, otherwise from a fresh
/// discovery pass over `glob`. The run always completes; per-asset failures
/// are recorded in the returned report, not raised.
pub fn run_pipeline(
    glob: Option<&GlobParams>,
    process: &ProcessParams,
    input_csv: Option<&Path>,
) -> Result<PipelineReport> {
    run_pipeline_with_backend(glob, process, input_csv, &GdalToolBackend)
}

/// Pipeline run with a caller-supplied processing backend.
pub fn run_pipeline_with_backend(
    glob: Option<&GlobParams>,
    process: &ProcessParams,
    input_csv: Option<&Path>,
    backend: &dyn ProcessingBackend,
) -> Result<PipelineReport> {
    let mut tiles = match (input_csv, glob) {
        (Some(csv), _) => discover_from_manifest(csv)?,
        (None, Some(glob)) => discover(glob)?,
        (None, None) => {
            return Err(Error::Config(
                "neither glob parameters nor a restart manifest supplied".to_string(),
            ));
        }
    };

    if tiles.is_empty() {
        warn!("No work units discovered; nothing to do");
    }

    let options = PipelineOptions::from(process);
    let (images, run_report) = pipeline::run(&mut tiles, &options, backend);

    if let Some(requested) = &process.log_csv {
        if let Some(path) = report::resolve_csv_path(requested) {
            report::write_image_log(&path, &images)?;
        }
    }

    Ok(run_report)
}

/// Images derived from already-processed tiles, exposed for callers that
/// need per-image outcomes rather than aggregate counts.
pub fn group_processed_tiles(tiles: &[Tile]) -> Vec<Image> {
    pipeline::group_images(tiles)
}

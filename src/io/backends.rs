//! External processing collaborators.
//!
//! Pixel-level work (pansharpening, rescaling, mosaicking, band extraction,
//! COG repackaging) is delegated to command-line tools behind the
//! `ProcessingBackend` trait. Calls are synchronous and blocking with no
//! timeout; a hung tool hangs the run. Every call verifies that the promised
//! output file materialized before reporting success.
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{PansharpMethod, SourceDtype};

/// Errors reported by processing collaborators
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Could not execute {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} failed: {detail}")]
    Failed { tool: String, detail: String },
    #[error("Output file did not materialize: {0}")]
    MissingOutput(PathBuf),
}

/// Narrow functional contracts for the per-stage collaborators.
pub trait ProcessingBackend {
    /// Fuse a multispectral/panchromatic pair into `out`.
    fn pansharpen(
        &self,
        mul: &Path,
        pan: &Path,
        method: PansharpMethod,
        ram_mb: usize,
        out: &Path,
        out_dtype: SourceDtype,
    ) -> Result<(), BackendError>;

    /// Linear/clipped rescale of an N-bit raster to unsigned 8-bit.
    fn rescale_to_u8(&self, input: &Path, out: &Path) -> Result<(), BackendError>;

    /// Mosaic an ordered list of co-registered tiles into one raster.
    /// Spatial reference and transform come from the first tile.
    fn merge_tiles(&self, tiles: &[PathBuf], out: &Path) -> Result<(), BackendError>;

    /// Extract one band (1-based index) into a single-band file.
    fn split_band(&self, raster: &Path, band_index: usize, out: &Path)
    -> Result<(), BackendError>;

    /// Repackage a raster as a Cloud-Optimized GeoTIFF.
    fn cog_convert(&self, input: &Path, out: &Path) -> Result<(), BackendError>;
}

/// Production backend shelling out to the Orfeo Toolbox and GDAL utilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalToolBackend;

fn run_tool(tool: &str, args: &[String]) -> Result<(), BackendError> {
    debug!("Invoking {} {}", tool, args.join(" "));
    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|source| BackendError::Spawn {
            tool: tool.to_string(),
            source,
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("exited with failure").to_string();
        if stderr.contains("not found") && tool.starts_with("otbcli_") {
            warn!(
                "Make sure the environment for OTB is initialized. \
                 See: https://www.orfeo-toolbox.org/CookBook/Installation.html"
            );
        }
        return Err(BackendError::Failed {
            tool: tool.to_string(),
            detail,
        });
    }
    Ok(())
}

fn ensure_output(out: &Path) -> Result<(), BackendError> {
    if out.is_file() {
        Ok(())
    } else {
        Err(BackendError::MissingOutput(out.to_path_buf()))
    }
}

impl ProcessingBackend for GdalToolBackend {
    fn pansharpen(
        &self,
        mul: &Path,
        pan: &Path,
        method: PansharpMethod,
        ram_mb: usize,
        out: &Path,
        out_dtype: SourceDtype,
    ) -> Result<(), BackendError> {
        if method.is_otb() {
            // See: https://www.orfeo-toolbox.org/CookBook/Applications/app_BundleToPerfectSensor.html
            let args = vec![
                "-inp".to_string(),
                pan.display().to_string(),
                "-inxs".to_string(),
                mul.display().to_string(),
                "-method".to_string(),
                method.label().to_string(),
                "-ram".to_string(),
                ram_mb.to_string(),
                "-out".to_string(),
                out.display().to_string(),
                out_dtype.to_string(),
            ];
            run_tool("otbcli_BundleToPerfectSensor", &args)?;
        } else {
            let args = vec![
                "-of".to_string(),
                "GTiff".to_string(),
                "-r".to_string(),
                method.label().to_string(),
                pan.display().to_string(),
                mul.display().to_string(),
                out.display().to_string(),
            ];
            run_tool("gdal_pansharpen.py", &args)?;
        }
        ensure_output(out)
    }

    fn rescale_to_u8(&self, input: &Path, out: &Path) -> Result<(), BackendError> {
        let args = vec![
            "-ot".to_string(),
            "Byte".to_string(),
            "-of".to_string(),
            "GTiff".to_string(),
            "-scale".to_string(),
            input.display().to_string(),
            out.display().to_string(),
        ];
        run_tool("gdal_translate", &args)?;
        ensure_output(out)
    }

    fn merge_tiles(&self, tiles: &[PathBuf], out: &Path) -> Result<(), BackendError> {
        let mut args = vec![
            "-of".to_string(),
            "GTiff".to_string(),
            "-o".to_string(),
            out.display().to_string(),
        ];
        args.extend(tiles.iter().map(|t| t.display().to_string()));
        run_tool("gdal_merge.py", &args)?;
        ensure_output(out)
    }

    fn split_band(
        &self,
        raster: &Path,
        band_index: usize,
        out: &Path,
    ) -> Result<(), BackendError> {
        let args = vec![
            "-of".to_string(),
            "GTiff".to_string(),
            "-b".to_string(),
            band_index.to_string(),
            raster.display().to_string(),
            out.display().to_string(),
        ];
        run_tool("gdal_translate", &args)?;
        ensure_output(out)
    }

    fn cog_convert(&self, input: &Path, out: &Path) -> Result<(), BackendError> {
        let args = vec![
            "-of".to_string(),
            "COG".to_string(),
            "-co".to_string(),
            "COMPRESS=LZW".to_string(),
            input.display().to_string(),
            out.display().to_string(),
        ];
        run_tool("gdal_translate", &args)?;
        ensure_output(out)
    }
}

//! Minimal raster metadata access via GDAL.
//!
//! Discovery only ever opens a raster far enough to read the first band's
//! pixel datatype; pixel data itself is never loaded into this process.
use std::path::Path;

use gdal::Dataset;
use gdal::raster::GdalDataType;
use thiserror::Error;
use tracing::debug;

use crate::types::SourceDtype;

/// Errors encountered when probing rasters
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
    #[error("No raster bands found: {0}")]
    NoBands(String),
    #[error("Unsupported pixel datatype {dtype} in {path}")]
    UnsupportedDtype { dtype: String, path: String },
}

/// Read the datatype of a raster's first band.
pub fn probe_dtype(path: &Path) -> Result<SourceDtype, RasterError> {
    let dataset = Dataset::open(path)?;
    if dataset.raster_count() == 0 {
        return Err(RasterError::NoBands(path.display().to_string()));
    }
    let band = dataset.rasterband(1)?;
    let dtype = match band.band_type() {
        GdalDataType::UInt8 => SourceDtype::UInt8,
        GdalDataType::UInt16 => SourceDtype::UInt16,
        GdalDataType::Int16 => SourceDtype::Int16,
        GdalDataType::UInt32 => SourceDtype::UInt32,
        GdalDataType::Int32 => SourceDtype::Int32,
        GdalDataType::Float32 => SourceDtype::Float32,
        GdalDataType::Float64 => SourceDtype::Float64,
        other => {
            return Err(RasterError::UnsupportedDtype {
                dtype: format!("{:?}", other),
                path: path.display().to_string(),
            });
        }
    };
    debug!("Probed {}: {}", path.display(), dtype);
    Ok(dtype)
}

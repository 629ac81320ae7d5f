//! I/O layer: vendor XML manifest reading, GDAL-backed raster probing,
//! external processing collaborators and CSV reports.
pub mod manifest;
pub use manifest::ManifestError;

pub mod raster;
pub use raster::RasterError;

pub mod backends;
pub use backends::{BackendError, GdalToolBackend, ProcessingBackend};

pub mod report;

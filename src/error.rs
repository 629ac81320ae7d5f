//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, manifest, raster and backend errors, and provides
//! semantic variants for configuration validation and environment failures.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest reader error: {0}")]
    Manifest(#[from] crate::io::ManifestError),

    #[error("Raster probe error: {0}")]
    Raster(#[from] crate::io::RasterError),

    #[error("Backend error: {0}")]
    Backend(#[from] crate::io::BackendError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Restart manifest error: {0}")]
    Restart(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

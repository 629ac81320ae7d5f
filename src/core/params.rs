//! Run configuration suitable for config files and CLI overrides.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::PansharpMethod;

/// One discovery pattern tuple: how to reach multispectral rasters, how to
/// reach their panchromatic partners from there, and which filename markers
/// distinguish the two, e.g.
/// `{ "mul_glob": "**/*_MUL/*-M*_P00?", "pan_rel_glob": "../*_PAN",
///    "mul_marker": "-M", "pan_marker": "-P" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    pub mul_glob: String,
    pub pan_rel_glob: String,
    pub mul_marker: String,
    pub pan_marker: String,
}

/// Discovery parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobParams {
    /// Base directory where globbing occurs. Patterns are relative to it.
    pub base_dir: PathBuf,
    /// Pattern tuples for multispectral/panchromatic pairs.
    #[serde(default)]
    pub patterns: Vec<PatternSet>,
    /// Glob patterns locating already-pansharpened rasters.
    #[serde(default)]
    pub psh_globs: Vec<String>,
    /// File extensions the rasters may bear, e.g. ["tif", "ntf"].
    pub extensions: Vec<String>,
    /// Optional restart manifest recording every discovered tile.
    #[serde(default)]
    pub out_csv: Option<PathBuf>,
}

impl GlobParams {
    /// Fail fast on malformed configuration, before any filesystem work.
    pub fn validate(&self) -> Result<()> {
        if !self.base_dir.is_dir() {
            return Err(Error::Config(format!(
                "base_dir is not a directory: {}",
                self.base_dir.display()
            )));
        }
        if self.patterns.is_empty() && self.psh_globs.is_empty() {
            return Err(Error::Config(
                "no mul/pan patterns and no psh globs supplied".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config("no file extensions supplied".to_string()));
        }
        for (i, p) in self.patterns.iter().enumerate() {
            if p.mul_glob.is_empty()
                || p.pan_rel_glob.is_empty()
                || p.mul_marker.is_empty()
                || p.pan_marker.is_empty()
            {
                return Err(Error::Config(format!(
                    "pattern set {} has an empty field; \
                     mul/pan glob and marker info must be complete",
                    i
                )));
            }
        }
        Ok(())
    }
}

fn default_method() -> PansharpMethod {
    PansharpMethod::OtbBayes
}

fn default_ram_mb() -> usize {
    4096
}

/// Processing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessParams {
    #[serde(default = "default_method")]
    pub method: PansharpMethod,
    /// Max RAM handed to the Orfeo Toolbox, in megabytes.
    #[serde(default = "default_ram_mb")]
    pub ram_mb: usize,
    /// Overwrite existing outputs instead of skipping them. Careful!
    #[serde(default)]
    pub overwrite: bool,
    /// Run discovery and planning but skip every external call.
    #[serde(default)]
    pub dry_run: bool,
    /// Delete prep-folder intermediates of error-free images.
    #[serde(default)]
    pub delete_intermediate: bool,
    /// Repackage final band files as Cloud-Optimized GeoTIFFs.
    #[serde(default)]
    pub cog: bool,
    /// Optional per-image outcome log.
    #[serde(default)]
    pub log_csv: Option<PathBuf>,
}

impl Default for ProcessParams {
    fn default() -> Self {
        Self {
            method: default_method(),
            ram_mb: default_ram_mb(),
            overwrite: false,
            dry_run: false,
            delete_intermediate: false,
            cog: false,
            log_csv: None,
        }
    }
}

/// Full run configuration as loaded from a JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub glob: GlobParams,
    #[serde(default)]
    pub process: ProcessParams,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

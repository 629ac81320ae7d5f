//! Shared types and enums used across RASTERPREP.
//! Includes the processing-step vocabulary (`ProcessStep`), pansharpening
//! backends (`PansharpMethod`) and source pixel datatypes (`SourceDtype`).
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One planned processing operation for a tile or image.
///
/// The canonical execution order is `Merge -> Psh -> Scale -> Split`;
/// discovery emits an ordered subset of it per asset.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStep {
    Merge,
    Psh,
    Scale,
    Split,
}

impl std::fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessStep::Merge => "merge",
            ProcessStep::Psh => "psh",
            ProcessStep::Scale => "scale",
            ProcessStep::Split => "split",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ProcessStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "merge" => Ok(ProcessStep::Merge),
            "psh" => Ok(ProcessStep::Psh),
            "scale" => Ok(ProcessStep::Scale),
            "split" => Ok(ProcessStep::Split),
            other => Err(format!("unknown process step: {}", other)),
        }
    }
}

/// Pansharpening backend selector. The `otb-` variants map to
/// `otbcli_BundleToPerfectSensor` methods, the `gdal-` variants to the
/// resampling algorithm handed to `gdal_pansharpen.py`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PansharpMethod {
    OtbBayes,
    OtbLmvm,
    OtbRcs,
    GdalCubic,
    GdalBilinear,
    GdalLanczos,
}

impl PansharpMethod {
    /// Method name with the tool prefix stripped, as embedded in output
    /// filenames and passed to the underlying tool.
    pub fn label(&self) -> &'static str {
        match self {
            PansharpMethod::OtbBayes => "bayes",
            PansharpMethod::OtbLmvm => "lmvm",
            PansharpMethod::OtbRcs => "rcs",
            PansharpMethod::GdalCubic => "cubic",
            PansharpMethod::GdalBilinear => "bilinear",
            PansharpMethod::GdalLanczos => "lanczos",
        }
    }

    pub fn is_otb(&self) -> bool {
        matches!(
            self,
            PansharpMethod::OtbBayes | PansharpMethod::OtbLmvm | PansharpMethod::OtbRcs
        )
    }
}

impl std::fmt::Display for PansharpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PansharpMethod::OtbBayes => "otb-bayes",
            PansharpMethod::OtbLmvm => "otb-lmvm",
            PansharpMethod::OtbRcs => "otb-rcs",
            PansharpMethod::GdalCubic => "gdal-cubic",
            PansharpMethod::GdalBilinear => "gdal-bilinear",
            PansharpMethod::GdalLanczos => "gdal-lanczos",
        };
        write!(f, "{}", s)
    }
}

/// Pixel datatype of a source raster's first band.
///
/// Display strings follow the lowercase convention the archive's file names
/// carry (`uint16`, `uint8`, ...), so they can be embedded in output names.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDtype {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl SourceDtype {
    /// Rescaling to 8 bit is a no-op for rasters that already are 8 bit.
    pub fn is_eight_bit(&self) -> bool {
        matches!(self, SourceDtype::UInt8)
    }
}

impl std::fmt::Display for SourceDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceDtype::UInt8 => "uint8",
            SourceDtype::UInt16 => "uint16",
            SourceDtype::Int16 => "int16",
            SourceDtype::UInt32 => "uint32",
            SourceDtype::Int32 => "int32",
            SourceDtype::Float32 => "float32",
            SourceDtype::Float64 => "float64",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SourceDtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "uint8" => Ok(SourceDtype::UInt8),
            "uint16" => Ok(SourceDtype::UInt16),
            "int16" => Ok(SourceDtype::Int16),
            "uint32" => Ok(SourceDtype::UInt32),
            "int32" => Ok(SourceDtype::Int32),
            "float32" => Ok(SourceDtype::Float32),
            "float64" => Ok(SourceDtype::Float64),
            other => Err(format!("unknown source datatype: {}", other)),
        }
    }
}

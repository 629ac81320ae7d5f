//! Work-unit records produced by discovery and driven by the pipeline:
//! `Tile` (one physical raster plus its processing context) and `Image`
//! (all tiles of one acquisition, grouped by `ImageKey`).
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{ProcessStep, SourceDtype};

/// The two-part naming convention that distinguishes a multispectral file
/// from its panchromatic partner inside an acquisition, e.g. `-M` / `-P`
/// or `_MSI` / `_PAN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePattern {
    pub mul_marker: String,
    pub pan_marker: String,
}

/// Execution position of a tile, carrying the artifact the next stage
/// consumes. Stages advance the state; an error freezes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileState {
    /// Nothing has run; the next input is the discovered source raster.
    Discovered,
    /// Pansharpening produced (or dry-run planned) this artifact.
    Sharpened(PathBuf),
    /// 8-bit rescale produced this artifact.
    Scaled(PathBuf),
    /// A stage failed; remaining stages for this tile are skipped.
    Errored {
        stage: ProcessStep,
        message: String,
    },
}

impl TileState {
    pub fn error(&self) -> Option<&str> {
        match self {
            TileState::Errored { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// One physical single-tile raster plus its processing context.
///
/// A tile is either an unsharpened mul/pan pair candidate (`mul_tile` and
/// `pan_tile` set) or an already-pansharpened asset (`psh_tile` set), never
/// both. All paths except `base_dir` are relative: `image_folder` to the
/// base directory, `prep_folder` to the image folder, raster paths to the
/// base directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub base_dir: PathBuf,
    pub image_folder: PathBuf,
    pub prep_folder: PathBuf,
    pub dtype: SourceDtype,
    /// Computed once at discovery, never mutated afterwards.
    pub process_steps: Vec<ProcessStep>,
    pub mul_tile: Option<PathBuf>,
    pub pan_tile: Option<PathBuf>,
    pub psh_tile: Option<PathBuf>,
    pub naming: NamePattern,
    pub mul_manifest: PathBuf,
    /// Position of this tile in the manifest's canonical tile sequence.
    pub manifest_index: usize,
    pub state: TileState,
}

impl Tile {
    pub fn is_sharpened_asset(&self) -> bool {
        self.psh_tile.is_some()
    }

    pub fn has_step(&self, step: ProcessStep) -> bool {
        self.process_steps.contains(&step)
    }

    /// Relative path of the raster this tile was discovered from.
    pub fn source_rel(&self) -> &Path {
        match (&self.psh_tile, &self.mul_tile) {
            (Some(psh), _) => psh,
            (_, Some(mul)) => mul,
            // Both unset is ruled out by the discovery constructors.
            _ => Path::new(""),
        }
    }

    /// Absolute prep directory for this tile's outputs.
    pub fn prep_dir(&self) -> PathBuf {
        self.base_dir.join(&self.image_folder).join(&self.prep_folder)
    }

    /// Absolute path of the artifact the next stage should consume.
    pub fn current_input(&self) -> PathBuf {
        match &self.state {
            TileState::Discovered => self.base_dir.join(self.source_rel()),
            TileState::Sharpened(p) | TileState::Scaled(p) => p.clone(),
            TileState::Errored { .. } => self.base_dir.join(self.source_rel()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    pub fn fail(&mut self, stage: ProcessStep, message: impl Into<String>) {
        self.state = TileState::Errored {
            stage,
            message: message.into(),
        };
    }

    pub fn key(&self) -> ImageKey {
        ImageKey {
            base_dir: self.base_dir.clone(),
            image_folder: self.image_folder.clone(),
            prep_folder: self.prep_folder.clone(),
            mul_manifest: self.mul_manifest.clone(),
        }
    }
}

/// Grouping key joining tiles into one logical acquisition. Filenames alone
/// are not a reliable identifier across vendors; this tuple is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageKey {
    pub base_dir: PathBuf,
    pub image_folder: PathBuf,
    pub prep_folder: PathBuf,
    pub mul_manifest: PathBuf,
}

/// All tiles of one acquisition after the per-tile stages ran.
#[derive(Debug, Clone)]
pub struct Image {
    pub base_dir: PathBuf,
    pub image_folder: PathBuf,
    pub prep_folder: PathBuf,
    pub dtype: SourceDtype,
    pub process_steps: Vec<ProcessStep>,
    pub mul_manifest: PathBuf,
    /// Processed per-tile artifacts, in manifest order.
    pub tile_outputs: Vec<PathBuf>,
    pub merge_img: Option<PathBuf>,
    pub band_files: Vec<PathBuf>,
    pub error: Option<String>,
    /// Wall-clock seconds spent on this image's stages.
    pub duration_secs: f64,
}

impl Image {
    pub fn prep_dir(&self) -> PathBuf {
        self.base_dir.join(&self.image_folder).join(&self.prep_folder)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        // First error wins; later stages are skipped anyway.
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }
}

/// Decide which steps an asset still needs.
///
/// `merge` whenever the manifest lists more than one physical tile, `psh`
/// unless the asset is already a sharpened product, `scale` unless the
/// source is already 8-bit unsigned. Band-splitting always runs for
/// error-free images and is not part of the plan.
pub fn compute_plan(
    tile_count: usize,
    dtype: SourceDtype,
    already_sharpened: bool,
) -> Vec<ProcessStep> {
    let mut steps = Vec::new();
    if tile_count > 1 {
        steps.push(ProcessStep::Merge);
    }
    if !already_sharpened {
        steps.push(ProcessStep::Psh);
    }
    if !dtype.is_eight_bit() {
        steps.push(ProcessStep::Scale);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_single_tile_16bit_unsharpened() {
        let plan = compute_plan(1, SourceDtype::UInt16, false);
        assert_eq!(plan, vec![ProcessStep::Psh, ProcessStep::Scale]);
    }

    #[test]
    fn plan_three_tile_8bit_sharpened() {
        let plan = compute_plan(3, SourceDtype::UInt8, true);
        assert_eq!(plan, vec![ProcessStep::Merge]);
    }

    #[test]
    fn plan_multi_tile_16bit_unsharpened() {
        let plan = compute_plan(2, SourceDtype::UInt16, false);
        assert_eq!(
            plan,
            vec![ProcessStep::Merge, ProcessStep::Psh, ProcessStep::Scale]
        );
    }

    #[test]
    fn plan_single_tile_8bit_sharpened_is_empty() {
        assert!(compute_plan(1, SourceDtype::UInt8, true).is_empty());
    }

    fn sample_tile() -> Tile {
        Tile {
            base_dir: PathBuf::from("/data"),
            image_folder: PathBuf::from("A"),
            prep_folder: PathBuf::from("IMG01_PREP"),
            dtype: SourceDtype::UInt16,
            process_steps: vec![ProcessStep::Psh, ProcessStep::Scale],
            mul_tile: Some(PathBuf::from("A/IMG01_MUL/TILE-M1.TIF")),
            pan_tile: Some(PathBuf::from("A/IMG01_PAN/TILE-P1.TIF")),
            psh_tile: None,
            naming: NamePattern {
                mul_marker: "-M".into(),
                pan_marker: "-P".into(),
            },
            mul_manifest: PathBuf::from("A/IMG01_MUL/IMG01.XML"),
            manifest_index: 0,
            state: TileState::Discovered,
        }
    }

    #[test]
    fn state_advances_with_artifacts() {
        let mut tile = sample_tile();
        assert_eq!(
            tile.current_input(),
            PathBuf::from("/data/A/IMG01_MUL/TILE-M1.TIF")
        );

        let psh = PathBuf::from("/data/A/IMG01_PREP/TILE-PSH.TIF");
        tile.state = TileState::Sharpened(psh.clone());
        assert_eq!(tile.current_input(), psh);
        assert!(tile.error().is_none());

        tile.fail(ProcessStep::Scale, "gdal_translate failed");
        assert_eq!(tile.error(), Some("gdal_translate failed"));
    }

    #[test]
    fn tiles_of_one_acquisition_share_a_key() {
        let a = sample_tile();
        let mut b = sample_tile();
        b.mul_tile = Some(PathBuf::from("A/IMG01_MUL/TILE-M2.TIF"));
        b.manifest_index = 1;
        assert_eq!(a.key(), b.key());
    }
}

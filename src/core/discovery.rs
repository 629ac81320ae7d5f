//! Asset discovery engine.
//!
//! Walks a base directory with user-supplied glob patterns, pairs every
//! multispectral raster with its panchromatic partner, probes datatypes,
//! cross-checks the acquisition manifests and emits one `Tile` record per
//! physical raster, each carrying its processing plan. A second pass picks
//! up already-pansharpened rasters so downstream steps can run on them
//! without re-pansharpening.
//!
//! Patterns are resolved against the base directory and `..` components are
//! collapsed lexically; the working directory is never changed, so discovery
//! is safe to run next to unrelated concurrent work.
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, glob_with};
use tracing::{debug, info, warn};

use crate::core::matcher::closest_match;
use crate::core::model::{NamePattern, Tile, TileState, compute_plan};
use crate::core::params::{GlobParams, PatternSet};
use crate::error::{Error, Result};
use crate::io::manifest;
use crate::io::raster::{self, RasterError};
use crate::types::SourceDtype;

fn match_options() -> MatchOptions {
    // Archives mix .TIF and .tif freely; match case-insensitively on every
    // platform instead of relying on filesystem behavior.
    MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// Collapse `.` and `..` components without touching the filesystem, so
/// relative pan globs like `../*_PAN` stay usable as patterns.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The lone XML manifest beside a directory's raster tiles.
fn find_manifest(dir: &Path) -> Option<PathBuf> {
    let mut manifests: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("xml"))
                .unwrap_or(false)
        })
        .collect();
    manifests.sort();
    manifests.into_iter().next()
}

/// Derive the prep-folder name from the input directory names: the common
/// string prefix of the mul and pan directories plus `PREP` (pair mode), or
/// `<dir>_PREP` for an already-sharpened asset with no pan sibling.
fn prep_folder_name(primary_dir: &str, pan_dir: Option<&str>) -> String {
    match pan_dir {
        Some(pan) => {
            let common: String = primary_dir
                .chars()
                .zip(pan.chars())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect();
            format!("{}PREP", common)
        }
        None => format!("{}_PREP", primary_dir),
    }
}

fn create_prep_dir(base_dir: &Path, image_folder: &Path, prep_folder: &str) -> Result<()> {
    let prep = base_dir.join(image_folder).join(prep_folder);
    std::fs::create_dir_all(&prep).map_err(|source| Error::CreateDir { path: prep, source })
}

fn leaf_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Discover all tiles under `params.base_dir`, probing raster datatypes
/// through GDAL.
pub fn discover_tiles(params: &GlobParams) -> Result<Vec<Tile>> {
    discover_tiles_with_probe(params, raster::probe_dtype)
}

/// Discovery with an injected datatype probe. The production probe opens
/// rasters with GDAL; callers that already know the datatype (or tests
/// working on synthetic trees) can substitute their own.
pub fn discover_tiles_with_probe<F>(params: &GlobParams, probe: F) -> Result<Vec<Tile>>
where
    F: Fn(&Path) -> std::result::Result<SourceDtype, RasterError>,
{
    params.validate()?;

    let mut tiles = Vec::new();

    for pattern in &params.patterns {
        for ext in &params.extensions {
            glob_mul_candidates(params, pattern, ext, &probe, &mut tiles)?;
        }
    }

    for psh_glob in &params.psh_globs {
        for ext in &params.extensions {
            glob_psh_candidates(params, psh_glob, ext, &probe, &mut tiles)?;
        }
    }

    // Overlapping pattern/extension products may re-match the same file;
    // keep one record per source raster, in a stable order.
    tiles.sort_by(|a, b| {
        (a.image_folder.as_path(), a.source_rel())
            .cmp(&(b.image_folder.as_path(), b.source_rel()))
    });
    tiles.dedup_by(|a, b| a.source_rel() == b.source_rel());

    info!(
        "Found {} tile(s) of multispectral/panchromatic or pansharpened rasters \
         with provided parameters",
        tiles.len()
    );
    Ok(tiles)
}

fn glob_mul_candidates<F>(
    params: &GlobParams,
    pattern: &PatternSet,
    ext: &str,
    probe: &F,
    tiles: &mut Vec<Tile>,
) -> Result<()>
where
    F: Fn(&Path) -> std::result::Result<SourceDtype, RasterError>,
{
    let mul_pattern = params
        .base_dir
        .join(format!("{}.{}", pattern.mul_glob, ext));
    let mul_pattern = mul_pattern.to_string_lossy().into_owned();
    debug!("Globbing multispectral candidates: {}", mul_pattern);

    for entry in glob_with(&mul_pattern, match_options())? {
        let mul_abs = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("Unreadable glob entry: {}", e);
                continue;
            }
        };
        if !mul_abs.is_file() {
            continue;
        }
        if let Some(tile) = pair_candidate(params, pattern, ext, &mul_abs, probe)? {
            tiles.push(tile);
        }
    }
    Ok(())
}

/// Assemble one pair-mode tile. `Ok(None)` means the candidate was skipped
/// with a recorded warning; only environment failures (prep-dir creation)
/// abort the run.
fn pair_candidate<F>(
    params: &GlobParams,
    pattern: &PatternSet,
    ext: &str,
    mul_abs: &Path,
    probe: &F,
) -> Result<Option<Tile>>
where
    F: Fn(&Path) -> std::result::Result<SourceDtype, RasterError>,
{
    let Ok(mul_rel) = mul_abs.strip_prefix(&params.base_dir) else {
        return Ok(None);
    };
    let mul_rel = mul_rel.to_path_buf();

    // The acquisition root is conventionally two levels above the tile file.
    let Some(mul_dir_rel) = mul_rel.parent() else {
        return Ok(None);
    };
    let image_folder = mul_dir_rel.parent().unwrap_or(Path::new("")).to_path_buf();

    // Panchromatic candidates, relative to the multispectral directory.
    let pan_pattern = normalize(
        &params
            .base_dir
            .join(mul_dir_rel)
            .join(&pattern.pan_rel_glob),
    )
    .join(format!("*.{}", ext));
    let pan_pattern = pan_pattern.to_string_lossy().into_owned();
    let mut pan_candidates: Vec<PathBuf> = glob_with(&pan_pattern, match_options())?
        .flatten()
        .filter(|p| p.is_file())
        .collect();
    pan_candidates.sort();
    if pan_candidates.is_empty() {
        warn!(
            "The provided glob pattern {} could not locate a potential panchromatic \
             raster to match {}. Skipping to next multispectral raster...",
            pan_pattern,
            mul_rel.display()
        );
        return Ok(None);
    }

    let pan_strs: Vec<String> = pan_candidates
        .iter()
        .filter_map(|p| normalize(p).strip_prefix(&params.base_dir).ok().map(PathBuf::from))
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    // Guess the partner's name by marker substitution, then resolve the
    // guess against the real files.
    let mul_name = leaf_name(&mul_rel);
    let pan_guess_name = mul_name.replace(&pattern.mul_marker, &pattern.pan_marker);
    let pan_guess = normalize(&pan_candidates[0].with_file_name(&pan_guess_name));
    let pan_guess_rel = pan_guess
        .strip_prefix(&params.base_dir)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or(pan_guess_name);
    let Some(pan_match) = closest_match(&pan_guess_rel, &pan_strs) else {
        warn!(
            "Panchromatic raster not found to match multispectral raster {}",
            mul_rel.display()
        );
        return Ok(None);
    };
    let pan_rel = PathBuf::from(pan_match);

    // Output dtype follows the original multispectral dtype.
    let dtype = match probe(mul_abs) {
        Ok(d) => d,
        Err(e) => {
            warn!("Could not read {}: {}", mul_abs.display(), e);
            return Ok(None);
        }
    };

    let mul_dir_abs = params.base_dir.join(mul_dir_rel);
    let pan_dir_abs = params
        .base_dir
        .join(pan_rel.parent().unwrap_or(Path::new("")));
    let Some(mul_manifest_abs) = find_manifest(&mul_dir_abs) else {
        warn!("No XML manifest beside {}", mul_rel.display());
        return Ok(None);
    };
    let Some(pan_manifest_abs) = find_manifest(&pan_dir_abs) else {
        warn!("No XML manifest beside {}", pan_rel.display());
        return Ok(None);
    };

    let mul_tiles = match manifest::tile_filenames(&mul_manifest_abs) {
        Ok(t) => t,
        Err(e) => {
            warn!("{}", e);
            return Ok(None);
        }
    };
    let pan_tiles = match manifest::tile_filenames(&pan_manifest_abs) {
        Ok(t) => t,
        Err(e) => {
            warn!("{}", e);
            return Ok(None);
        }
    };
    // Tile-for-tile correspondence between the two lists is assumed
    // downstream and must hold here.
    if mul_tiles.len() != pan_tiles.len() {
        warn!(
            "Tile count mismatch for {}: manifest lists {} multispectral but {} \
             panchromatic tiles. Skipping acquisition candidate.",
            mul_rel.display(),
            mul_tiles.len(),
            pan_tiles.len()
        );
        return Ok(None);
    }
    let Some(manifest_index) = mul_tiles
        .iter()
        .position(|t| t.eq_ignore_ascii_case(&mul_name))
    else {
        warn!(
            "{} is not listed in its manifest {}",
            mul_rel.display(),
            mul_manifest_abs.display()
        );
        return Ok(None);
    };

    let prep_folder = prep_folder_name(
        &leaf_name(mul_dir_rel),
        Some(&leaf_name(&pan_dir_abs)),
    );
    create_prep_dir(&params.base_dir, &image_folder, &prep_folder)?;

    let mul_manifest = mul_manifest_abs
        .strip_prefix(&params.base_dir)
        .unwrap_or(&mul_manifest_abs)
        .to_path_buf();

    debug!(
        "Multispectral image: {}; panchromatic image found: {}; datatype: {}",
        mul_rel.display(),
        pan_rel.display(),
        dtype
    );

    Ok(Some(Tile {
        base_dir: params.base_dir.clone(),
        image_folder,
        prep_folder: PathBuf::from(prep_folder),
        dtype,
        process_steps: compute_plan(mul_tiles.len(), dtype, false),
        mul_tile: Some(mul_rel),
        pan_tile: Some(pan_rel),
        psh_tile: None,
        naming: NamePattern {
            mul_marker: pattern.mul_marker.clone(),
            pan_marker: pattern.pan_marker.clone(),
        },
        mul_manifest,
        manifest_index,
        state: TileState::Discovered,
    }))
}

fn glob_psh_candidates<F>(
    params: &GlobParams,
    psh_glob: &str,
    ext: &str,
    probe: &F,
    tiles: &mut Vec<Tile>,
) -> Result<()>
where
    F: Fn(&Path) -> std::result::Result<SourceDtype, RasterError>,
{
    let psh_pattern = params.base_dir.join(format!("{}.{}", psh_glob, ext));
    let psh_pattern = psh_pattern.to_string_lossy().into_owned();
    debug!("Globbing pansharpened candidates: {}", psh_pattern);

    for entry in glob_with(&psh_pattern, match_options())? {
        let psh_abs = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("Unreadable glob entry: {}", e);
                continue;
            }
        };
        if !psh_abs.is_file() {
            continue;
        }
        if let Some(tile) = sharpened_candidate(params, &psh_abs, probe)? {
            tiles.push(tile);
        }
    }
    Ok(())
}

/// Assemble one already-sharpened tile; `psh` is omitted from its plan so
/// only rescale/merge/split can run on it.
fn sharpened_candidate<F>(
    params: &GlobParams,
    psh_abs: &Path,
    probe: &F,
) -> Result<Option<Tile>>
where
    F: Fn(&Path) -> std::result::Result<SourceDtype, RasterError>,
{
    let Ok(psh_rel) = psh_abs.strip_prefix(&params.base_dir) else {
        return Ok(None);
    };
    let psh_rel = psh_rel.to_path_buf();
    let Some(psh_dir_rel) = psh_rel.parent() else {
        return Ok(None);
    };
    let image_folder = psh_dir_rel.parent().unwrap_or(Path::new("")).to_path_buf();

    let dtype = match probe(psh_abs) {
        Ok(d) => d,
        Err(e) => {
            warn!("Could not read {}: {}", psh_abs.display(), e);
            return Ok(None);
        }
    };

    let psh_dir_abs = params.base_dir.join(psh_dir_rel);
    let Some(manifest_abs) = find_manifest(&psh_dir_abs) else {
        warn!("No XML manifest beside {}", psh_rel.display());
        return Ok(None);
    };
    let psh_tiles = match manifest::tile_filenames(&manifest_abs) {
        Ok(t) => t,
        Err(e) => {
            warn!("{}", e);
            return Ok(None);
        }
    };
    let psh_name = leaf_name(&psh_rel);
    let Some(manifest_index) = psh_tiles
        .iter()
        .position(|t| t.eq_ignore_ascii_case(&psh_name))
    else {
        warn!(
            "{} is not listed in its manifest {}",
            psh_rel.display(),
            manifest_abs.display()
        );
        return Ok(None);
    };

    let prep_folder = prep_folder_name(&leaf_name(psh_dir_rel), None);
    create_prep_dir(&params.base_dir, &image_folder, &prep_folder)?;

    let mul_manifest = manifest_abs
        .strip_prefix(&params.base_dir)
        .unwrap_or(&manifest_abs)
        .to_path_buf();

    debug!("Pansharpened image found: {}", psh_rel.display());

    Ok(Some(Tile {
        base_dir: params.base_dir.clone(),
        image_folder,
        prep_folder: PathBuf::from(prep_folder),
        dtype,
        process_steps: compute_plan(psh_tiles.len(), dtype, true),
        mul_tile: None,
        pan_tile: None,
        psh_tile: Some(psh_rel),
        naming: NamePattern {
            mul_marker: String::new(),
            pan_marker: String::new(),
        },
        mul_manifest,
        manifest_index,
        state: TileState::Discovered,
    }))
}

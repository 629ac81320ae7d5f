//! Pipeline orchestrator.
//!
//! Drives every discovered tile through its planned per-tile stages
//! (pansharpen, rescale), groups the results into images, then drives the
//! per-image stages (merge, band split, optional COG repackaging). Stages
//! honor the canonical `merge -> psh -> scale -> split` order over the
//! planned subset; the per-image pass starts only after every tile reached a
//! terminal state, because an image's tile list must hold processed outputs.
//!
//! Errors never cross unit boundaries: a failed stage freezes its own tile,
//! any errored tile poisons only its own image, and sibling images keep
//! processing. Every stage skips work whose output already exists unless
//! overwrite is requested, which makes repeated runs cheap and safe.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::{info, warn};

use crate::core::model::{Image, ImageKey, Tile, TileState};
use crate::core::params::ProcessParams;
use crate::io::backends::ProcessingBackend;
use crate::io::manifest;
use crate::types::{PansharpMethod, ProcessStep};

/// Vendor tile codes like `R1C2` in tile filenames, rewritten to `Merge` in
/// mosaic output names.
static TILE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"R\wC\w").unwrap());

/// Options steering stage execution.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub method: PansharpMethod,
    pub ram_mb: usize,
    pub overwrite: bool,
    pub dry_run: bool,
    pub delete_intermediate: bool,
    pub cog: bool,
}

impl From<&ProcessParams> for PipelineOptions {
    fn from(params: &ProcessParams) -> Self {
        Self {
            method: params.method,
            ram_mb: params.ram_mb,
            overwrite: params.overwrite,
            dry_run: params.dry_run,
            delete_intermediate: params.delete_intermediate,
            cog: params.cog,
        }
    }
}

/// Aggregate statistics of one run. The run always completes and reports
/// these, even when individual assets failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineReport {
    pub tiles: usize,
    pub pansharpened: usize,
    pub already_sharpened: usize,
    pub eight_bit: usize,
    pub higher_bit: usize,
    pub images: usize,
    pub merged: usize,
    pub single_tile: usize,
    pub skipped_existing: usize,
    pub errored_images: usize,
}

/// Run all planned stages over `tiles` and return the derived images plus
/// run statistics. Per-unit failures are recorded, never raised.
pub fn run(
    tiles: &mut [Tile],
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
) -> (Vec<Image>, PipelineReport) {
    let mut report = PipelineReport {
        tiles: tiles.len(),
        ..PipelineReport::default()
    };

    if options.dry_run {
        warn!("DRY-RUN: external processing calls will be skipped");
    }

    for tile in tiles.iter_mut() {
        if tile.is_sharpened_asset() {
            report.already_sharpened += 1;
        } else {
            report.pansharpened += 1;
        }
        if tile.dtype.is_eight_bit() {
            report.eight_bit += 1;
        } else {
            report.higher_bit += 1;
        }
        run_tile_stages(tile, options, backend, &mut report);
    }

    let mut images = group_images(tiles);
    report.images = images.len();

    for image in images.iter_mut() {
        let started = Instant::now();
        if image.has_step(ProcessStep::Merge) {
            report.merged += 1;
        } else {
            report.single_tile += 1;
        }
        run_image_stages(image, options, backend, &mut report);
        image.duration_secs = started.elapsed().as_secs_f64();
        match &image.error {
            None => info!(
                "Image {} processed in {:.2} minutes",
                image.image_folder.display(),
                image.duration_secs / 60.0
            ),
            Some(err) => {
                report.errored_images += 1;
                warn!("Image {} failed: {}", image.image_folder.display(), err);
            }
        }
    }

    info!(
        "*** Images ***\n\
         Processed tiles: {}\n\
         \tPansharpened: {}\n\
         \tAlready pansharpened: {}\n\
         \t8 bit: {}\n\
         \tHigher bit depth: {}\n\
         \tMerged images: {}\n\
         \tNon tiled images: {}\n\
         \tSkipped existing outputs: {}\n\
         \tErrored images: {}",
        report.tiles,
        report.pansharpened,
        report.already_sharpened,
        report.eight_bit,
        report.higher_bit,
        report.merged,
        report.single_tile,
        report.skipped_existing,
        report.errored_images
    );

    (images, report)
}

fn run_tile_stages(
    tile: &mut Tile,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) {
    if tile.has_step(ProcessStep::Psh) {
        pansharpen_tile(tile, options, backend, report);
    }
    if tile.has_step(ProcessStep::Scale) && tile.error().is_none() {
        rescale_tile(tile, options, backend, report);
    }
    if let TileState::Errored { stage, message } = &tile.state {
        warn!(
            "Tile {} failed at {}: {}",
            tile.source_rel().display(),
            stage,
            message
        );
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn pansharpen_tile(
    tile: &mut Tile,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) {
    let (Some(mul_rel), Some(pan_rel)) = (tile.mul_tile.clone(), tile.pan_tile.clone()) else {
        tile.fail(
            ProcessStep::Psh,
            "pansharpen planned but tile carries no mul/pan pair",
        );
        return;
    };
    let mul = tile.base_dir.join(&mul_rel);
    let pan = tile.base_dir.join(&pan_rel);
    if !mul.is_file() || !pan.is_file() {
        tile.fail(
            ProcessStep::Psh,
            format!(
                "Unable to pansharp due to missing mul {} or pan {}",
                mul.display(),
                pan.display()
            ),
        );
        return;
    }

    // Output name derives from the panchromatic name: the part before the
    // pan marker, the method, the part after, and the source dtype.
    let pan_stem = file_stem(&pan_rel);
    let parts: Vec<&str> = pan_stem.split(tile.naming.pan_marker.as_str()).collect();
    let head = parts.first().copied().unwrap_or(&pan_stem);
    let tail = parts.last().copied().unwrap_or("");
    let out_name = format!(
        "{}-PSH-{}-{}_{}.TIF",
        head,
        options.method.label(),
        tail,
        tile.dtype
    );
    let out = tile.prep_dir().join(out_name);

    if out.is_file() && !options.overwrite {
        warn!("Pansharp already exists: {}. Will not overwrite", out.display());
        report.skipped_existing += 1;
        tile.state = TileState::Sharpened(out);
        return;
    }
    if options.dry_run {
        info!(
            "DRY-RUN: would pansharpen {} + {} -> {}",
            mul.display(),
            pan.display(),
            out.display()
        );
        tile.state = TileState::Sharpened(out);
        return;
    }

    match backend.pansharpen(&mul, &pan, options.method, options.ram_mb, &out, tile.dtype) {
        Ok(()) => tile.state = TileState::Sharpened(out),
        Err(e) => tile.fail(ProcessStep::Psh, e.to_string()),
    }
}

fn rescale_tile(
    tile: &mut Tile,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) {
    let input = tile.current_input();
    let in_stem = file_stem(&input);
    let dtype_suffix = format!("_{}", tile.dtype);
    let trimmed = in_stem.strip_suffix(&dtype_suffix).unwrap_or(&in_stem);
    let out = tile.prep_dir().join(format!("{}_uint8.tif", trimmed));

    if out.is_file() && !options.overwrite {
        warn!("8Bit file already exists: {}. Will not overwrite", out.display());
        report.skipped_existing += 1;
        tile.state = TileState::Scaled(out);
        return;
    }
    if options.dry_run {
        info!("DRY-RUN: would rescale {} -> {}", input.display(), out.display());
        tile.state = TileState::Scaled(out);
        return;
    }

    match backend.rescale_to_u8(&input, &out) {
        Ok(()) => tile.state = TileState::Scaled(out),
        Err(e) => tile.fail(ProcessStep::Scale, e.to_string()),
    }
}

/// Group processed tiles into images by their acquisition key, in manifest
/// order. Tiles sharing a key but disagreeing on dtype or plan mark the
/// image with a consistency error instead of being dropped silently.
pub fn group_images(tiles: &[Tile]) -> Vec<Image> {
    let mut groups: BTreeMap<ImageKey, Vec<&Tile>> = BTreeMap::new();
    for tile in tiles {
        groups.entry(tile.key()).or_default().push(tile);
    }

    let mut images = Vec::with_capacity(groups.len());
    for (key, mut group) in groups {
        group.sort_by_key(|t| t.manifest_index);
        let first = group[0];
        let mut image = Image {
            base_dir: key.base_dir,
            image_folder: key.image_folder,
            prep_folder: key.prep_folder,
            dtype: first.dtype,
            process_steps: first.process_steps.clone(),
            mul_manifest: key.mul_manifest,
            tile_outputs: Vec::with_capacity(group.len()),
            merge_img: None,
            band_files: Vec::new(),
            error: None,
            duration_secs: 0.0,
        };
        for tile in &group {
            if tile.dtype != first.dtype || tile.process_steps != first.process_steps {
                image.set_error(format!(
                    "Inconsistent tiles grouped into acquisition {}: \
                     dtype or plan differs across the manifest's tiles",
                    image.image_folder.display()
                ));
            }
            if let Some(msg) = tile.error() {
                image.set_error(format!("{}: {}", tile.source_rel().display(), msg));
            }
            image.tile_outputs.push(tile.current_input());
        }
        images.push(image);
    }
    images
}

impl Image {
    fn has_step(&self, step: ProcessStep) -> bool {
        self.process_steps.contains(&step)
    }
}

fn run_image_stages(
    image: &mut Image,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) {
    if let Some(err) = image.error.clone() {
        warn!(
            "Skipping merge/split for {}: {}",
            image.image_folder.display(),
            err
        );
        return;
    }

    let artifact = if image.has_step(ProcessStep::Merge) {
        match merge_image(image, options, backend, report) {
            Some(merged) => merged,
            None => return,
        }
    } else {
        image.tile_outputs[0].clone()
    };

    split_image(image, &artifact, options, backend, report);

    if options.cog && image.error.is_none() {
        cog_image(image, options, backend, report);
    }

    if options.delete_intermediate && image.error.is_none() && !options.dry_run {
        delete_intermediates(image);
    }
}

fn merge_image(
    image: &mut Image,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) -> Option<PathBuf> {
    let first_stem = file_stem(&image.tile_outputs[0]);
    let merged_name = format!("{}.tif", TILE_CODE.replace_all(&first_stem, "Merge"));
    let out = image.prep_dir().join(merged_name);

    if out.is_file() && !options.overwrite {
        warn!("Merge file already exists: {}. Will not overwrite", out.display());
        report.skipped_existing += 1;
        image.merge_img = Some(out.clone());
        return Some(out);
    }
    if options.dry_run {
        info!(
            "DRY-RUN: would merge {} tile(s) -> {}",
            image.tile_outputs.len(),
            out.display()
        );
        image.merge_img = Some(out.clone());
        return Some(out);
    }

    match backend.merge_tiles(&image.tile_outputs, &out) {
        Ok(()) => {
            image.merge_img = Some(out.clone());
            Some(out)
        }
        Err(e) => {
            image.set_error(format!("Could not merge image {}: {}", out.display(), e));
            None
        }
    }
}

fn split_image(
    image: &mut Image,
    artifact: &Path,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) {
    let manifest_path = image.base_dir.join(&image.mul_manifest);
    let bands = match manifest::band_order(&manifest_path) {
        Ok(b) => b,
        Err(e) => {
            image.set_error(e.to_string());
            return;
        }
    };

    let stem = file_stem(artifact);
    for (idx, band) in bands.iter().enumerate() {
        let out = image.prep_dir().join(format!("{}_{}.tif", stem, band));
        if out.is_file() && !options.overwrite {
            warn!(
                "{} file already exists: {}. Will not overwrite",
                band,
                out.display()
            );
            report.skipped_existing += 1;
            image.band_files.push(out);
            continue;
        }
        if options.dry_run {
            info!("DRY-RUN: would split band {} -> {}", band, out.display());
            image.band_files.push(out);
            continue;
        }
        match backend.split_band(artifact, idx + 1, &out) {
            Ok(()) => image.band_files.push(out),
            Err(e) => {
                image.set_error(format!(
                    "Could not write singleband image {}: {}",
                    out.display(),
                    e
                ));
                // An unreadable raster fails every remaining band the same way.
                return;
            }
        }
    }
}

/// Repackage the final band files as Cloud-Optimized GeoTIFFs.
fn cog_image(
    image: &mut Image,
    options: &PipelineOptions,
    backend: &dyn ProcessingBackend,
    report: &mut PipelineReport,
) {
    let psh_marker = format!("-PSH-{}-", options.method.label());
    let cog_marker = format!("-PSH-{}-cog-", options.method.label());
    let mut cogs = Vec::new();
    for band in &image.band_files {
        let name = file_stem(band);
        let cog_name = if name.contains(&psh_marker) {
            format!("{}.tif", name.replace(&psh_marker, &cog_marker))
        } else {
            format!("{}-cog.tif", name)
        };
        let out = image.prep_dir().join(cog_name);
        if out.is_file() && !options.overwrite {
            warn!("COG already exists: {}. Will not overwrite", out.display());
            report.skipped_existing += 1;
            cogs.push(out);
            continue;
        }
        if options.dry_run {
            info!("DRY-RUN: would convert {} -> {}", band.display(), out.display());
            cogs.push(out);
            continue;
        }
        match backend.cog_convert(band, &out) {
            Ok(()) => cogs.push(out),
            Err(e) => {
                image.set_error(format!("Could not cog {}: {}", band.display(), e));
                return;
            }
        }
    }
    image.band_files.extend(cogs);
}

/// Delete every raster in the prep folder except the final per-band outputs.
/// Only runs for error-free images, so failed runs keep their intermediates
/// for retries.
fn delete_intermediates(image: &Image) {
    let prep = image.prep_dir();
    let entries = match std::fs::read_dir(&prep) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list prep folder {}: {}", prep.display(), e);
            return;
        }
    };

    let mut victims: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("tif"))
                .unwrap_or(false)
        })
        .filter(|p| !image.band_files.contains(p))
        .collect();
    victims.sort();

    warn!(
        "Will delete {} intermediate file(s) for image {}",
        victims.len(),
        image.image_folder.display()
    );
    for file in victims {
        if let Err(e) = std::fs::remove_file(&file) {
            warn!("Error removing {}: {}", file.display(), e);
        }
    }
}

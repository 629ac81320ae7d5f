//! CSV reports: the restart manifest of discovered tiles and the per-image
//! outcome log. Both use `;` as delimiter. An existing report is never
//! clobbered; a timestamped sibling is written instead.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::model::{Image, NamePattern, Tile, TileState};
use crate::error::{Error, Result};
use crate::types::ProcessStep;

const DELIMITER: u8 = b';';

const TILE_HEADER: &[&str] = &[
    "base_dir",
    "process_steps",
    "dtype",
    "image_folder",
    "mul_marker",
    "pan_marker",
    "mul_tile",
    "pan_tile",
    "psh_tile",
    "prep_folder",
    "mul_manifest",
    "manifest_index",
    "last_processed",
];

/// Pick the actual output path for a report: warn-and-disable on a non-csv
/// name, divert to a timestamped sibling when the file already exists.
pub fn resolve_csv_path(requested: &Path) -> Option<PathBuf> {
    let is_csv = requested
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        warn!("Invalid output csv name: {}", requested.display());
        return None;
    }
    let path = if requested.is_file() {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M");
        let stem = requested
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        requested.with_file_name(format!("{}_{}.csv", stem, stamp))
    } else {
        requested.to_path_buf()
    };
    info!("Report will be saved to: {}", path.display());
    Some(path)
}

fn steps_to_field(steps: &[ProcessStep]) -> String {
    steps
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

fn steps_from_field(field: &str) -> std::result::Result<Vec<ProcessStep>, String> {
    if field.is_empty() {
        return Ok(Vec::new());
    }
    field.split('|').map(|s| s.parse()).collect()
}

fn opt_path_field(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn opt_path_from_field(field: &str) -> Option<PathBuf> {
    if field.is_empty() {
        None
    } else {
        Some(PathBuf::from(field))
    }
}

/// Write the restart manifest: one row per discovered tile.
pub fn write_tile_manifest(path: &Path, tiles: &[Tile]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;
    writer.write_record(TILE_HEADER)?;
    for tile in tiles {
        let last = match &tile.state {
            TileState::Sharpened(p) | TileState::Scaled(p) => p.display().to_string(),
            _ => String::new(),
        };
        writer.write_record(&[
            tile.base_dir.display().to_string(),
            steps_to_field(&tile.process_steps),
            tile.dtype.to_string(),
            tile.image_folder.display().to_string(),
            tile.naming.mul_marker.clone(),
            tile.naming.pan_marker.clone(),
            opt_path_field(&tile.mul_tile),
            opt_path_field(&tile.pan_tile),
            opt_path_field(&tile.psh_tile),
            tile.prep_folder.display().to_string(),
            tile.mul_manifest.display().to_string(),
            tile.manifest_index.to_string(),
            last,
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} tile record(s) to {}", tiles.len(), path.display());
    Ok(())
}

/// Rebuild the tile list from a prior run's restart manifest instead of
/// re-globbing the archive.
pub fn read_tile_manifest(path: &Path) -> Result<Vec<Tile>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;

    let mut tiles = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let tile = tile_from_record(&record)
            .map_err(|e| Error::Restart(format!("{} row {}: {}", path.display(), row + 2, e)))?;
        tiles.push(tile);
    }
    info!("Read {} tile record(s) from {}", tiles.len(), path.display());
    Ok(tiles)
}

fn tile_from_record(record: &csv::StringRecord) -> std::result::Result<Tile, String> {
    if record.len() != TILE_HEADER.len() {
        return Err(format!(
            "expected {} fields, found {}",
            TILE_HEADER.len(),
            record.len()
        ));
    }
    let field = |idx: usize| record.get(idx).unwrap_or("").to_string();

    let mul_tile = opt_path_from_field(&field(6));
    let pan_tile = opt_path_from_field(&field(7));
    let psh_tile = opt_path_from_field(&field(8));
    // A tile is either a mul/pan pair candidate or a sharpened asset.
    match (&mul_tile, &psh_tile) {
        (Some(_), Some(_)) => {
            return Err("row carries both a mul/pan pair and a psh tile".to_string());
        }
        (None, None) => return Err("row carries neither a mul tile nor a psh tile".to_string()),
        _ => {}
    }

    Ok(Tile {
        base_dir: PathBuf::from(field(0)),
        process_steps: steps_from_field(&field(1))?,
        dtype: field(2).parse()?,
        image_folder: PathBuf::from(field(3)),
        naming: NamePattern {
            mul_marker: field(4),
            pan_marker: field(5),
        },
        mul_tile,
        pan_tile,
        psh_tile,
        prep_folder: PathBuf::from(field(9)),
        mul_manifest: PathBuf::from(field(10)),
        manifest_index: field(11)
            .parse()
            .map_err(|_| format!("bad manifest index: {}", field(11)))?,
        state: TileState::Discovered,
    })
}

/// Write the per-image outcome log.
pub fn write_image_log(path: &Path, images: &[Image]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;
    writer.write_record(["image_folder", "band_files", "error", "duration_secs"])?;
    for image in images {
        let bands = image
            .band_files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("|");
        writer.write_record(&[
            image.image_folder.display().to_string(),
            bands,
            image.error.clone().unwrap_or_default(),
            format!("{:.1}", image.duration_secs),
        ])?;
    }
    writer.flush()?;
    info!(
        "Wrote {} image outcome(s) to {}",
        images.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceDtype;
    use tempfile::TempDir;

    fn sample_tiles(base: &Path) -> Vec<Tile> {
        vec![
            Tile {
                base_dir: base.to_path_buf(),
                image_folder: PathBuf::from("A"),
                prep_folder: PathBuf::from("IMG01_PREP"),
                dtype: SourceDtype::UInt16,
                process_steps: vec![ProcessStep::Merge, ProcessStep::Psh, ProcessStep::Scale],
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
            },
            Tile {
                base_dir: base.to_path_buf(),
                image_folder: PathBuf::from("B"),
                prep_folder: PathBuf::from("IMG02_PSH_PREP"),
                dtype: SourceDtype::UInt8,
                process_steps: vec![],
                mul_tile: None,
                pan_tile: None,
                psh_tile: Some(PathBuf::from("B/IMG02_PSH/SCENE.TIF")),
                naming: NamePattern {
                    mul_marker: String::new(),
                    pan_marker: String::new(),
                },
                mul_manifest: PathBuf::from("B/IMG02_PSH/IMG02.XML"),
                manifest_index: 0,
                state: TileState::Discovered,
            },
        ]
    }

    #[test]
    fn restart_manifest_round_trips() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("manifest.csv");
        let tiles = sample_tiles(dir.path());

        write_tile_manifest(&csv_path, &tiles).unwrap();
        let restored = read_tile_manifest(&csv_path).unwrap();

        assert_eq!(restored, tiles);
    }

    #[test]
    fn row_with_both_pair_and_psh_is_rejected() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("manifest.csv");
        let mut tiles = sample_tiles(dir.path());
        tiles[0].psh_tile = Some(PathBuf::from("bogus.TIF"));

        write_tile_manifest(&csv_path, &tiles).unwrap();
        assert!(matches!(
            read_tile_manifest(&csv_path),
            Err(Error::Restart(_))
        ));
    }

    #[test]
    fn non_csv_name_disables_the_report() {
        assert!(resolve_csv_path(Path::new("out.txt")).is_none());
    }

    #[test]
    fn existing_report_gets_a_timestamped_sibling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.csv");
        std::fs::write(&path, "old").unwrap();

        let resolved = resolve_csv_path(&path).unwrap();
        assert_ne!(resolved, path);
        assert!(resolved.extension().unwrap().eq_ignore_ascii_case("csv"));
    }

    #[test]
    fn image_log_records_outcomes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let image = Image {
            base_dir: dir.path().to_path_buf(),
            image_folder: PathBuf::from("A"),
            prep_folder: PathBuf::from("IMG01_PREP"),
            dtype: SourceDtype::UInt16,
            process_steps: vec![ProcessStep::Psh],
            mul_manifest: PathBuf::from("A/IMG01_MUL/IMG01.XML"),
            tile_outputs: vec![],
            merge_img: None,
            band_files: vec![PathBuf::from("A/IMG01_PREP/x_BAND_B.tif")],
            error: Some("boom".to_string()),
            duration_secs: 12.0,
        };

        write_image_log(&path, &[image]).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("A;A/IMG01_PREP/x_BAND_B.tif;boom;12.0"));
    }
}

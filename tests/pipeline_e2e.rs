//! End-to-end tests over a synthetic archive tree: discovery, restart
//! manifest round-trip, and a full pipeline run through the public API with
//! a fake processing backend that materializes outputs.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rasterprep::core::discovery::discover_tiles_with_probe;
use rasterprep::io::report;
use rasterprep::{
    BackendError, GlobParams, PansharpMethod, PatternSet, ProcessParams, ProcessStep,
    ProcessingBackend, RasterError, SourceDtype,
};

const MUL_MANIFEST: &str = r#"<isd>
  <IMD>
    <BAND_B/><BAND_G/><BAND_R/><BAND_N/>
  </IMD>
  <TIL>
    <TILE><FILENAME>TILE-M_R1C1.TIF</FILENAME></TILE>
    <TILE><FILENAME>TILE-M_R1C2.TIF</FILENAME></TILE>
  </TIL>
</isd>"#;

const PAN_MANIFEST: &str = r#"<isd>
  <TIL>
    <TILE><FILENAME>TILE-P_R1C1.TIF</FILENAME></TILE>
    <TILE><FILENAME>TILE-P_R1C2.TIF</FILENAME></TILE>
  </TIL>
</isd>"#;

/// `A/IMG01_MUL` + `A/IMG01_PAN`, two tile pairs, matching manifests.
fn seed_archive(base: &Path) {
    let mul = base.join("A/IMG01_MUL");
    let pan = base.join("A/IMG01_PAN");
    fs::create_dir_all(&mul).unwrap();
    fs::create_dir_all(&pan).unwrap();
    fs::write(mul.join("TILE-M_R1C1.TIF"), b"mul1").unwrap();
    fs::write(mul.join("TILE-M_R1C2.TIF"), b"mul2").unwrap();
    fs::write(mul.join("IMG01.XML"), MUL_MANIFEST).unwrap();
    fs::write(pan.join("TILE-P_R1C1.TIF"), b"pan1").unwrap();
    fs::write(pan.join("TILE-P_R1C2.TIF"), b"pan2").unwrap();
    fs::write(pan.join("IMG01.XML"), PAN_MANIFEST).unwrap();
}

fn glob_params(base: &Path) -> GlobParams {
    GlobParams {
        base_dir: base.to_path_buf(),
        patterns: vec![PatternSet {
            mul_glob: "**/*_MUL/TILE-M*".to_string(),
            pan_rel_glob: "../*_PAN".to_string(),
            mul_marker: "-M".to_string(),
            pan_marker: "-P".to_string(),
        }],
        psh_globs: vec![],
        extensions: vec!["TIF".to_string()],
        out_csv: None,
    }
}

fn uint16_probe(_: &Path) -> Result<SourceDtype, RasterError> {
    Ok(SourceDtype::UInt16)
}

/// Fake collaborator writing empty outputs for every requested stage.
struct TouchBackend;

impl TouchBackend {
    fn touch(out: &Path) -> Result<(), BackendError> {
        fs::write(out, b"raster").map_err(|source| BackendError::Spawn {
            tool: "touch".to_string(),
            source,
        })
    }
}

impl ProcessingBackend for TouchBackend {
    fn pansharpen(
        &self,
        _mul: &Path,
        _pan: &Path,
        _method: PansharpMethod,
        _ram_mb: usize,
        out: &Path,
        _out_dtype: SourceDtype,
    ) -> Result<(), BackendError> {
        Self::touch(out)
    }

    fn rescale_to_u8(&self, _input: &Path, out: &Path) -> Result<(), BackendError> {
        Self::touch(out)
    }

    fn merge_tiles(&self, _tiles: &[PathBuf], out: &Path) -> Result<(), BackendError> {
        Self::touch(out)
    }

    fn split_band(
        &self,
        _raster: &Path,
        _band_index: usize,
        out: &Path,
    ) -> Result<(), BackendError> {
        Self::touch(out)
    }

    fn cog_convert(&self, _input: &Path, out: &Path) -> Result<(), BackendError> {
        Self::touch(out)
    }
}

#[test]
fn discovery_matches_the_documented_example() {
    let dir = TempDir::new().unwrap();
    seed_archive(dir.path());

    let tiles = discover_tiles_with_probe(&glob_params(dir.path()), uint16_probe).unwrap();

    // Two tile records, one acquisition.
    assert_eq!(tiles.len(), 2);
    for tile in &tiles {
        assert_eq!(
            tile.process_steps,
            vec![ProcessStep::Merge, ProcessStep::Psh, ProcessStep::Scale]
        );
    }
    assert_eq!(tiles[0].key(), tiles[1].key());
    assert_eq!(
        tiles[0].pan_tile.as_deref(),
        Some(Path::new("A/IMG01_PAN/TILE-P_R1C1.TIF"))
    );
    assert_eq!(
        tiles[1].pan_tile.as_deref(),
        Some(Path::new("A/IMG01_PAN/TILE-P_R1C2.TIF"))
    );
}

#[test]
fn full_run_from_restart_manifest_produces_band_files() {
    let dir = TempDir::new().unwrap();
    seed_archive(dir.path());

    let tiles = discover_tiles_with_probe(&glob_params(dir.path()), uint16_probe).unwrap();
    let manifest_csv = dir.path().join("manifest.csv");
    report::write_tile_manifest(&manifest_csv, &tiles).unwrap();

    let process = ProcessParams {
        log_csv: Some(dir.path().join("outcomes.csv")),
        ..ProcessParams::default()
    };
    let report = rasterprep::run_pipeline_with_backend(
        None,
        &process,
        Some(&manifest_csv),
        &TouchBackend,
    )
    .unwrap();

    assert_eq!(report.tiles, 2);
    assert_eq!(report.images, 1);
    assert_eq!(report.merged, 1);
    assert_eq!(report.errored_images, 0);

    let prep = dir.path().join("A/IMG01_PREP");
    // Per-tile pansharp and rescale outputs.
    assert!(prep.join("TILE-PSH-bayes-_R1C1_uint16.TIF").is_file());
    assert!(prep.join("TILE-PSH-bayes-_R1C1_uint8.tif").is_file());
    assert!(prep.join("TILE-PSH-bayes-_R1C2_uint8.tif").is_file());
    // Image-level merge and one file per manifest band.
    assert!(prep.join("TILE-PSH-bayes-_Merge_uint8.tif").is_file());
    for band in ["BAND_B", "BAND_G", "BAND_R", "BAND_N"] {
        assert!(prep.join(format!("TILE-PSH-bayes-_Merge_uint8_{}.tif", band)).is_file());
    }

    // The outcome log landed next to the archive.
    let outcomes = fs::read_to_string(dir.path().join("outcomes.csv")).unwrap();
    assert!(outcomes.contains("A;"));
}

#[test]
fn second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    seed_archive(dir.path());

    let tiles = discover_tiles_with_probe(&glob_params(dir.path()), uint16_probe).unwrap();
    let manifest_csv = dir.path().join("manifest.csv");
    report::write_tile_manifest(&manifest_csv, &tiles).unwrap();

    let process = ProcessParams::default();
    rasterprep::run_pipeline_with_backend(None, &process, Some(&manifest_csv), &TouchBackend)
        .unwrap();
    let second = rasterprep::run_pipeline_with_backend(
        None,
        &process,
        Some(&manifest_csv),
        &TouchBackend,
    )
    .unwrap();

    // psh + scale per tile, merge, and four band splits all skipped.
    assert_eq!(second.skipped_existing, 2 * 2 + 1 + 4);
    assert_eq!(second.errored_images, 0);
}

#[test]
fn dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    seed_archive(dir.path());

    let tiles = discover_tiles_with_probe(&glob_params(dir.path()), uint16_probe).unwrap();
    let manifest_csv = dir.path().join("manifest.csv");
    report::write_tile_manifest(&manifest_csv, &tiles).unwrap();

    let process = ProcessParams {
        dry_run: true,
        ..ProcessParams::default()
    };
    let report = rasterprep::run_pipeline_with_backend(
        None,
        &process,
        Some(&manifest_csv),
        &TouchBackend,
    )
    .unwrap();

    assert_eq!(report.errored_images, 0);
    let prep = dir.path().join("A/IMG01_PREP");
    let produced: Vec<_> = fs::read_dir(&prep).unwrap().flatten().collect();
    assert!(produced.is_empty(), "dry run must not write into {:?}", prep);
}

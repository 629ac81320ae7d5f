//! Vendor XML manifest reader.
//!
//! An acquisition's manifest enumerates the physical tile files composing one
//! logical image (`<TIL><TILE><FILENAME>` entries, in canonical order) and
//! the band layout (`<IMD>` children tagged `BAND_*`). Manifest order is
//! significant: it is the sequence used to align multispectral and
//! panchromatic tile lists and to emit per-band outputs.
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

/// Errors encountered when reading acquisition manifests
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("No tile entries listed in manifest: {0}")]
    NoTiles(PathBuf),
    #[error("No band tags found in manifest: {0}")]
    NoBands(PathBuf),
}

/// Ordered list of physical tile filenames composing the image.
pub fn tile_filenames(path: &Path) -> Result<Vec<String>, ManifestError> {
    if !path.is_file() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }

    let mut reader = Reader::from_file(path)?;
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut in_til = false;
    let mut tiles = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "TIL" {
                    in_til = true;
                }
                curr = tag;
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"TIL" {
                    in_til = false;
                }
                curr.clear();
            }
            Event::Text(e) => {
                if in_til && curr == "FILENAME" {
                    let txt = e.unescape()?;
                    tiles.push(txt.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if tiles.is_empty() {
        return Err(ManifestError::NoTiles(path.to_path_buf()));
    }
    Ok(tiles)
}

/// Ordered band identifiers (`BAND_B`, `BAND_G`, ...) from the manifest's
/// image-metadata section. Position in the returned list is the 1-based
/// band index of the raster.
pub fn band_order(path: &Path) -> Result<Vec<String>, ManifestError> {
    if !path.is_file() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }

    let mut reader = Reader::from_file(path)?;
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut imd_depth: Option<usize> = None;
    let mut bands = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                depth += 1;
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match imd_depth {
                    None if tag == "IMD" => imd_depth = Some(depth),
                    // Only direct children of IMD name bands; nested tags
                    // like BAND_B/ULLON must not be collected.
                    Some(d) if depth == d + 1 && tag.starts_with("BAND_") => {
                        bands.push(tag);
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                if imd_depth == Some(depth) && e.name().as_ref() == b"IMD" {
                    imd_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            // Self-closing band tags carry no children and arrive as Empty.
            Event::Empty(ref e) => {
                if imd_depth == Some(depth) {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if tag.starts_with("BAND_") {
                        bands.push(tag);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if bands.is_empty() {
        return Err(ManifestError::NoBands(path.to_path_buf()));
    }
    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<isd>
  <IMD>
    <NUMROWS>35840</NUMROWS>
    <BAND_B>
      <ULLON>-71.95</ULLON>
    </BAND_B>
    <BAND_G>
      <ULLON>-71.95</ULLON>
    </BAND_G>
    <BAND_R>
      <ULLON>-71.95</ULLON>
    </BAND_R>
    <BAND_N>
      <ULLON>-71.95</ULLON>
    </BAND_N>
  </IMD>
  <TIL>
    <NUMTILES>2</NUMTILES>
    <TILE>
      <FILENAME>TILE-M1.TIF</FILENAME>
    </TILE>
    <TILE>
      <FILENAME>TILE-M2.TIF</FILENAME>
    </TILE>
  </TIL>
</isd>
"#;

    fn write_manifest(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn tile_list_preserves_manifest_order() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "img.xml", SAMPLE);
        let tiles = tile_filenames(&path).unwrap();
        assert_eq!(tiles, vec!["TILE-M1.TIF", "TILE-M2.TIF"]);
    }

    #[test]
    fn band_order_reads_direct_imd_children_only() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "img.xml", SAMPLE);
        let bands = band_order(&path).unwrap();
        assert_eq!(bands, vec!["BAND_B", "BAND_G", "BAND_R", "BAND_N"]);
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.xml");
        assert!(matches!(
            tile_filenames(&path),
            Err(ManifestError::NotFound(_))
        ));
    }

    #[test]
    fn manifest_without_tiles_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "empty.xml", "<isd><TIL></TIL></isd>");
        assert!(matches!(tile_filenames(&path), Err(ManifestError::NoTiles(_))));
    }

    #[test]
    fn manifest_without_bands_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "nobands.xml", "<isd><IMD></IMD></isd>");
        assert!(matches!(band_order(&path), Err(ManifestError::NoBands(_))));
    }
}

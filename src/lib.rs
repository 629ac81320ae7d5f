#![doc = r#"
RASTERPREP — a discovery and preparation pipeline for satellite-image archives.

This crate pairs multispectral and panchromatic acquisitions scattered across
messy vendor directory trees (or locates already-pansharpened rasters and
their sub-tiles), decides which processing each asset still needs, and drives
that processing — pansharpen, rescale to 8 bit, merge tiles, split bands —
to completion through external GDAL/Orfeo tools while tolerating partial
failure. It powers the RASTERPREP CLI and can be embedded in your own Rust
applications.

Stability
---------
The public library API is experimental in initial releases. Breaking changes
can occur.

Requirements
------------
- GDAL development headers and runtime available on your system.
- The GDAL python utilities (`gdal_merge.py`, `gdal_pansharpen.py`) and/or
  the Orfeo Toolbox CLI on PATH for the production processing backend.
- Rust 2024 edition toolchain.

Quick start: discover and process an archive
--------------------------------------------
```rust,no_run
use std::path::PathBuf;
use rasterprep::{GlobParams, PansharpMethod, PatternSet, ProcessParams};

fn main() -> rasterprep::Result<()> {
    let glob = GlobParams {
        base_dir: PathBuf::from("/data/archive"),
        patterns: vec![PatternSet {
            mul_glob: "**/*_MUL/*-M*_P00?".to_string(),
            pan_rel_glob: "../*_PAN".to_string(),
            mul_marker: "-M".to_string(),
            pan_marker: "-P".to_string(),
        }],
        psh_globs: vec!["**/*_PSH/*-PSH-*".to_string()],
        extensions: vec!["tif".to_string(), "ntf".to_string()],
        out_csv: Some(PathBuf::from("/data/archive/manifest.csv")),
    };
    let process = ProcessParams {
        method: PansharpMethod::OtbBayes,
        ..Default::default()
    };

    let report = rasterprep::run_pipeline(Some(&glob), &process, None)?;
    println!(
        "tiles={} images={} errored={}",
        report.tiles, report.images, report.errored_images
    );
    Ok(())
}
```

Audit the work plan before committing to it
-------------------------------------------
```rust,no_run
use std::path::PathBuf;
use rasterprep::{GlobParams, PatternSet, ProcessParams};

fn main() -> rasterprep::Result<()> {
    let glob = GlobParams {
        base_dir: PathBuf::from("/data/archive"),
        patterns: vec![PatternSet {
            mul_glob: "**/*_MUL/*-M*".to_string(),
            pan_rel_glob: "../*_PAN".to_string(),
            mul_marker: "-M".to_string(),
            pan_marker: "-P".to_string(),
        }],
        psh_globs: vec![],
        extensions: vec!["tif".to_string()],
        out_csv: None,
    };

    // Every discovery and planning decision runs; every external call is
    // skipped.
    let process = ProcessParams {
        dry_run: true,
        ..Default::default()
    };
    rasterprep::run_pipeline(Some(&glob), &process, None)?;
    Ok(())
}
```

Restarting from a manifest
--------------------------
A run configured with `out_csv` records every discovered tile. A later run
can skip the (slow) discovery pass:
```rust,no_run
use std::path::Path;
use rasterprep::ProcessParams;

fn main() -> rasterprep::Result<()> {
    let process = ProcessParams::default();
    rasterprep::run_pipeline(None, &process, Some(Path::new("/data/archive/manifest.csv")))?;
    Ok(())
}
```

Error handling
--------------
All public functions return `rasterprep::Result<T>`. Only configuration
errors and environment failures (an uncreatable prep directory) abort a run;
per-asset discovery and processing failures are recorded on the owning work
unit and reported in the aggregate statistics.

Useful modules
--------------
- [`api`] — high-level, ergonomic entry points.
- [`types`] — enums and core types (e.g. `ProcessStep`, `PansharpMethod`).
- [`core`] — discovery engine, work-unit model, pipeline orchestrator.
- [`io`] — manifest reader, raster probe, processing backends, CSV reports.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::model::{Image, ImageKey, NamePattern, Tile, TileState};
pub use crate::core::params::{GlobParams, PatternSet, PipelineConfig, ProcessParams};
pub use crate::core::pipeline::{PipelineOptions, PipelineReport};
pub use crate::error::{Error, Result};
pub use crate::types::{PansharpMethod, ProcessStep, SourceDtype};

// I/O seams
pub use crate::io::backends::{BackendError, GdalToolBackend, ProcessingBackend};
pub use crate::io::manifest::ManifestError;
pub use crate::io::raster::RasterError;

// High-level API re-exports
pub use crate::api::{
    discover, discover_from_manifest, group_processed_tiles, run_pipeline,
    run_pipeline_with_backend,
};

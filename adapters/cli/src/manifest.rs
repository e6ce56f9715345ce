use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use match_atlas_core::{
    CalibrationTable, MapCalibration, MapDefinition, MapId, DEFAULT_PIXEL_SIZE,
};
use serde::Deserialize;
use tracing::{debug, info};

const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Loads the calibration table, falling back to the shipped maps.
///
/// An explicit `path` must exist. Without one, `maps.toml` inside `data_dir`
/// is used when present.
pub(crate) fn load_calibrations(path: Option<&Path>, data_dir: &Path) -> Result<CalibrationTable> {
    let manifest_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = data_dir.join("maps.toml");
            if !candidate.is_file() {
                debug!(path = %candidate.display(), "no map manifest, using built-in calibrations");
                return Ok(CalibrationTable::builtin());
            }
            candidate
        }
    };

    let contents = fs::read_to_string(&manifest_path).with_context(|| {
        format!(
            "failed to read map manifest at {}",
            manifest_path.display()
        )
    })?;
    let base = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let table = parse_manifest(&contents, &base)?;
    info!(path = %manifest_path.display(), maps = table.len(), "loaded map manifest");
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: u32,
    maps: BTreeMap<String, MapEntry>,
}

#[derive(Debug, Deserialize)]
struct MapEntry {
    scale: f64,
    origin_x: f64,
    origin_z: f64,
    #[serde(default = "default_pixel_size")]
    pixel_size: u32,
    image: Option<String>,
}

const fn default_pixel_size() -> u32 {
    DEFAULT_PIXEL_SIZE
}

fn parse_manifest(contents: &str, base_path: &Path) -> Result<CalibrationTable> {
    let manifest: Manifest =
        toml::from_str(contents).context("failed to parse map manifest toml contents")?;
    if manifest.version != SUPPORTED_MANIFEST_VERSION {
        bail!(
            "unsupported map manifest version {}; expected {}",
            manifest.version,
            SUPPORTED_MANIFEST_VERSION
        );
    }
    if manifest.maps.is_empty() {
        bail!("map manifest declares no maps");
    }

    let mut table = CalibrationTable::new();
    for (name, entry) in manifest.maps {
        let calibration =
            MapCalibration::new(entry.scale, entry.origin_x, entry.origin_z, entry.pixel_size)
                .with_context(|| format!("invalid calibration for map `{name}`"))?;
        let image = entry
            .image
            .map(|relative| base_path.join(relative).display().to_string());
        let _ = table.insert(MapId::new(name), MapDefinition { calibration, image });
    }
    Ok(table)
}

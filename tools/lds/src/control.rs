//! Control file: where every input lives, where outputs go, run options.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lds_core::{GridSpec, RunOptions};
use serde::Deserialize;

/// A raster path, optionally with the grid its producer declared and a
/// non-default no-data value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RasterRef {
    Path(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        grid: Option<GridSpec>,
        #[serde(default)]
        nodata: Option<f64>,
    },
}

impl RasterRef {
    pub fn path(&self) -> &Path {
        match self {
            RasterRef::Path(p) | RasterRef::Detailed { path: p, .. } => p,
        }
    }

    pub fn declared_grid(&self) -> Option<&GridSpec> {
        match self {
            RasterRef::Detailed { grid: Some(g), .. } => Some(g),
            _ => None,
        }
    }

    pub fn nodata(&self) -> Option<f64> {
        match self {
            RasterRef::Detailed { nodata, .. } => *nodata,
            RasterRef::Path(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterFiles {
    pub country: RasterRef,
    pub land_unit: RasterRef,
    pub legacy_zone: RasterRef,
    pub land_cover: RasterRef,
    pub protected: RasterRef,
    pub land_area_cover: RasterRef,
    pub land_area_extent: RasterRef,
    pub cropland_cover: RasterRef,
    /// Extent layers; `{year}` is replaced by the land-use reference year.
    pub cropland: RasterRef,
    pub pasture: RasterRef,
    pub urban: RasterRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableFiles {
    /// Countries, regions, crops, uses and land-cover classes in one document.
    pub code_tables: PathBuf,
    pub land_units: PathBuf,
    #[serde(default)]
    pub fao: Option<PathBuf>,
    #[serde(default)]
    pub prices: Option<PathBuf>,
    #[serde(default)]
    pub legacy_rent: Option<PathBuf>,
}

/// Per-crop raster naming; `{crop}` is replaced by the crop name.
#[derive(Debug, Clone, Deserialize)]
pub struct CropFiles {
    pub dir: PathBuf,
    #[serde(default = "default_harvest_pattern")]
    pub harvest_fraction: String,
    #[serde(default = "default_yield_pattern")]
    pub yield_t_ha: String,
}

fn default_harvest_pattern() -> String {
    "{crop}_HarvestedAreaFraction.bil".into()
}

fn default_yield_pattern() -> String {
    "{crop}_YieldPerHectare.bil".into()
}

fn default_grid() -> GridSpec {
    GridSpec::GLOBAL_5MIN
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlFile {
    /// Relative paths below are resolved against this directory.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_grid")]
    pub grid: GridSpec,
    pub rasters: RasterFiles,
    pub tables: TableFiles,
    pub crops: CropFiles,
    #[serde(default)]
    pub options: RunOptions,
}

impl ControlFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read control file {}", path.display()))?;
        let mut control: ControlFile = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse control file {}", path.display()))?;
        if control.input_dir.is_relative() {
            if let Some(parent) = path.parent() {
                control.input_dir = parent.join(&control.input_dir);
            }
        }
        Ok(control)
    }

    /// Resolve `p` against the input directory, substituting `{year}`.
    pub fn input(&self, p: &Path) -> PathBuf {
        let s = p.to_string_lossy().replace("{year}", &self.options.land_use_year.to_string());
        let p = PathBuf::from(s);
        if p.is_absolute() {
            p
        } else {
            self.input_dir.join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lds_core::Calibration;

    const SAMPLE: &str = r#"{
        "input_dir": "data",
        "output_dir": "out",
        "rasters": {
            "country": "fao_ctry.bil",
            "land_unit": {"path": "glu.tif", "nodata": 0},
            "legacy_zone": "aez18.bil",
            "land_cover": "potveg.bil",
            "protected": "protected.bil",
            "land_area_cover": "sage_land.bil",
            "land_area_extent": "hyde_land.bil",
            "cropland_cover": "sage_crop.bil",
            "cropland": "hyde/crop{year}.bil.gz",
            "pasture": "hyde/pasture{year}.bil.gz",
            "urban": "hyde/urban{year}.bil.gz"
        },
        "tables": {"code_tables": "codes.json", "land_units": "glu.json"},
        "crops": {"dir": "crops"},
        "options": {"calibration": {"mode": "yield", "year": 2005}, "land_use_year": 2010}
    }"#;

    #[test]
    fn parses_sample_control() {
        let c: ControlFile = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(c.grid, GridSpec::GLOBAL_5MIN);
        assert_eq!(c.options.calibration, Calibration::Yield { year: 2005 });
        assert_eq!(c.rasters.land_unit.nodata(), Some(0.0));
        assert!(c.rasters.country.declared_grid().is_none());
        assert_eq!(c.crops.harvest_fraction, "{crop}_HarvestedAreaFraction.bil");
        let p = c.input(c.rasters.cropland.path());
        assert_eq!(p, PathBuf::from("data/hyde/crop2010.bil.gz"));
    }
}

//! Readers for the JSON reference tables, the grid rasters and the per-crop
//! rasters.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lds_core::crosswalk::Crop;
use lds_core::{
    AreaInputs, CellKeys, CodeTables, CropLayers, CropSource, Crosswalk, FaoRecord, FaoStats, GridInputs,
    GridSpec, LandUnit, LandUnitTable, Layer, LdsError, LegacyRent, LegacyRentRecord, PriceRecord,
    ProducerPrices, ReferenceData, NODATA_F32,
};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::control::{ControlFile, CropFiles, RasterRef};
use crate::raster::read_layer;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_optional<T: DeserializeOwned>(control: &ControlFile, path: Option<&PathBuf>, what: &str) -> Result<Vec<T>> {
    match path {
        Some(p) => read_json(&control.input(p)),
        None => {
            warn!("no {what} file configured");
            Ok(Vec::new())
        }
    }
}

pub fn load_reference(control: &ControlFile) -> Result<ReferenceData> {
    let t = &control.tables;
    let codes: CodeTables = read_json(&control.input(&t.code_tables))?;
    let crosswalk = Crosswalk::from_tables(codes).context("Invalid code tables")?;
    let units: Vec<LandUnit> = read_json(&control.input(&t.land_units))?;
    let land_units = LandUnitTable::new(units).context("Invalid land unit list")?;

    let fao: Vec<FaoRecord> = read_optional(control, t.fao.as_ref(), "FAO statistics")?;
    let fao = FaoStats::from_records(fao)?;
    let prices: Vec<PriceRecord> = read_optional(control, t.prices.as_ref(), "producer price")?;
    let rent: Vec<LegacyRentRecord> = read_optional(control, t.legacy_rent.as_ref(), "legacy rent")?;
    let legacy_rent = LegacyRent::from_records(rent, &crosswalk).context("Invalid legacy rent")?;

    info!(
        countries = crosswalk.countries().count(),
        crops = crosswalk.crops().len(),
        land_units = land_units.len(),
        "reference tables loaded"
    );
    Ok(ReferenceData {
        crosswalk,
        land_units,
        fao,
        legacy_rent,
        prices: ProducerPrices::from_records(prices),
    })
}

pub fn load_grid(control: &ControlFile) -> Result<GridInputs> {
    let spec = control.grid;
    let r = &control.rasters;
    let path = |rr: &RasterRef| control.input(rr.path());

    let keys = CellKeys {
        country: read_layer(&r.country, &path(&r.country), "country", &spec)?,
        land_unit: read_layer(&r.land_unit, &path(&r.land_unit), "land_unit", &spec)?,
        legacy_zone: read_layer(&r.legacy_zone, &path(&r.legacy_zone), "legacy_zone", &spec)?,
        land_cover: read_layer(&r.land_cover, &path(&r.land_cover), "land_cover", &spec)?,
        protected: read_layer(&r.protected, &path(&r.protected), "protected", &spec)?,
    };
    let areas = AreaInputs {
        land_area_cover: read_layer(&r.land_area_cover, &path(&r.land_area_cover), "land_area_cover", &spec)?,
        land_area_extent: read_layer(&r.land_area_extent, &path(&r.land_area_extent), "land_area_extent", &spec)?,
        cropland_cover: read_layer(&r.cropland_cover, &path(&r.cropland_cover), "cropland_cover", &spec)?,
        cropland: read_layer(&r.cropland, &path(&r.cropland), "cropland", &spec)?,
        pasture: read_layer(&r.pasture, &path(&r.pasture), "pasture", &spec)?,
        urban: read_layer(&r.urban, &path(&r.urban), "urban", &spec)?,
    };
    info!(grid = %spec, "grid rasters loaded");
    Ok(GridInputs { spec, keys, areas })
}

/// Crop rasters read on demand; a crop without files is reported as absent.
pub struct FileCropSource {
    dir: PathBuf,
    files: CropFiles,
    spec: GridSpec,
}

impl FileCropSource {
    pub fn new(control: &ControlFile) -> Self {
        Self {
            dir: control.input(&control.crops.dir),
            files: control.crops.clone(),
            spec: control.grid,
        }
    }

    fn file(&self, pattern: &str, crop: &str) -> PathBuf {
        self.dir.join(pattern.replace("{crop}", crop))
    }
}

impl CropSource for FileCropSource {
    fn load(&mut self, crop: &Crop) -> lds_core::Result<Option<CropLayers>> {
        let harvest = self.file(&self.files.harvest_fraction, &crop.name);
        let yld = self.file(&self.files.yield_t_ha, &crop.name);
        if !harvest.exists() {
            return Ok(None);
        }
        let read = |p: &PathBuf, name: String| {
            read_layer::<f32>(&RasterRef::Path(p.clone()), p, &name, &self.spec).map_err(|e| {
                match e.downcast::<LdsError>() {
                    Ok(lds) => lds,
                    Err(other) => LdsError::InvalidTable {
                        table: "crop raster",
                        reason: format!("{}: {other:#}", p.display()),
                    },
                }
            })
        };
        let harvest_fraction = read(&harvest, format!("{}_harvest_fraction", crop.name))?;
        let yield_t_ha = if yld.exists() {
            read(&yld, format!("{}_yield", crop.name))?
        } else {
            warn!(crop = %crop.name, "yield raster missing; production stays zero");
            Layer::filled(format!("{}_yield", crop.name), self.spec, NODATA_F32, NODATA_F32)?
        };
        Ok(Some(CropLayers { harvest_fraction, yield_t_ha }))
    }
}

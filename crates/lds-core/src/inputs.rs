//! Decoded per-cell inputs handed over by the grid loader.
//!
//! Every layer must live on the same working grid; [`GridInputs::validate`]
//! is the single shape check before any stage runs.

use crate::error::Result;
use crate::grid::{GridSpec, Layer};

/// Identity rasters: which country / land unit / legacy zone / cover class a
/// cell belongs to, and its protection status.
#[derive(Debug, Clone)]
pub struct CellKeys {
    /// FAO country code.
    pub country: Layer<i32>,
    /// Land-unit id from the land-unit table.
    pub land_unit: Layer<i32>,
    /// Legacy 18-zone id, only used to re-key historical land rent.
    pub legacy_zone: Layer<i32>,
    /// Potential-vegetation class.
    pub land_cover: Layer<i32>,
    /// 1 = protected; anything else is unprotected.
    pub protected: Layer<u8>,
}

/// Area rasters, all in km² per cell.
#[derive(Debug, Clone)]
pub struct AreaInputs {
    /// Cover-accounting baseline land area (potential vegetation, carbon,
    /// crop source data).
    pub land_area_cover: Layer<f32>,
    /// Extent-accounting baseline land area (cropland/pasture/urban).
    pub land_area_extent: Layer<f32>,
    /// Cropland area on the cover baseline; the crop fractions were derived
    /// against it.
    pub cropland_cover: Layer<f32>,
    /// Historical extents for the land-use reference year.
    pub cropland: Layer<f32>,
    pub pasture: Layer<f32>,
    pub urban: Layer<f32>,
}

#[derive(Debug, Clone)]
pub struct GridInputs {
    pub spec: GridSpec,
    pub keys: CellKeys,
    pub areas: AreaInputs,
}

impl GridInputs {
    /// Fail on the first layer whose length or declared grid differs from `spec`.
    pub fn validate(&self) -> Result<()> {
        let spec = &self.spec;
        self.keys.country.ensure_on(spec)?;
        self.keys.land_unit.ensure_on(spec)?;
        self.keys.legacy_zone.ensure_on(spec)?;
        self.keys.land_cover.ensure_on(spec)?;
        self.keys.protected.ensure_on(spec)?;
        self.areas.land_area_cover.ensure_on(spec)?;
        self.areas.land_area_extent.ensure_on(spec)?;
        self.areas.cropland_cover.ensure_on(spec)?;
        self.areas.cropland.ensure_on(spec)?;
        self.areas.pasture.ensure_on(spec)?;
        self.areas.urban.ensure_on(spec)?;
        Ok(())
    }
}

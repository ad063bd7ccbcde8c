//! Crop aggregation: per-crop harvested area and production by
//! country × land unit, optionally calibrated to FAO national totals.
//!
//! Per crop:
//!   1. harvested fraction → share of local cover-baseline cropland,
//!   2. reprojected onto extent-baseline cropland,
//!   3. optional per-country scaling to the FAO reference year,
//!   4. accumulation by each cell's land unit (and legacy zone, for rent).

pub mod calibration;
pub mod source;

use indexmap::IndexMap;
use tracing::{debug, info, info_span, warn};

use crate::config::Calibration;
use crate::crosswalk::Crosswalk;
use crate::diagnostics::{CalibrationAnomaly, CropCounts};
use crate::error::Result;
use crate::grid::KM2_TO_HA;
use crate::harmonize::HarmonizedAreas;
use crate::reconcile::{Purpose, Reconciliation};
use crate::table::AggregateTable;

use calibration::{scale_factors, Plan, Target};
pub use calibration::{FaoRecord, FaoStats};
pub use source::{CropLayers, CropSource, InMemoryCrops};

/// Production (t) per (country, legacy zone, land unit), dense over crops.
/// Feeds the production-value weights of the rent stage.
#[derive(Debug, Clone, Default)]
pub struct ZoneProduction {
    width: usize,
    rows: IndexMap<(i32, u32, u32), Vec<f64>>,
}

impl ZoneProduction {
    fn new(width: usize) -> Self {
        Self { width, rows: IndexMap::new() }
    }

    fn add(&mut self, country: i32, zone: u32, unit: u32, crop: usize, amount: f64) {
        let width = self.width;
        let row = self.rows.entry((country, zone, unit)).or_insert_with(|| vec![0.0; width]);
        row[crop] += amount;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, country: i32, zone: u32, unit: u32) -> Option<&[f64]> {
        self.rows.get(&(country, zone, unit)).map(Vec::as_slice)
    }

    /// Every ((country, zone, unit), per-crop production) row.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, u32, u32), &[f64])> {
        self.rows.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

/// Output of the crop stage.
#[derive(Debug, Clone)]
pub struct CropTables {
    /// ha
    pub harvested_area: AggregateTable,
    /// t
    pub production: AggregateTable,
    pub zone_production: ZoneProduction,
    pub counts: CropCounts,
    pub anomalies: Vec<CalibrationAnomaly>,
}

/// Per-cell harvested area (ha) and production (t) before calibration.
struct CellCrop {
    country: i32,
    unit: u32,
    harvested_ha: f64,
    production_t: f64,
    reprojected: bool,
    /// Harvested area was cut back to the cell's land area.
    capped: bool,
    has_yield: bool,
}

fn cell_crop(
    cell: usize,
    recon: &Reconciliation,
    areas: &HarmonizedAreas,
    layers: &CropLayers,
) -> Option<CellCrop> {
    if !recon.flags(cell).valid_for(Purpose::CropArea) {
        return None;
    }
    let (country, unit) = recon.member_key(cell)?;
    let frac = layers.harvest_fraction.amount(cell).min(1.0);
    if frac <= 0.0 {
        return None;
    }

    let cover = areas.cover.amount(cell);
    let crop_a = areas.cropland_cover.amount(cell);
    let crop_b = areas.cropland.amount(cell);
    let extent = areas.extent.amount(cell);
    let land = if extent > 0.0 { extent } else { cover };
    // Never gated on cropland extent: without both croplands the raw
    // fraction of the authoritative land area is used instead.
    let (km2, reprojected) = if crop_a > 0.0 && crop_b > 0.0 {
        (frac * cover / crop_a * crop_b, true)
    } else {
        (frac * land, false)
    };
    // The land area never exceeds the spherical cell area.
    let bound = land.min(areas.cell_area(cell));
    let capped = km2 > bound;
    let harvested_ha = km2.min(bound) * KM2_TO_HA;

    let yield_t_ha = layers.yield_t_ha.value(cell).filter(|y| *y >= 0.0);
    Some(CellCrop {
        country,
        unit,
        harvested_ha,
        production_t: harvested_ha * yield_t_ha.map_or(0.0, f64::from),
        reprojected,
        capped,
        has_yield: yield_t_ha.is_some(),
    })
}

/// Run the crop stage over every crop of the crosswalk, loading one crop at
/// a time from `source`.
pub fn aggregate_crops(
    recon: &Reconciliation,
    areas: &HarmonizedAreas,
    crosswalk: &Crosswalk,
    calibration: Calibration,
    fao: &FaoStats,
    source: &mut dyn CropSource,
) -> Result<CropTables> {
    let plan = Plan::resolve(calibration, fao)?;
    let spec = *recon.spec();
    let width = crosswalk.crops().len();

    let mut harvested_area = AggregateTable::zeros(&recon.country_units, width);
    let mut production = AggregateTable::zeros(&recon.country_units, width);
    let mut zone_production = ZoneProduction::new(width);
    let mut counts = CropCounts::default();
    let mut anomalies = Vec::new();

    for (ci, crop) in crosswalk.crops().iter().enumerate() {
        let _span = info_span!("crop", code = crop.code, name = %crop.name).entered();
        let Some(layers) = source.load(crop)? else {
            warn!(crop = crop.code, "no pixel data for crop; rows stay zero");
            counts.crops_missing += 1;
            continue;
        };
        layers.harvest_fraction.ensure_on(&spec)?;
        layers.yield_t_ha.ensure_on(&spec)?;

        // Pass 1: national pixel totals for the calibration target.
        let scales = match plan {
            Some(plan) => {
                let mut totals: IndexMap<i32, f64> =
                    recon.country_units.owners().map(|c| (c, 0.0)).collect();
                for cell in 0..spec.ncells() {
                    let Some(v) = cell_crop(cell, recon, areas, &layers) else { continue };
                    let amount = match plan.target {
                        Target::HarvestedArea => v.harvested_ha,
                        Target::Production => v.production_t,
                    };
                    *totals.entry(v.country).or_default() += amount;
                }
                let before = anomalies.len();
                let scales = scale_factors(&totals, fao, crop.code, crop.fao_code, plan, &mut anomalies);
                counts.calibrated_pairs += scales.len();
                if anomalies.len() > before {
                    debug!(
                        crop = crop.code,
                        anomalies = anomalies.len() - before,
                        "countries left uncalibrated"
                    );
                }
                Some((plan.target, scales))
            }
            None => None,
        };

        // Pass 2: scale and accumulate.
        for cell in 0..spec.ncells() {
            let Some(v) = cell_crop(cell, recon, areas, &layers) else { continue };
            if !v.reprojected {
                counts.unreprojected_cells += 1;
            }
            if v.capped {
                counts.capped_harvest_cells += 1;
            }
            if !v.has_yield {
                counts.missing_yield_cells += 1;
            }
            let (ha, prod) = match &scales {
                Some((target, scales)) => {
                    let s = scales.get(&v.country).copied().unwrap_or(1.0);
                    match target {
                        Target::HarvestedArea => (v.harvested_ha * s, v.production_t * s),
                        Target::Production => (v.harvested_ha, v.production_t * s),
                    }
                }
                None => (v.harvested_ha, v.production_t),
            };
            harvested_area.add(v.country, v.unit, ci, ha);
            production.add(v.country, v.unit, ci, prod);
            if let Some(zone) = recon.zone_of(cell) {
                zone_production.add(v.country, zone, v.unit, ci, prod);
            }
        }
        counts.crops_processed += 1;
    }

    info!(
        processed = counts.crops_processed,
        missing = counts.crops_missing,
        calibrated = counts.calibrated_pairs,
        anomalies = anomalies.len(),
        "aggregated crops"
    );
    if counts.unreprojected_cells > 0 {
        debug!(cells = counts.unreprojected_cells, "harvested area kept on raw fraction");
    }
    if counts.capped_harvest_cells > 0 {
        warn!(cells = counts.capped_harvest_cells, "harvested area capped at cell land area");
    }

    Ok(CropTables { harvested_area, production, zone_production, counts, anomalies })
}

//! Area harmonization between the two land-area baselines.
//!
//! Baseline A (cover accounting) and baseline B (extent accounting) disagree
//! about which cells are land. The rules here decide one authoritative land
//! area per cell per purpose and bound every land-use layer by it. The two
//! purposes are allowed to diverge: a cell with land only in A is ice for
//! cover purposes and has no extent.

use tracing::{debug, info};

use crate::crosswalk::Crosswalk;
use crate::diagnostics::HarmonizeCounts;
use crate::error::Result;
use crate::grid::{f32_at_most, GridSpec, Layer, NODATA_F32};
use crate::inputs::AreaInputs;

/// Authoritative per-cell areas (km²) after harmonization.
#[derive(Debug, Clone)]
pub struct HarmonizedAreas {
    spec: GridSpec,
    /// Spherical cell area per row, north to south.
    row_areas: Vec<f64>,
    /// Land area for cover purposes (potential vegetation, forest, crop source).
    pub cover: Layer<f32>,
    /// Land area for extent purposes (cropland, pasture, urban).
    pub extent: Layer<f32>,
    /// Cover-baseline cropland, bounded by `cover`.
    pub cropland_cover: Layer<f32>,
    pub cropland: Layer<f32>,
    pub pasture: Layer<f32>,
    pub urban: Layer<f32>,
    /// Forest-class cover land not taken by cropland, pasture or urban.
    pub forest: Layer<f32>,
    /// Cover class after ice reassignment.
    pub cover_class: Layer<i32>,
    pub counts: HarmonizeCounts,
}

impl HarmonizedAreas {
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Spherical area (km²) of `cell`.
    pub fn cell_area(&self, cell: usize) -> f64 {
        self.spec
            .row_col(cell)
            .and_then(|(row, _)| self.row_areas.get(row).copied())
            .unwrap_or(0.0)
    }
}

/// Clamp `layer` to `[0, bound]` cell by cell. No-data becomes zero.
/// Returns the number of cells that exceeded their bound.
fn clip_to(layer: &mut Layer<f32>, bound: &Layer<f32>) -> usize {
    let mut clipped = 0;
    for cell in 0..layer.len() {
        let v = layer.amount(cell);
        let b = bound.amount(cell);
        let out = if v > b {
            clipped += 1;
            b
        } else {
            v
        };
        layer.set(cell, out as f32);
    }
    clipped
}

/// Resolve both baselines into cover and extent areas, bound the land-use
/// layers, and derive forest area. Consumes the raw area layers.
pub fn harmonize(
    spec: &GridSpec,
    land_cover: Layer<i32>,
    areas: AreaInputs,
    crosswalk: &Crosswalk,
) -> Result<HarmonizedAreas> {
    land_cover.ensure_on(spec)?;
    let AreaInputs {
        land_area_cover: raw_a,
        land_area_extent: mut extent,
        mut cropland_cover,
        mut cropland,
        mut pasture,
        mut urban,
    } = areas;
    for layer in [&raw_a, &extent, &cropland_cover, &cropland, &pasture, &urban] {
        layer.ensure_on(spec)?;
    }

    let row_areas = spec.row_areas_km2();
    let mut counts = HarmonizeCounts::default();
    let mut cover = Layer::filled("cover land area", *spec, 0.0f32, NODATA_F32)?;
    let mut cover_class = land_cover;
    let ice = crosswalk.ice_class();

    // Baselines: cover falls back to B, extent never falls back to A.
    for row in 0..spec.nrows {
        let cell_area = row_areas[row];
        for col in 0..spec.ncols {
            let cell = row * spec.ncols + col;
            let a = raw_a.amount(cell);
            let b = extent.amount(cell);

            let mut c = if a > 0.0 {
                a
            } else if b > 0.0 {
                counts.cover_gap_filled += 1;
                b
            } else {
                0.0
            };
            if c > cell_area {
                counts.cover_clipped += 1;
                c = cell_area;
            }
            cover.set(cell, f32_at_most(c));

            let mut e = b;
            if e > cell_area {
                counts.extent_clipped += 1;
                e = cell_area;
            }
            extent.set(cell, f32_at_most(e));

            if a > 0.0 && b <= 0.0 {
                counts.ice_cells += 1;
                if let Some(ice) = ice {
                    cover_class.set(cell, ice);
                }
            }
        }
    }
    drop(raw_a);

    counts.cropland_cover_clipped = clip_to(&mut cropland_cover, &cover);
    counts.cropland_clipped = clip_to(&mut cropland, &extent);
    counts.pasture_clipped = clip_to(&mut pasture, &extent);
    counts.urban_clipped = clip_to(&mut urban, &extent);

    let mut forest = Layer::filled("forest area", *spec, 0.0f32, NODATA_F32)?;
    for cell in 0..spec.ncells() {
        let Some(class) = cover_class.value(cell) else { continue };
        if !crosswalk.is_forest(class) {
            continue;
        }
        let used = cropland.amount(cell) + pasture.amount(cell) + urban.amount(cell);
        let f = (cover.amount(cell) - used).max(0.0);
        if f > 0.0 {
            counts.forest_cells += 1;
        }
        forest.set(cell, f as f32);
    }

    info!(
        ice = counts.ice_cells,
        gap_filled = counts.cover_gap_filled,
        forest_cells = counts.forest_cells,
        "harmonized land-area baselines"
    );
    debug!(
        cover = counts.cover_clipped,
        extent = counts.extent_clipped,
        cropland = counts.cropland_clipped,
        pasture = counts.pasture_clipped,
        urban = counts.urban_clipped,
        cropland_cover = counts.cropland_cover_clipped,
        "clipped cells"
    );

    Ok(HarmonizedAreas {
        spec: *spec,
        row_areas,
        cover,
        extent,
        cropland_cover,
        cropland,
        pasture,
        urban,
        forest,
        cover_class,
        counts,
    })
}

//! Data-quality anomaly counters. None of these abort a run; the caller
//! inspects them after the output tables are emitted.

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileCounts {
    pub cells: usize,
    /// Country or land unit is no-data.
    pub missing_country_or_unit: usize,
    /// Country is present but the land unit is no-data.
    pub country_without_unit: usize,
    pub unknown_country: usize,
    pub unknown_unit: usize,
    pub unknown_legacy_zone: usize,
    /// Land in the cover baseline only.
    pub land_cover_baseline_only: usize,
    /// Land in the extent baseline only.
    pub land_extent_baseline_only: usize,
    /// Land cells without a land-cover class.
    pub land_missing_cover: usize,
    /// Cells counted towards the country × land-unit membership.
    pub membership_cells: usize,
    /// Cells counted towards the country × legacy-zone membership.
    pub legacy_cells: usize,
}

/// Per-country exclusion counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CountryCounts {
    pub valid_cells: usize,
    pub missing_unit_cells: usize,
    pub unknown_unit_cells: usize,
    pub missing_cover_cells: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarmonizeCounts {
    /// Extent baseline reports no land, cover baseline does.
    pub ice_cells: usize,
    /// Cover baseline missing, extent baseline used instead.
    pub cover_gap_filled: usize,
    pub cover_clipped: usize,
    pub extent_clipped: usize,
    /// Cover-baseline cropland above the cover land area.
    pub cropland_cover_clipped: usize,
    pub cropland_clipped: usize,
    pub pasture_clipped: usize,
    pub urban_clipped: usize,
    pub forest_cells: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CropCounts {
    pub crops_processed: usize,
    pub crops_missing: usize,
    /// Cells where a cropland baseline was zero and the raw fraction was used.
    pub unreprojected_cells: usize,
    /// Cells whose reprojected harvest exceeded the cell's land area.
    pub capped_harvest_cells: usize,
    /// Harvested cells without a yield value.
    pub missing_yield_cells: usize,
    /// (country, crop) pairs scaled by calibration.
    pub calibrated_pairs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationIssue {
    /// FAO reports a nonzero national total but no pixel value was found.
    ZeroPixelTotal,
    /// No usable FAO value for the reference year.
    MissingReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationAnomaly {
    pub country: i32,
    pub crop: i32,
    pub issue: CalibrationIssue,
    pub reference: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LandTypeCounts {
    pub missing_cover_cells: usize,
    pub unknown_cover_cells: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnallocatedReason {
    /// Several land units overlap the zone but none carries weight.
    ZeroWeight,
    /// The zone does not overlap any land unit of the region.
    NoOverlap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnallocatedRent {
    pub region: i32,
    pub use_code: i32,
    pub zone: u32,
    /// USD
    pub amount: f64,
    pub reason: UnallocatedReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RentCounts {
    pub identity_allocations: usize,
    pub weighted_allocations: usize,
    /// Rent keyed by a region that has no cells on the grid.
    pub regions_without_cells: usize,
    /// Livestock allocations weighted by pasture for lack of production value.
    pub pasture_fallbacks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub reconcile: ReconcileCounts,
    pub countries: IndexMap<i32, CountryCounts>,
    pub harmonize: HarmonizeCounts,
    pub crop: CropCounts,
    pub calibration: Vec<CalibrationAnomaly>,
    pub land_type: LandTypeCounts,
    pub rent: RentCounts,
    pub rent_unallocated: Vec<UnallocatedRent>,
}

impl Diagnostics {
    /// Total legacy rent (USD) left undistributed.
    pub fn unallocated_rent(&self) -> f64 {
        self.rent_unallocated.iter().map(|u| u.amount).sum()
    }

    pub fn calibration_anomalies(&self, issue: CalibrationIssue) -> usize {
        self.calibration.iter().filter(|a| a.issue == issue).count()
    }
}

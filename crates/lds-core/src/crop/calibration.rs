//! National FAO statistics and the per-country calibration factors derived
//! from them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::Calibration;
use crate::diagnostics::{CalibrationAnomaly, CalibrationIssue};
use crate::error::{LdsError, Result};

/// One national statistic row: FAO country, FAO crop, year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaoRecord {
    pub country: i32,
    pub crop: i32,
    pub year: i32,
    #[serde(default)]
    pub harvested_ha: Option<f64>,
    #[serde(default)]
    pub production_t: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FaoValue {
    harvested_ha: Option<f64>,
    production_t: Option<f64>,
}

/// FAO national harvested area (ha) and production (t) by country, crop and year.
#[derive(Debug, Clone, Default)]
pub struct FaoStats {
    values: IndexMap<(i32, i32), IndexMap<i32, FaoValue>>,
}

impl FaoStats {
    pub fn from_records(records: Vec<FaoRecord>) -> Result<Self> {
        let mut values: IndexMap<(i32, i32), IndexMap<i32, FaoValue>> = IndexMap::new();
        for r in records {
            let years = values.entry((r.country, r.crop)).or_default();
            let value = FaoValue { harvested_ha: r.harvested_ha, production_t: r.production_t };
            if years.insert(r.year, value).is_some() {
                return Err(LdsError::InvalidTable {
                    table: "FAO statistics",
                    reason: format!(
                        "country {} crop {} year {} is listed twice",
                        r.country, r.crop, r.year
                    ),
                });
            }
        }
        Ok(Self { values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if any country/crop has a value for `year`.
    pub fn has_year(&self, year: i32) -> bool {
        self.values.values().any(|years| years.contains_key(&year))
    }

    /// National reference value for the calibration target, if reported.
    pub fn reference(&self, country: i32, fao_crop: i32, year: i32, target: Target) -> Option<f64> {
        let v = self.values.get(&(country, fao_crop))?.get(&year)?;
        match target {
            Target::HarvestedArea => v.harvested_ha,
            Target::Production => v.production_t,
        }
    }
}

/// Which national total pixel values are scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Scales harvested area (and production with it).
    HarvestedArea,
    /// Scales yield, hence production only.
    Production,
}

/// Calibration settings resolved once at the start of the crop stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub year: i32,
    pub target: Target,
}

impl Plan {
    /// `Ok(None)` without calibration. Fails if FAO has nothing for the year.
    pub fn resolve(calibration: Calibration, fao: &FaoStats) -> Result<Option<Plan>> {
        let plan = match calibration {
            Calibration::None => return Ok(None),
            Calibration::HarvestedArea { year } => Plan { year, target: Target::HarvestedArea },
            Calibration::Yield { year } => Plan { year, target: Target::Production },
        };
        if !fao.has_year(plan.year) {
            return Err(LdsError::Config(format!(
                "calibration requested for {} but FAO statistics have no values for that year",
                plan.year
            )));
        }
        Ok(Some(plan))
    }
}

/// Per-country scale factors for one crop. `pixel_totals` holds the
/// uncalibrated national sums (ha or t, matching `plan.target`) over valid
/// cells. Countries that cannot be calibrated keep a factor of 1 and are
/// reported.
pub fn scale_factors(
    pixel_totals: &IndexMap<i32, f64>,
    fao: &FaoStats,
    crop_code: i32,
    fao_crop: i32,
    plan: Plan,
    anomalies: &mut Vec<CalibrationAnomaly>,
) -> IndexMap<i32, f64> {
    let mut scales = IndexMap::with_capacity(pixel_totals.len());
    for (&country, &pixel) in pixel_totals {
        let reference = fao.reference(country, fao_crop, plan.year, plan.target);
        match reference {
            Some(r) if r > 0.0 && pixel > 0.0 => {
                scales.insert(country, r / pixel);
            }
            Some(r) if r > 0.0 => anomalies.push(CalibrationAnomaly {
                country,
                crop: crop_code,
                issue: CalibrationIssue::ZeroPixelTotal,
                reference: Some(r),
            }),
            _ if pixel > 0.0 => anomalies.push(CalibrationAnomaly {
                country,
                crop: crop_code,
                issue: CalibrationIssue::MissingReference,
                reference,
            }),
            _ => {}
        }
    }
    scales
}

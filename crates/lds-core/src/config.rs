//! Run-scoped options, consumed once at the start of the stages that need them.

use serde::{Deserialize, Serialize};

use crate::error::{LdsError, Result};

/// National calibration target for the crop aggregation. The two targets are
/// mutually exclusive within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Calibration {
    #[default]
    None,
    /// Scale harvested area to FAO national harvested area for `year`.
    HarvestedArea { year: i32 },
    /// Scale yield to FAO national production for `year`.
    Yield { year: i32 },
}

impl Calibration {
    pub fn year(&self) -> Option<i32> {
        match self {
            Calibration::None => None,
            Calibration::HarvestedArea { year } | Calibration::Yield { year } => Some(*year),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub calibration: Calibration,
    /// Year of the historical cropland/pasture/urban extent layers.
    pub land_use_year: i32,
    /// Also emit the country-keyed tables summed to model regions.
    pub aggregate_model_regions: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            calibration: Calibration::None,
            land_use_year: 2000,
            aggregate_model_regions: true,
        }
    }
}

impl RunOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        let opts: RunOptions =
            serde_json::from_str(text).map_err(|e| LdsError::Config(e.to_string()))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(year) = self.calibration.year() {
            if !(1900..=2100).contains(&year) {
                return Err(LdsError::Config(format!("calibration year {year} is out of range")));
            }
        }
        Ok(())
    }
}

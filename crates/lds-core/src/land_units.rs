//! The externally supplied list of land units (GLUs).
//!
//! Land units can be any partition of the globe (water basins, agro-ecological
//! zones, ...). Their count is a run-time input; nothing in the crate assumes
//! a specific number.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LdsError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandUnit {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LandUnitTable {
    units: IndexMap<u32, String>,
}

impl LandUnitTable {
    /// Ids must be unique and positive; raster cells carry them as 1..=N.
    pub fn new(units: Vec<LandUnit>) -> Result<Self> {
        if units.is_empty() {
            return Err(LdsError::InvalidTable {
                table: "land unit",
                reason: "no land units listed".into(),
            });
        }
        let mut map = IndexMap::with_capacity(units.len());
        for unit in units {
            if unit.id == 0 {
                return Err(LdsError::InvalidTable {
                    table: "land unit",
                    reason: format!("land unit `{}` has id 0", unit.name),
                });
            }
            if map.insert(unit.id, unit.name).is_some() {
                return Err(LdsError::DuplicateCode { taxonomy: "land unit", code: unit.id.into() });
            }
        }
        Ok(Self { units: map })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Resolve a raw raster value to a listed land unit id.
    #[inline]
    pub fn resolve(&self, raw: i32) -> Option<u32> {
        let id = u32::try_from(raw).ok()?;
        self.units.contains_key(&id).then_some(id)
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.units.get(&id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.units.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

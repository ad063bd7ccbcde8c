//! Working grid geometry and bounds-checked, no-data aware cell layers.
//! Coordinate math uses f64; cell values keep their raster precision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LdsError, Result};

/// No-data sentinel shared by every integer raster.
pub const NODATA: i32 = -9999;
/// No-data sentinel shared by every float raster. NaN is also treated as no-data.
pub const NODATA_F32: f32 = -9999.0;

/// Authalic earth radius (km) used for spherical cell areas.
pub const EARTH_RADIUS_KM: f64 = 6371.0072;
/// 1 km² = 100 ha.
pub const KM2_TO_HA: f64 = 100.0;

/// A point in geographic coordinates (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Geometry of a regular lat/lon grid. Row 0 is the northern edge, matching
/// raster storage order; cells are addressed row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub nrows: usize,
    pub ncols: usize,
    /// Western edge, degrees.
    pub xmin: f64,
    /// Northern edge, degrees.
    pub ymax: f64,
    /// Cell size, degrees (square cells).
    pub res_deg: f64,
}

impl GridSpec {
    /// The fixed 5 arc-minute global working grid (2160 × 4320 = 9,331,200 cells).
    pub const GLOBAL_5MIN: GridSpec = GridSpec {
        nrows: 2160,
        ncols: 4320,
        xmin: -180.0,
        ymax: 90.0,
        res_deg: 5.0 / 60.0,
    };

    pub fn new(nrows: usize, ncols: usize, xmin: f64, ymax: f64, res_deg: f64) -> Self {
        Self { nrows, ncols, xmin, ymax, res_deg }
    }

    #[inline]
    pub fn ncells(&self) -> usize {
        self.nrows * self.ncols
    }

    pub fn xmax(&self) -> f64 {
        self.xmin + self.ncols as f64 * self.res_deg
    }

    pub fn ymin(&self) -> f64 {
        self.ymax - self.nrows as f64 * self.res_deg
    }

    /// Linear cell id for (row, col), or `None` outside the grid.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.nrows && col < self.ncols).then(|| row * self.ncols + col)
    }

    #[inline]
    pub fn row_col(&self, cell: usize) -> Option<(usize, usize)> {
        (cell < self.ncells()).then(|| (cell / self.ncols, cell % self.ncols))
    }

    pub fn cell_center(&self, cell: usize) -> Option<LatLon> {
        let (row, col) = self.row_col(cell)?;
        let lat = self.ymax - (row as f64 + 0.5) * self.res_deg;
        let lon = self.xmin + (col as f64 + 0.5) * self.res_deg;
        Some(LatLon::new(lat, lon))
    }

    /// Spherical-earth area (km²) of any cell in `row`.
    ///
    ///   A = R² · Δλ · (sin φ_top − sin φ_bottom)
    pub fn row_area_km2(&self, row: usize) -> f64 {
        let top = (self.ymax - row as f64 * self.res_deg).clamp(-90.0, 90.0);
        let bottom = (top - self.res_deg).clamp(-90.0, 90.0);
        let dlon = self.res_deg.to_radians();
        EARTH_RADIUS_KM * EARTH_RADIUS_KM * dlon * (top.to_radians().sin() - bottom.to_radians().sin())
    }

    /// Cell area for every row, north to south.
    #[cfg(not(feature = "threading"))]
    pub fn row_areas_km2(&self) -> Vec<f64> {
        (0..self.nrows).map(|r| self.row_area_km2(r)).collect()
    }

    /// Cell area for every row, north to south.
    #[cfg(feature = "threading")]
    pub fn row_areas_km2(&self) -> Vec<f64> {
        use rayon::prelude::*;
        (0..self.nrows).into_par_iter().map(|r| self.row_area_km2(r)).collect()
    }

    /// Fail with `GridMismatch` unless `declared` describes this grid.
    pub fn ensure_same(&self, layer: &str, declared: &GridSpec) -> Result<()> {
        const TOL: f64 = 1e-9;
        let same = self.nrows == declared.nrows
            && self.ncols == declared.ncols
            && (self.xmin - declared.xmin).abs() < TOL
            && (self.ymax - declared.ymax).abs() < TOL
            && (self.res_deg - declared.res_deg).abs() < TOL;
        if same {
            Ok(())
        } else {
            Err(LdsError::GridMismatch {
                layer: layer.to_string(),
                expected: self.to_string(),
                found: declared.to_string(),
            })
        }
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} cells of {:.6}° from ({}, {})",
            self.nrows, self.ncols, self.res_deg, self.xmin, self.ymax
        )
    }
}

/// Allocate a working array without aborting the process on failure.
pub(crate) fn alloc_cells<T: Clone>(what: &str, n: usize, fill: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| LdsError::Allocation {
        what: what.to_string(),
        cells: n,
    })?;
    v.resize(n, fill);
    Ok(v)
}

/// Largest `f32` not above `v`, for storing an f64 area under its bound.
pub(crate) fn f32_at_most(v: f64) -> f32 {
    let x = v as f32;
    if f64::from(x) <= v || !x.is_finite() {
        return x;
    }
    // Round-to-nearest went up: step one ulp towards -inf.
    if x > 0.0 {
        f32::from_bits(x.to_bits() - 1)
    } else if x == 0.0 {
        -f32::from_bits(1)
    } else {
        f32::from_bits(x.to_bits() + 1)
    }
}

/// Raster value types with a no-data sentinel.
pub trait NoData: Copy + PartialEq {
    fn is_nodata(self, sentinel: Self) -> bool {
        self == sentinel
    }
}

impl NoData for i32 {}
impl NoData for i16 {}
impl NoData for u8 {}

impl NoData for f32 {
    fn is_nodata(self, sentinel: Self) -> bool {
        self.is_nan() || self == sentinel
    }
}

/// One attribute for every cell of the working grid.
#[derive(Debug, Clone)]
pub struct Layer<T> {
    name: String,
    spec: GridSpec,
    nodata: T,
    data: Vec<T>,
}

impl<T: NoData> Layer<T> {
    /// Wrap decoded cell values. The length must equal the grid cell count.
    pub fn from_vec(name: impl Into<String>, spec: GridSpec, data: Vec<T>, nodata: T) -> Result<Self> {
        let name = name.into();
        if data.len() != spec.ncells() {
            return Err(LdsError::ShapeMismatch {
                layer: name,
                expected: spec.ncells(),
                found: data.len(),
            });
        }
        Ok(Self { name, spec, nodata, data })
    }

    /// A layer with every cell set to `fill`.
    pub fn filled(name: impl Into<String>, spec: GridSpec, fill: T, nodata: T) -> Result<Self> {
        let name = name.into();
        let data = alloc_cells(&name, spec.ncells(), fill)?;
        Ok(Self { name, spec, nodata, data })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn nodata(&self) -> T {
        self.nodata
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cell value, or `None` for no-data and out-of-range ids.
    #[inline]
    pub fn value(&self, cell: usize) -> Option<T> {
        let v = *self.data.get(cell)?;
        (!v.is_nodata(self.nodata)).then_some(v)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.value(self.spec.index(row, col)?)
    }

    /// Overwrite one cell. Returns false for out-of-range ids.
    #[inline]
    pub fn set(&mut self, cell: usize, value: T) -> bool {
        match self.data.get_mut(cell) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nodata(self.nodata)).count()
    }

    /// Fail with `ShapeMismatch` unless this layer lives on `spec`.
    pub fn ensure_on(&self, spec: &GridSpec) -> Result<()> {
        if self.data.len() != spec.ncells() {
            return Err(LdsError::ShapeMismatch {
                layer: self.name.clone(),
                expected: spec.ncells(),
                found: self.data.len(),
            });
        }
        spec.ensure_same(&self.name, &self.spec)
    }
}

impl Layer<f32> {
    /// Area-like value with no-data and negatives read as zero.
    #[inline]
    pub fn amount(&self, cell: usize) -> f64 {
        match self.value(cell) {
            Some(v) if v > 0.0 => f64::from(v),
            _ => 0.0,
        }
    }
}

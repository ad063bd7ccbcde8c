//! Raster readers: raw little-endian BIL (optionally gzipped) and GeoTIFF.
//!
//! Storage order is row 0 = north, matching the working grid. Only the
//! grid shape is checked here; cell values are handed over as decoded.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::GzDecoder;
use lds_core::grid::NoData;
use lds_core::{GridSpec, Layer, LdsError};
use tiff::decoder::{Decoder, DecodingResult};

use crate::control::RasterRef;

// ── Cell value types ────────────────────────────────────────────────────────

pub trait RasterValue: NoData + Default {
    const BYTES: usize;
    const NODATA: Self;
    fn read_le(src: &[u8], dst: &mut [Self]);
    fn from_tiff(img: DecodingResult) -> Option<Vec<Self>>;
    fn from_f64(v: f64) -> Self;
}

impl RasterValue for i32 {
    const BYTES: usize = 4;
    const NODATA: Self = lds_core::NODATA;

    fn read_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_i32_into(src, dst);
    }

    fn from_tiff(img: DecodingResult) -> Option<Vec<Self>> {
        match img {
            DecodingResult::I32(v) => Some(v),
            DecodingResult::I16(v) => Some(v.into_iter().map(i32::from).collect()),
            DecodingResult::U16(v) => Some(v.into_iter().map(i32::from).collect()),
            DecodingResult::U8(v) => Some(v.into_iter().map(i32::from).collect()),
            _ => None,
        }
    }

    fn from_f64(v: f64) -> Self {
        v as i32
    }
}

impl RasterValue for f32 {
    const BYTES: usize = 4;
    const NODATA: Self = lds_core::NODATA_F32;

    fn read_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_f32_into(src, dst);
    }

    fn from_tiff(img: DecodingResult) -> Option<Vec<Self>> {
        match img {
            DecodingResult::F32(v) => Some(v),
            DecodingResult::F64(v) => Some(v.into_iter().map(|x| x as f32).collect()),
            _ => None,
        }
    }

    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl RasterValue for u8 {
    const BYTES: usize = 1;
    const NODATA: Self = 255;

    fn read_le(src: &[u8], dst: &mut [Self]) {
        dst.copy_from_slice(src);
    }

    fn from_tiff(img: DecodingResult) -> Option<Vec<Self>> {
        match img {
            DecodingResult::U8(v) => Some(v),
            _ => None,
        }
    }

    fn from_f64(v: f64) -> Self {
        v as u8
    }
}

// ── Decoding ────────────────────────────────────────────────────────────────

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let file = fs::File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut buf = Vec::new();
    if has_ext(path, "gz") {
        GzDecoder::new(file)
            .read_to_end(&mut buf)
            .with_context(|| format!("Gzip decode failed: {}", path.display()))?;
    } else {
        let mut file = file;
        file.read_to_end(&mut buf)
            .with_context(|| format!("Read failed: {}", path.display()))?;
    }
    Ok(buf)
}

fn decode_raw<T: RasterValue>(bytes: &[u8], name: &str, spec: &GridSpec) -> Result<Vec<T>> {
    if bytes.len() % T::BYTES != 0 {
        bail!("{name}: {} bytes is not a whole number of {}-byte cells", bytes.len(), T::BYTES);
    }
    let n = bytes.len() / T::BYTES;
    if n != spec.ncells() {
        return Err(LdsError::ShapeMismatch { layer: name.to_string(), expected: spec.ncells(), found: n }.into());
    }
    let mut out = vec![T::default(); n];
    T::read_le(bytes, &mut out);
    Ok(out)
}

fn decode_tiff<T: RasterValue>(bytes: Vec<u8>, name: &str, spec: &GridSpec) -> Result<Vec<T>> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).with_context(|| format!("{name}: not a valid TIFF"))?;
    let (width, height) = decoder.dimensions().with_context(|| format!("{name}: dimensions error"))?;
    let (w, h) = (width as usize, height as usize);
    if w != spec.ncols || h != spec.nrows {
        let declared = GridSpec::new(h, w, spec.xmin, spec.ymax, (spec.xmax() - spec.xmin) / w.max(1) as f64);
        spec.ensure_same(name, &declared)?;
    }
    let img = decoder.read_image().with_context(|| format!("{name}: read_image error"))?;
    match T::from_tiff(img) {
        Some(v) => Ok(v),
        None => bail!("{name}: unexpected pixel type"),
    }
}

/// Read one raster onto `spec`. `.tif`/`.tiff` go through the TIFF decoder,
/// anything else is raw little-endian cells (gzipped if it ends in `.gz`).
pub fn read_layer<T: RasterValue>(r: &RasterRef, path: &Path, name: &str, spec: &GridSpec) -> Result<Layer<T>> {
    if let Some(declared) = r.declared_grid() {
        spec.ensure_same(name, declared)?;
    }
    let bytes = read_bytes(path)?;
    let data = if has_ext(path, "tif") || has_ext(path, "tiff") {
        decode_tiff::<T>(bytes, name, spec)?
    } else {
        decode_raw::<T>(&bytes, name, spec)?
    };
    let nodata = r.nodata().map_or(T::NODATA, T::from_f64);
    let layer = Layer::from_vec(name, *spec, data, nodata)?;
    tracing::debug!(layer = name, path = %path.display(), valid = layer.count_valid(), "read raster");
    Ok(layer)
}

//! Raster decoding: multi-band TIFF via `tiff`, color imagery via `image`.
//!
//! Two band layouts are understood. Uploaded files follow the usual
//! sensor orders (Sentinel-2 for 8+ bands, Landsat for 4+, plain RGB for
//! 3). Tiles returned by the Sentinel Hub evalscript carry B02, B03, B04,
//! B08 in that order.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::analysis::{AnalysisError, BandSet, ImageInput, RgbImage};

/// Color images are resampled to this square before pixel analysis.
pub const PIXEL_SAMPLE_SIZE: u32 = 224;

/// Band-separated contents of a TIFF, each band rows x cols.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Array2<f64>>,
}

impl DecodedRaster {
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band by 1-based index, matching sensor band numbering.
    fn band(&self, number: usize) -> Array2<f64> {
        self.bands[number - 1].clone()
    }
}

fn decode_error(context: &str, e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::InvalidInput(format!("{}: {}", context, e))
}

/// Decode an in-memory TIFF into separate bands.
///
/// Samples are read chunky (pixel interleaved); the band count is whatever
/// divides the sample buffer evenly by the pixel count.
pub fn decode_tiff(data: &[u8]) -> Result<DecodedRaster, AnalysisError> {
    let mut decoder = Decoder::new(Cursor::new(data)).map_err(|e| decode_error("TIFF decode error", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| decode_error("cannot read dimensions", e))?;
    let (cols, rows) = (width as usize, height as usize);

    let result = decoder
        .read_image()
        .map_err(|e| decode_error("cannot read image data", e))?;

    let samples: Vec<f64> = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(AnalysisError::InvalidInput(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    let pixels = rows * cols;
    if pixels == 0 {
        return Err(AnalysisError::EmptyImage);
    }
    if samples.is_empty() || samples.len() % pixels != 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "{} samples do not fit a {}x{} raster",
            samples.len(),
            cols,
            rows
        )));
    }

    let band_count = samples.len() / pixels;
    let bands = (0..band_count)
        .map(|b| Array2::from_shape_fn((rows, cols), |(r, c)| samples[(r * cols + c) * band_count + b]))
        .collect();

    debug!(width = cols, height = rows, band_count, "TIFF decoded");
    Ok(DecodedRaster {
        width: cols,
        height: rows,
        bands,
    })
}

/// Map an uploaded raster onto blue/green/red/nir by band count.
pub fn upload_bands(raster: &DecodedRaster) -> Result<BandSet, AnalysisError> {
    let n = raster.band_count();
    let (blue, green, red, nir) = if n >= 8 {
        // Sentinel-2: B2 blue, B3 green, B4 red, B8 nir
        (raster.band(2), raster.band(3), raster.band(4), raster.band(8))
    } else if n >= 4 {
        // Landsat: B1 blue, B2 green, B3 red, B4 nir
        (raster.band(1), raster.band(2), raster.band(3), raster.band(4))
    } else if n == 3 {
        // RGB, green stands in for nir
        (raster.band(3), raster.band(2), raster.band(1), raster.band(2))
    } else {
        return Err(AnalysisError::InvalidInput(format!(
            "need at least 3 bands, file has {}",
            n
        )));
    };
    BandSet::new(blue, green, red, nir, n)
}

/// Map a Sentinel Hub evalscript tile (B02, B03, B04, B08) onto bands.
/// A two-band tile is read as red + nir with red standing in for the rest.
pub fn tile_bands(raster: &DecodedRaster) -> Result<BandSet, AnalysisError> {
    let n = raster.band_count();
    if n >= 4 {
        BandSet::new(raster.band(1), raster.band(2), raster.band(3), raster.band(4), n)
    } else if n >= 2 {
        let red = raster.band(1);
        BandSet::new(red.clone(), red.clone(), red, raster.band(2), n)
    } else {
        Err(AnalysisError::InvalidInput(format!(
            "tile has {} band(s), indices need at least 2",
            n
        )))
    }
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

/// Decode an image held in memory. TIFFs go to the band path, everything
/// else through the `image` crate to the RGB pixel path, resampled
/// (bicubic) to `PIXEL_SAMPLE_SIZE` square.
pub fn decode_image(data: &[u8], tiff_hint: bool) -> Result<ImageInput, AnalysisError> {
    if tiff_hint {
        let raster = decode_tiff(data)?;
        return upload_bands(&raster).map(ImageInput::Spectral);
    }

    let rgb = image::load_from_memory(data)
        .map_err(|e| decode_error("cannot decode image", e))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let sample = image::imageops::resize(&rgb, PIXEL_SAMPLE_SIZE, PIXEL_SAMPLE_SIZE, FilterType::CatmullRom);
    RgbImage::from_rgb8(PIXEL_SAMPLE_SIZE, PIXEL_SAMPLE_SIZE, sample.as_raw())
        .map(|img| ImageInput::Rgb(img.with_source_dimensions(width as usize, height as usize)))
}

/// Read and decode an image file, returning it with its size in bytes.
pub async fn load_image(path: &Path) -> anyhow::Result<(ImageInput, u64)> {
    use anyhow::Context;

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    let size = data.len() as u64;
    let tiff_hint = is_tiff(path);

    let input = tokio::task::spawn_blocking(move || decode_image(&data, tiff_hint))
        .await
        .context("image decode task failed")?
        .with_context(|| format!("failed to decode image: {}", path.display()))?;

    Ok((input, size))
}

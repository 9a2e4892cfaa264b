//! Image analysis -- spectral indices, land-cover classification, and risk.
//!
//! Everything under this module is pure: a single image goes in, a report
//! comes out, and no shared state is touched. The orchestrator in
//! [`pipeline`] ties the pieces together for one input.

pub mod deep;
pub mod indices;
pub mod landcover;
pub mod pipeline;
pub mod risk;
pub mod thermal;

use ndarray::{Array2, Array3, ArrayView2, Axis};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("band shape mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("image contains no pixels")]
    EmptyImage,
    #[error("invalid image data: {0}")]
    InvalidInput(String),
}

/// Round to a fixed number of decimal places.
///
/// Applied when a value becomes part of a result record, never to
/// per-pixel arrays.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Calibrated spectral bands for one scene. All bands share one shape.
#[derive(Debug, Clone)]
pub struct BandSet {
    pub blue: Array2<f64>,
    pub green: Array2<f64>,
    pub red: Array2<f64>,
    pub nir: Array2<f64>,
    /// Number of bands in the source file (4 for Landsat, 13 for Sentinel-2, ...).
    pub band_count: usize,
}

impl BandSet {
    pub fn new(
        blue: Array2<f64>,
        green: Array2<f64>,
        red: Array2<f64>,
        nir: Array2<f64>,
        band_count: usize,
    ) -> Result<Self, AnalysisError> {
        let expected = red.dim();
        for band in [&blue, &green, &nir] {
            if band.dim() != expected {
                return Err(AnalysisError::DimensionMismatch {
                    expected,
                    actual: band.dim(),
                });
            }
        }
        if red.is_empty() {
            return Err(AnalysisError::EmptyImage);
        }
        Ok(Self {
            blue,
            green,
            red,
            nir,
            band_count,
        })
    }

    /// (width, height) in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        let (rows, cols) = self.red.dim();
        (cols, rows)
    }
}

/// Ordinary color imagery, stored as rows x cols x 3 (R, G, B) intensities.
///
/// The pixels may be a resampled copy of a larger file; `dimensions`
/// reports the file's size, `sample_dimensions` the analyzed grid.
#[derive(Debug, Clone)]
pub struct RgbImage {
    pixels: Array3<f64>,
    source: (usize, usize),
}

impl RgbImage {
    pub fn new(pixels: Array3<f64>) -> Result<Self, AnalysisError> {
        let (rows, cols, channels) = pixels.dim();
        if channels != 3 {
            return Err(AnalysisError::InvalidInput(format!(
                "expected 3 color channels, got {}",
                channels
            )));
        }
        if rows == 0 || cols == 0 {
            return Err(AnalysisError::EmptyImage);
        }
        Ok(Self {
            pixels,
            source: (cols, rows),
        })
    }

    /// Record the (width, height) of the file these pixels were sampled from.
    pub fn with_source_dimensions(mut self, width: usize, height: usize) -> Self {
        self.source = (width, height);
        self
    }

    /// Build from interleaved 8-bit RGB bytes, as produced by most decoders.
    pub fn from_rgb8(width: u32, height: u32, data: &[u8]) -> Result<Self, AnalysisError> {
        let (rows, cols) = (height as usize, width as usize);
        if data.len() != rows * cols * 3 {
            return Err(AnalysisError::InvalidInput(format!(
                "buffer length {} does not match {}x{} RGB",
                data.len(),
                width,
                height
            )));
        }
        let values: Vec<f64> = data.iter().map(|&v| f64::from(v)).collect();
        let pixels = Array3::from_shape_vec((rows, cols, 3), values)
            .map_err(|e| AnalysisError::InvalidInput(e.to_string()))?;
        Self::new(pixels)
    }

    pub fn red(&self) -> ArrayView2<'_, f64> {
        self.pixels.index_axis(Axis(2), 0)
    }

    pub fn green(&self) -> ArrayView2<'_, f64> {
        self.pixels.index_axis(Axis(2), 1)
    }

    pub fn blue(&self) -> ArrayView2<'_, f64> {
        self.pixels.index_axis(Axis(2), 2)
    }

    pub fn pixels(&self) -> &Array3<f64> {
        &self.pixels
    }

    /// (width, height) of the source image.
    pub fn dimensions(&self) -> (usize, usize) {
        self.source
    }

    /// (width, height) of the pixel grid actually analyzed.
    pub fn sample_dimensions(&self) -> (usize, usize) {
        let (rows, cols, _) = self.pixels.dim();
        (cols, rows)
    }
}

/// One image handed to the orchestrator. The variant decides which
/// classification path runs.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Spectral(BandSet),
    Rgb(RgbImage),
}

impl ImageInput {
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            ImageInput::Spectral(bands) => bands.dimensions(),
            ImageInput::Rgb(image) => image.dimensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-0.98765, 2), -0.99);
        assert_eq!(round_to(33.349, 1), 33.3);
    }

    #[test]
    fn test_band_set_rejects_mismatched_shapes() {
        let ok = Array2::<f64>::zeros((4, 4));
        let bad = Array2::<f64>::zeros((4, 5));
        let err = BandSet::new(ok.clone(), ok.clone(), ok.clone(), bad, 4).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DimensionMismatch { expected: (4, 4), actual: (4, 5) }
        ));
    }

    #[test]
    fn test_rgb_from_bytes() {
        let data = vec![10u8, 20, 30, 40, 50, 60];
        let img = RgbImage::from_rgb8(2, 1, &data).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.green()[[0, 1]], 50.0);
        assert_eq!(img.blue()[[0, 0]], 30.0);

        assert!(RgbImage::from_rgb8(3, 1, &data).is_err());
        assert!(matches!(
            RgbImage::from_rgb8(0, 0, &[]),
            Err(AnalysisError::EmptyImage)
        ));
    }
}

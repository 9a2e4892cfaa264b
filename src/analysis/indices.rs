//! Spectral vegetation and water indices.
//!
//! NDVI = (NIR - Red) / (NIR + Red)
//! NDWI = (Green - NIR) / (Green + NIR)
//!
//! The `*_rgb` variants approximate both indices from ordinary color
//! imagery (green stands in for NIR, blue for NIR in the water index).

use ndarray::{Array2, ArrayView2, Zip};
use serde::Serialize;

use super::AnalysisError;

/// Additive guard for the calibrated-band formulas.
pub const EPSILON: f64 = 1e-10;

fn check_shapes(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> Result<(), AnalysisError> {
    if a.dim() != b.dim() {
        return Err(AnalysisError::DimensionMismatch {
            expected: a.dim(),
            actual: b.dim(),
        });
    }
    Ok(())
}

/// `(a - b) / (a + b + EPSILON)` per pixel.
fn normalized_difference(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
) -> Result<Array2<f64>, AnalysisError> {
    check_shapes(&a, &b)?;
    Ok(Zip::from(&a)
        .and(&b)
        .map_collect(|&a, &b| (a - b) / (a + b + EPSILON)))
}

/// `(a - b) / (a + b)` per pixel, 0.0 where the denominator is exactly zero.
fn guarded_difference(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
) -> Result<Array2<f64>, AnalysisError> {
    check_shapes(&a, &b)?;
    Ok(Zip::from(&a).and(&b).map_collect(|&a, &b| {
        let denominator = a + b;
        if denominator == 0.0 {
            0.0
        } else {
            (a - b) / denominator
        }
    }))
}

/// Per-pixel NDVI from calibrated NIR and Red bands.
pub fn ndvi(nir: ArrayView2<f64>, red: ArrayView2<f64>) -> Result<Array2<f64>, AnalysisError> {
    normalized_difference(nir, red)
}

/// NDVI proxy from RGB imagery, using green in place of NIR.
pub fn ndvi_rgb(green: ArrayView2<f64>, red: ArrayView2<f64>) -> Result<Array2<f64>, AnalysisError> {
    guarded_difference(green, red)
}

/// Per-pixel NDWI (McFeeters) from calibrated Green and NIR bands.
pub fn ndwi(green: ArrayView2<f64>, nir: ArrayView2<f64>) -> Result<Array2<f64>, AnalysisError> {
    normalized_difference(green, nir)
}

/// NDWI proxy from RGB imagery, using blue in place of NIR.
pub fn ndwi_rgb(green: ArrayView2<f64>, blue: ArrayView2<f64>) -> Result<Array2<f64>, AnalysisError> {
    guarded_difference(green, blue)
}

/// Summary statistics over the finite values of an array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    /// Number of finite values that contributed.
    pub count: usize,
}

/// Mean, min, max and population standard deviation, skipping NaN and
/// infinities. An array with no finite values yields all-zero stats.
pub fn stats(values: ArrayView2<f64>) -> Stats {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for &v in values.iter().filter(|v| v.is_finite()) {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if count == 0 {
        return Stats::default();
    }

    let mean = sum / count as f64;
    let variance = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| (v - mean).powi(2))
        .sum::<f64>()
        / count as f64;

    Stats {
        mean,
        min,
        max,
        std: variance.sqrt(),
        count,
    }
}

//! Land surface temperature proxy and heat risk.
//!
//! Sentinel-2 carries no thermal band, so temperature is approximated from
//! red/NIR reflectance and vegetation fraction. Treat the output as a
//! relative signal, not a calibrated LST.

use ndarray::{ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use super::indices;
use super::{round_to, AnalysisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatRisk {
    None,
    Low,
    Moderate,
    High,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalReport {
    pub temperature_avg: f64,
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub emissivity_avg: f64,
    pub heat_risk: HeatRisk,
    pub description: String,
    pub is_urban_heat_island: bool,
}

/// Estimate surface temperature from red, NIR (raw digital numbers) and the
/// per-pixel NDVI, then classify heat risk.
pub fn analyze(
    red: ArrayView2<f64>,
    nir: ArrayView2<f64>,
    ndvi: ArrayView2<f64>,
    ndvi_mean: f64,
) -> Result<ThermalReport, AnalysisError> {
    if red.dim() != nir.dim() || red.dim() != ndvi.dim() {
        return Err(AnalysisError::DimensionMismatch {
            expected: red.dim(),
            actual: if red.dim() != nir.dim() { nir.dim() } else { ndvi.dim() },
        });
    }

    let spread = indices::stats(ndvi);
    let range = if spread.max > spread.min {
        spread.max - spread.min
    } else {
        1.0
    };

    let vegetation_fraction = ndvi.mapv(|v| ((v - spread.min) / range).powi(2));
    let emissivity = vegetation_fraction.mapv(|pv| 0.004 * pv + 0.986);
    let lst = Zip::from(&red)
        .and(&nir)
        .and(&vegetation_fraction)
        .map_collect(|&r, &n, &pv| {
            let brightness = (r * 0.3 + n * 0.7) / 10000.0;
            20.0 + brightness * 40.0 - pv * 15.0
        });

    let lst_stats = indices::stats(lst.view());
    let emissivity_stats = indices::stats(emissivity.view());
    let temperature_avg = round_to(lst_stats.mean, 1);
    let (heat_risk, description, is_urban_heat_island) = classify_heat(temperature_avg, ndvi_mean);

    Ok(ThermalReport {
        temperature_avg,
        temperature_max: round_to(lst_stats.max, 1),
        temperature_min: round_to(lst_stats.min, 1),
        emissivity_avg: round_to(emissivity_stats.mean, 4),
        heat_risk,
        description: description.to_string(),
        is_urban_heat_island,
    })
}

/// Heat risk from mean temperature; hot surfaces with little vegetation
/// count as urban heat islands.
pub fn classify_heat(temperature_avg: f64, ndvi_mean: f64) -> (HeatRisk, &'static str, bool) {
    let urban = temperature_avg > 35.0 && ndvi_mean < 0.2;
    if temperature_avg > 45.0 {
        (
            HeatRisk::Extreme,
            "Extreme heat — possible wildfire or industrial hotspot",
            urban,
        )
    } else if temperature_avg > 38.0 || urban {
        let description = if urban {
            "Urban heat island detected"
        } else {
            "High surface temperature"
        };
        (HeatRisk::High, description, urban)
    } else if temperature_avg > 32.0 {
        (HeatRisk::Moderate, "Elevated surface temperature", urban)
    } else if temperature_avg > 25.0 {
        (HeatRisk::Low, "Normal surface temperature", urban)
    } else {
        (
            HeatRisk::None,
            "Cool surface — likely water or dense vegetation",
            urban,
        )
    }
}

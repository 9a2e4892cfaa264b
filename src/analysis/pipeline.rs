//! Single-image classification pipeline.
//!
//! Picks the band or pixel path from the input variant, builds the
//! rule-based report, then lets the deep classifier override pixel-path
//! results it is confident about.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::deep::{DeepCapability, DeepPrediction};
use super::indices;
use super::landcover::{self, ClassProbability};
use super::risk::{self, RiskAssessment};
use super::thermal::{self, ThermalReport};
use super::{round_to, AnalysisError, BandSet, ImageInput, RgbImage};

/// Minimum deep-classifier confidence (inclusive) for an override.
pub const DEFAULT_OVERRIDE_CONFIDENCE: f64 = 0.50;

pub const BAND_MODEL: &str = "ndvi-satellite";
pub const PIXEL_MODEL: &str = "rgb-pixel";

/// Aggregate index values, rounded to 4 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub ndvi_mean: f64,
    pub ndvi_min: f64,
    pub ndvi_max: f64,
    pub ndvi_std: f64,
    pub ndwi_mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Spectral,
    #[serde(rename = "RGB")]
    Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DominantRgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

/// Measurements specific to the path that produced the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum PathDetails {
    Band {
        band_count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        thermal: Option<ThermalReport>,
    },
    Pixel {
        dominant_rgb: DominantRgb,
        brightness: f64,
        texture: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub file_size_bytes: u64,
    pub file_size_kb: f64,
    pub processing_time_seconds: f64,
    pub image_dimensions: String,
    pub file_type: FileKind,
    pub model_version: String,
    pub analysis_engines: Vec<String>,
}

/// Complete result for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub predicted_class: String,
    pub confidence: f64,
    pub analysis_model: String,
    pub probabilities: Vec<ClassProbability>,
    pub indices: IndexStats,
    pub vegetation_status: String,
    pub risk: RiskAssessment,
    pub details: PathDetails,
    /// Raw deep-classifier output whenever it ran, overriding or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep: Option<DeepPrediction>,
    pub metadata: ProcessingMetadata,
}

impl AnalysisReport {
    pub fn file_kind(&self) -> FileKind {
        self.metadata.file_type
    }
}

/// Stateless orchestrator; safe to share across threads.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    deep: DeepCapability,
    override_confidence: f64,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(DeepCapability::none())
    }
}

impl Orchestrator {
    pub fn new(deep: DeepCapability) -> Self {
        Self {
            deep,
            override_confidence: DEFAULT_OVERRIDE_CONFIDENCE,
        }
    }

    pub fn with_override_confidence(mut self, threshold: f64) -> Self {
        self.override_confidence = threshold;
        self
    }

    /// Analyze one decoded image. `input_size_bytes` is the size of the
    /// encoded file it came from, reported in the metadata.
    pub fn analyze(
        &self,
        input: &ImageInput,
        input_size_bytes: u64,
    ) -> Result<AnalysisReport, AnalysisError> {
        let start = Instant::now();

        let (mut report, file_type) = match input {
            ImageInput::Spectral(bands) => (analyze_bands(bands)?, FileKind::Spectral),
            ImageInput::Rgb(image) => (analyze_pixels(image)?, FileKind::Rgb),
        };
        let mut engines = vec![report.analysis_model.clone()];

        // Satellite-index results are never overridden by the pixel-trained model.
        if let ImageInput::Rgb(image) = input {
            if let Some(prediction) = self.deep.predict(image) {
                engines.push(prediction.model.clone());
                if prediction.confidence >= self.override_confidence {
                    debug!(
                        label = %prediction.label,
                        confidence = prediction.confidence,
                        "deep classifier overrides pixel result"
                    );
                    report.predicted_class = prediction.label.clone();
                    report.confidence = prediction.confidence;
                    report.analysis_model = prediction.model.clone();
                    report.probabilities = prediction.probabilities.clone();
                }
                report.deep = Some(prediction);
            }
        }

        let (width, height) = input.dimensions();
        report.metadata = ProcessingMetadata {
            file_size_bytes: input_size_bytes,
            file_size_kb: round_to(input_size_bytes as f64 / 1024.0, 1),
            processing_time_seconds: round_to(start.elapsed().as_secs_f64(), 3),
            image_dimensions: format!("{}x{}", width, height),
            file_type,
            model_version: env!("CARGO_PKG_VERSION").to_string(),
            analysis_engines: engines,
        };

        info!(
            class = %report.predicted_class,
            confidence = report.confidence,
            model = %report.analysis_model,
            ndvi = report.indices.ndvi_mean,
            "image analyzed"
        );
        Ok(report)
    }
}

fn analyze_bands(bands: &BandSet) -> Result<AnalysisReport, AnalysisError> {
    let ndvi = indices::ndvi(bands.nir.view(), bands.red.view())?;
    let ndvi_stats = indices::stats(ndvi.view());
    let ndwi = indices::ndwi(bands.green.view(), bands.nir.view())?;
    let ndwi_stats = indices::stats(ndwi.view());

    let stats = IndexStats {
        ndvi_mean: round_to(ndvi_stats.mean, 4),
        ndvi_min: round_to(ndvi_stats.min, 4),
        ndvi_max: round_to(ndvi_stats.max, 4),
        ndvi_std: round_to(ndvi_stats.std, 4),
        ndwi_mean: round_to(ndwi_stats.mean, 4),
    };

    let (label, status) = landcover::classify_ndvi(stats.ndvi_mean);
    let thermal = thermal::analyze(bands.red.view(), bands.nir.view(), ndvi.view(), stats.ndvi_mean).ok();

    Ok(AnalysisReport {
        predicted_class: label.name().to_string(),
        confidence: landcover::ndvi_confidence(stats.ndvi_mean),
        analysis_model: BAND_MODEL.to_string(),
        probabilities: landcover::ndvi_probabilities(stats.ndvi_mean),
        indices: stats,
        vegetation_status: status.to_string(),
        risk: risk::assess(stats.ndvi_mean, stats.ndvi_std, stats.ndwi_mean),
        details: PathDetails::Band {
            band_count: bands.band_count,
            thermal,
        },
        deep: None,
        metadata: empty_metadata(FileKind::Spectral),
    })
}

fn analyze_pixels(image: &RgbImage) -> Result<AnalysisReport, AnalysisError> {
    let result = landcover::classify_pixels(image)?;
    let stats = IndexStats {
        ndvi_mean: round_to(result.ndvi.mean, 4),
        ndvi_min: round_to(result.ndvi.min, 4),
        ndvi_max: round_to(result.ndvi.max, 4),
        ndvi_std: round_to(result.ndvi.std, 4),
        ndwi_mean: round_to(result.ndwi.mean, 4),
    };
    let (_, status) = landcover::classify_ndvi(result.ndvi.mean);

    Ok(AnalysisReport {
        predicted_class: result.label.name().to_string(),
        confidence: result.confidence,
        analysis_model: PIXEL_MODEL.to_string(),
        probabilities: result.probabilities,
        indices: stats,
        vegetation_status: status.to_string(),
        risk: risk::assess(result.ndvi.mean, result.ndvi.std, result.ndwi.mean),
        details: PathDetails::Pixel {
            dominant_rgb: DominantRgb {
                red: round_to(result.mean_red, 1),
                green: round_to(result.mean_green, 1),
                blue: round_to(result.mean_blue, 1),
            },
            brightness: round_to(result.brightness, 1),
            texture: round_to(result.texture, 1),
        },
        deep: None,
        metadata: empty_metadata(FileKind::Rgb),
    })
}

fn empty_metadata(file_type: FileKind) -> ProcessingMetadata {
    ProcessingMetadata {
        file_size_bytes: 0,
        file_size_kb: 0.0,
        processing_time_seconds: 0.0,
        image_dimensions: String::new(),
        file_type,
        model_version: String::new(),
        analysis_engines: Vec::new(),
    }
}

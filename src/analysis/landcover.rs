//! Rule-based land-cover classification.
//!
//! Two independent algorithms, never mixed in one result:
//! - the band path looks up `ndvi_mean` in a fixed threshold table;
//! - the pixel path scores six classes from RGB channel statistics.

use serde::{Deserialize, Serialize};

use super::indices::{self, Stats};
use super::{round_to, AnalysisError, RgbImage};

/// Closed set of land-cover labels produced by the rule-based paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandCover {
    DenseForest,
    Forest,
    VegetationCrops,
    SparseVegetation,
    BareSoil,
    BarrenLand,
    WaterNonVegetation,
    WaterBody,
    UrbanArea,
    Agriculture,
    Wetland,
}

impl LandCover {
    pub fn name(&self) -> &'static str {
        match self {
            LandCover::DenseForest => "Dense Forest",
            LandCover::Forest => "Forest",
            LandCover::VegetationCrops => "Vegetation/Crops",
            LandCover::SparseVegetation => "Sparse Vegetation",
            LandCover::BareSoil => "Bare Soil",
            LandCover::BarrenLand => "Barren Land",
            LandCover::WaterNonVegetation => "Water/Non-Vegetation",
            LandCover::WaterBody => "Water Body",
            LandCover::UrbanArea => "Urban Area",
            LandCover::Agriculture => "Agriculture",
            LandCover::Wetland => "Wetland",
        }
    }
}

impl std::fmt::Display for LandCover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a probability distribution, as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub name: String,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Band path
// ---------------------------------------------------------------------------

/// Threshold table, highest first. The last row is the catch-all; its
/// threshold is only used as the representative value for probabilities.
const NDVI_TABLE: [(f64, LandCover, &str); 7] = [
    (0.6, LandCover::DenseForest, "Thriving dense vegetation"),
    (0.4, LandCover::Forest, "Healthy vegetation cover"),
    (0.3, LandCover::VegetationCrops, "Moderate vegetation — likely agricultural"),
    (0.2, LandCover::SparseVegetation, "Sparse or stressed vegetation"),
    (0.05, LandCover::BareSoil, "Minimal vegetation — bare ground"),
    (-0.05, LandCover::BarrenLand, "No significant vegetation"),
    (-1.0, LandCover::WaterNonVegetation, "Water body or non-vegetated surface"),
];

/// Map a mean NDVI to its land-cover class and vegetation status text.
pub fn classify_ndvi(ndvi_mean: f64) -> (LandCover, &'static str) {
    for &(threshold, class, status) in &NDVI_TABLE[..NDVI_TABLE.len() - 1] {
        if ndvi_mean > threshold {
            return (class, status);
        }
    }
    let (_, class, status) = NDVI_TABLE[NDVI_TABLE.len() - 1];
    (class, status)
}

/// Synthetic distribution from the distance of `ndvi_mean` to each class's
/// representative threshold. Not a posterior.
pub fn ndvi_probabilities(ndvi_mean: f64) -> Vec<ClassProbability> {
    let scores: Vec<(LandCover, f64)> = NDVI_TABLE
        .iter()
        .map(|&(threshold, class, _)| {
            let score = (1.0 - (ndvi_mean - threshold).abs() * 2.0).max(0.01);
            (class, round_to(score, 3))
        })
        .collect();
    to_percentages(&scores)
}

/// Heuristic confidence for the band path: `min(|ndvi_mean| + 0.4, 0.99)`.
pub fn ndvi_confidence(ndvi_mean: f64) -> f64 {
    round_to(ndvi_mean.abs() + 0.4, 2).min(0.99)
}

/// Normalize raw scores to percentages (1 decimal), sorted descending.
///
/// Uses largest-remainder rounding on tenths of a percent so the
/// distribution always sums to exactly 100.0. The sort is stable, so ties
/// keep table order.
fn to_percentages(scores: &[(LandCover, f64)]) -> Vec<ClassProbability> {
    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    let total = if total > 0.0 { total } else { 1.0 };

    let raw: Vec<f64> = scores.iter().map(|(_, s)| s / total * 1000.0).collect();
    let mut tenths: Vec<i64> = raw.iter().map(|r| r.floor() as i64).collect();
    let remaining = (1000 - tenths.iter().sum::<i64>()).max(0) as usize;

    let mut by_remainder: Vec<usize> = (0..raw.len()).collect();
    by_remainder.sort_by(|&a, &b| (raw[b] - raw[b].floor()).total_cmp(&(raw[a] - raw[a].floor())));
    for &i in by_remainder.iter().cycle().take(remaining) {
        tenths[i] += 1;
    }

    let mut probabilities: Vec<ClassProbability> = scores
        .iter()
        .zip(tenths)
        .map(|((class, _), t)| ClassProbability {
            name: class.name().to_string(),
            value: t as f64 / 10.0,
        })
        .collect();
    probabilities.sort_by(|a, b| b.value.total_cmp(&a.value));
    probabilities
}

// ---------------------------------------------------------------------------
// Pixel path
// ---------------------------------------------------------------------------

/// Everything the pixel path measured and decided for one image.
#[derive(Debug, Clone, Serialize)]
pub struct PixelClassification {
    pub label: LandCover,
    pub confidence: f64,
    pub probabilities: Vec<ClassProbability>,
    pub ndvi: Stats,
    pub ndwi: Stats,
    pub mean_red: f64,
    pub mean_green: f64,
    pub mean_blue: f64,
    pub brightness: f64,
    pub texture: f64,
}

/// Score six candidate classes from RGB statistics and pick the best.
pub fn classify_pixels(image: &RgbImage) -> Result<PixelClassification, AnalysisError> {
    let red = image.red();
    let green = image.green();
    let blue = image.blue();

    let avg_r = red.mean().ok_or(AnalysisError::EmptyImage)?;
    let avg_g = green.mean().ok_or(AnalysisError::EmptyImage)?;
    let avg_b = blue.mean().ok_or(AnalysisError::EmptyImage)?;
    let brightness = image.pixels().mean().ok_or(AnalysisError::EmptyImage)?;

    let ndvi = indices::stats(indices::ndvi_rgb(green, red)?.view());
    let ndwi = indices::stats(indices::ndwi_rgb(green, blue)?.view());

    let gray = image.pixels().mean_axis(ndarray::Axis(2)).ok_or(AnalysisError::EmptyImage)?;
    let texture = gray.std(0.0);

    let total = avg_r + avg_g + avg_b;
    let total = if total == 0.0 { 1.0 } else { total };
    let (gr, br, rr) = (avg_g / total, avg_b / total, avg_r / total);
    let n = ndvi.mean;
    let bonus = |cond: bool, v: f64| if cond { v } else { 0.0 };

    let scores = [
        (
            LandCover::Forest,
            gr * 2.0
                + n.max(0.0) * 3.0
                + bonus(avg_g > 100.0 && avg_g > avg_r, 0.3)
                + bonus(n > 0.05, 0.2),
        ),
        (
            LandCover::WaterBody,
            br * 1.5
                + (-n).max(0.0) * 1.5
                + bonus(brightness < 100.0, 0.3)
                + bonus(avg_b > avg_g, 0.2),
        ),
        (
            LandCover::UrbanArea,
            rr + (texture / 255.0) * 1.5 + bonus(brightness > 140.0, 0.15),
        ),
        (
            LandCover::Agriculture,
            gr * 0.8 + bonus(n > 0.0 && n < 0.15, 0.3) + bonus(avg_g > 80.0 && avg_g < 130.0, 0.1),
        ),
        (
            LandCover::BarrenLand,
            rr * 0.8 + bonus(n.abs() < 0.03, 0.3) + bonus(brightness > 160.0, 0.2),
        ),
        (
            LandCover::Wetland,
            gr * 0.5 + br * 0.5 + bonus(n > 0.0 && n < 0.1, 0.2),
        ),
    ];

    let probabilities = to_percentages(&scores);
    let top = &probabilities[0];
    let label = scores
        .iter()
        .map(|(class, _)| *class)
        .find(|class| class.name() == top.name)
        .unwrap_or(LandCover::Forest);

    Ok(PixelClassification {
        label,
        confidence: round_to(top.value / 100.0, 2),
        probabilities,
        ndvi,
        ndwi,
        mean_red: avg_r,
        mean_green: avg_g,
        mean_blue: avg_b,
        brightness,
        texture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn solid(r: f64, g: f64, b: f64) -> RgbImage {
        let pixels = Array3::from_shape_fn((8, 8, 3), |(_, _, c)| [r, g, b][c]);
        RgbImage::new(pixels).unwrap()
    }

    fn assert_distribution(probs: &[ClassProbability]) {
        let sum: f64 = probs.iter().map(|p| p.value).sum();
        assert!((sum - 100.0).abs() <= 0.2, "sum was {}", sum);
        assert!(probs.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn test_classify_ndvi_table() {
        assert_eq!(
            classify_ndvi(0.72),
            (LandCover::DenseForest, "Thriving dense vegetation")
        );
        assert_eq!(classify_ndvi(0.5).0, LandCover::Forest);
        assert_eq!(classify_ndvi(0.35).0, LandCover::VegetationCrops);
        assert_eq!(classify_ndvi(0.25).0, LandCover::SparseVegetation);
        assert_eq!(classify_ndvi(0.1).0, LandCover::BareSoil);
        assert_eq!(classify_ndvi(0.0).0, LandCover::BarrenLand);
        assert_eq!(classify_ndvi(-0.3).0, LandCover::WaterNonVegetation);
        // Exclusive lower bounds.
        assert_eq!(classify_ndvi(0.6).0, LandCover::Forest);
        assert_eq!(classify_ndvi(-0.05).0, LandCover::WaterNonVegetation);
    }

    #[test]
    fn test_ndvi_probabilities_shape() {
        for ndvi in [-0.8, -0.05, 0.0, 0.12, 0.33, 0.72, 0.95] {
            let probs = ndvi_probabilities(ndvi);
            assert_eq!(probs.len(), 7);
            assert_distribution(&probs);
        }
        assert_eq!(ndvi_probabilities(0.6)[0].name, "Dense Forest");
    }

    #[test]
    fn test_ndvi_confidence() {
        assert_eq!(ndvi_confidence(0.72), 0.99);
        assert_eq!(ndvi_confidence(0.25), 0.65);
        assert_eq!(ndvi_confidence(-0.1), 0.5);
    }

    #[test]
    fn test_green_image_is_forest() {
        let result = classify_pixels(&solid(40.0, 160.0, 50.0)).unwrap();
        assert_eq!(result.label, LandCover::Forest);
        assert_distribution(&result.probabilities);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert_eq!(result.texture, 0.0);
    }

    #[test]
    fn test_dark_blue_image_is_water() {
        let result = classify_pixels(&solid(60.0, 40.0, 120.0)).unwrap();
        assert_eq!(result.label, LandCover::WaterBody);
        assert!(result.ndvi.mean < 0.0);
    }

    #[test]
    fn test_black_image_does_not_divide_by_zero() {
        let result = classify_pixels(&solid(0.0, 0.0, 0.0)).unwrap();
        assert_distribution(&result.probabilities);
        assert_eq!(result.ndvi.mean, 0.0);
    }
}

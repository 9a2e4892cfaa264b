//! Flood risk and vegetation stress derived from index aggregates.

use serde::{Deserialize, Serialize};

/// Flood risk ladder from mean NDWI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FloodRisk {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl FloodRisk {
    /// High or Critical -- the levels that raise alerts.
    pub fn is_elevated(&self) -> bool {
        matches!(self, FloodRisk::High | FloodRisk::Critical)
    }
}

impl std::fmt::Display for FloodRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FloodRisk::None => "None",
            FloodRisk::Low => "Low",
            FloodRisk::Moderate => "Moderate",
            FloodRisk::High => "High",
            FloodRisk::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Exclusive lower bounds, evaluated highest first.
pub fn flood_risk(ndwi_mean: f64) -> FloodRisk {
    if ndwi_mean > 0.5 {
        FloodRisk::Critical
    } else if ndwi_mean > 0.3 {
        FloodRisk::High
    } else if ndwi_mean > 0.1 {
        FloodRisk::Moderate
    } else if ndwi_mean > -0.1 {
        FloodRisk::Low
    } else {
        FloodRisk::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    #[serde(rename = "N/A")]
    NotApplicable,
    Healthy,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationStress {
    pub level: StressLevel,
    pub description: String,
}

impl VegetationStress {
    fn new(level: StressLevel, description: &str) -> Self {
        Self {
            level,
            description: description.to_string(),
        }
    }

    /// Severe or Moderate stress.
    pub fn is_significant(&self) -> bool {
        matches!(self.level, StressLevel::Severe | StressLevel::Moderate)
    }
}

/// Stress from the spatial spread of NDVI relative to its mean.
///
/// Surfaces with `ndvi_mean < 0.1` carry no vegetation to stress.
pub fn vegetation_stress(ndvi_std: f64, ndvi_mean: f64) -> VegetationStress {
    if ndvi_mean < 0.1 {
        return VegetationStress::new(StressLevel::NotApplicable, "No vegetation detected");
    }
    let ratio = ndvi_std / (ndvi_mean.abs() + 1e-6);
    if ratio > 0.5 {
        VegetationStress::new(
            StressLevel::Severe,
            "High spatial variance — vegetation under severe stress",
        )
    } else if ratio > 0.3 {
        VegetationStress::new(
            StressLevel::Moderate,
            "Significant variance — possible drought or disease",
        )
    } else if ratio > 0.15 {
        VegetationStress::new(StressLevel::Mild, "Some variance — light stress present")
    } else {
        VegetationStress::new(
            StressLevel::Healthy,
            "Uniform vegetation — no significant stress",
        )
    }
}

/// Qualitative surface-water reading of mean NDWI.
pub fn water_presence(ndwi_mean: f64) -> &'static str {
    if ndwi_mean > 0.5 {
        "Open water"
    } else if ndwi_mean > 0.3 {
        "High moisture / shallow water"
    } else if ndwi_mean > 0.0 {
        "Some moisture"
    } else {
        "Dry surface"
    }
}

/// Combined flood and vegetation assessment for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub flood_risk: FloodRisk,
    pub vegetation_stress: VegetationStress,
    pub water_presence: String,
}

pub fn assess(ndvi_mean: f64, ndvi_std: f64, ndwi_mean: f64) -> RiskAssessment {
    RiskAssessment {
        flood_risk: flood_risk(ndwi_mean),
        vegetation_stress: vegetation_stress(ndvi_std, ndvi_mean),
        water_presence: water_presence(ndwi_mean).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flood_ladder() {
        assert_eq!(flood_risk(0.6), FloodRisk::Critical);
        assert_eq!(flood_risk(0.35), FloodRisk::High);
        assert_eq!(flood_risk(0.15), FloodRisk::Moderate);
        assert_eq!(flood_risk(0.0), FloodRisk::Low);
        assert_eq!(flood_risk(-0.5), FloodRisk::None);
        // Boundaries belong to the lower level.
        assert_eq!(flood_risk(0.5), FloodRisk::High);
        assert_eq!(flood_risk(-0.1), FloodRisk::None);
    }

    #[test]
    fn test_vegetation_stress_levels() {
        assert_eq!(vegetation_stress(0.4, 0.5).level, StressLevel::Severe);
        assert_eq!(vegetation_stress(0.01, 0.05).level, StressLevel::NotApplicable);
        assert_eq!(vegetation_stress(0.2, 0.5).level, StressLevel::Moderate);
        assert_eq!(vegetation_stress(0.1, 0.5).level, StressLevel::Mild);
        assert_eq!(vegetation_stress(0.05, 0.5).level, StressLevel::Healthy);
    }

    #[test]
    fn test_stress_serializes_na() {
        let json = serde_json::to_string(&vegetation_stress(0.0, 0.0)).unwrap();
        assert!(json.contains("\"N/A\""));
        assert!(json.contains("No vegetation detected"));
    }

    #[test]
    fn test_water_presence() {
        assert_eq!(water_presence(0.7), "Open water");
        assert_eq!(water_presence(0.0), "Dry surface");
        assert_eq!(water_presence(0.2), "Some moisture");
    }
}

use tracing::debug;

use super::{Alert, AlertModule, AlertStore, NewAlert, Severity};
use crate::analysis::pipeline::AnalysisReport;
use crate::analysis::risk::FloodRisk;

/// Region label for alerts raised by single-image analysis.
pub const UPLOAD_REGION: &str = "Analysis Upload";

/// Threshold checks for one analyzed image. Records any alerts in the store,
/// folds the report into the upload aggregates, and returns the new alerts.
///
/// An NDVI of exactly 0.0 is treated as "no reading" and never alerts.
pub async fn check_analysis_alerts(
    store: &AlertStore,
    report: &AnalysisReport,
    ndvi_alert_threshold: f64,
) -> Vec<Alert> {
    let mut raised = Vec::new();
    let ndvi = report.indices.ndvi_mean;

    if ndvi < ndvi_alert_threshold && ndvi != 0.0 {
        let severity = if ndvi < 0.1 {
            Severity::High
        } else {
            Severity::Medium
        };
        let title = format!(
            "Vegetation stress detected — NDVI {:.3} below threshold {}",
            ndvi, ndvi_alert_threshold
        );
        raised.push(
            store
                .record(NewAlert::new(title, severity, AlertModule::Deforestation, UPLOAD_REGION))
                .await,
        );
    }

    let flood = report.risk.flood_risk;
    if flood.is_elevated() {
        let severity = if flood == FloodRisk::Critical {
            Severity::Critical
        } else {
            Severity::High
        };
        let title = format!(
            "Flood risk {} — NDWI indicates water accumulation ({})",
            flood, report.predicted_class
        );
        raised.push(
            store
                .record(NewAlert::new(title, severity, AlertModule::FloodMonitoring, UPLOAD_REGION))
                .await,
        );
    }

    store.record_upload(report).await;
    debug!(alerts = raised.len(), "upload threshold checks complete");
    raised
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline::Orchestrator;
    use crate::analysis::{BandSet, ImageInput};
    use ndarray::Array2;

    fn bands(blue: f64, green: f64, red: f64, nir: f64) -> ImageInput {
        let shape = (4, 4);
        ImageInput::Spectral(
            BandSet::new(
                Array2::from_elem(shape, blue),
                Array2::from_elem(shape, green),
                Array2::from_elem(shape, red),
                Array2::from_elem(shape, nir),
                4,
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_flooded_scene_raises_both_alerts() {
        // NDVI = (200 - 300) / 500 = -0.2, NDWI = (1000 - 200) / 1200 = 0.667
        let report = Orchestrator::default().analyze(&bands(100.0, 1000.0, 300.0, 200.0), 0).unwrap();
        let store = AlertStore::new();
        let alerts = check_analysis_alerts(&store, &report, 0.2).await;

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].module, AlertModule::Deforestation);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[1].module, AlertModule::FloodMonitoring);
        assert_eq!(alerts[1].severity, Severity::Critical);
        assert_eq!(alerts[1].region, UPLOAD_REGION);

        let stats = store.aggregate_stats().await;
        assert_eq!(stats.total_uploads, 1);
        assert_eq!(stats.flood_risk_count, 1);
        assert_eq!(stats.avg_ndvi, -0.2);
    }

    #[tokio::test]
    async fn test_healthy_scene_raises_nothing() {
        // NDVI = 0.8, NDWI strongly negative.
        let report = Orchestrator::default().analyze(&bands(300.0, 500.0, 400.0, 3600.0), 0).unwrap();
        let store = AlertStore::new();
        assert!(check_analysis_alerts(&store, &report, 0.2).await.is_empty());
        assert_eq!(store.aggregate_stats().await.total_uploads, 1);
    }
}

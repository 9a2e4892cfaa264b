//! landwatch -- land-cover classification and satellite region monitoring.
//!
//! This crate provides spectral index computation, land-cover and risk
//! classification for single images, periodic monitoring of fixed regions
//! from Sentinel-2 (or simulated) tiles, and an alert store.

pub mod analysis;
pub mod config;
pub mod detect;
pub mod monitor;
pub mod raster;
pub mod scheduler;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use analysis::deep::{DeepCapability, DeepClassifier};
use analysis::pipeline::{AnalysisReport, Orchestrator};
use config::Settings;
use detect::{Alert, AlertStore, JsonlAlertSink};
use monitor::regions::default_regions;
use monitor::{MonitorSettings, RegionMonitor};

/// Alert store, with the JSON-lines sink attached when configured.
pub async fn build_alert_store(settings: &Settings) -> Result<Arc<AlertStore>> {
    let store = match &settings.logging.alert_log_path {
        Some(path) => {
            let sink = JsonlAlertSink::open(path).await?;
            info!(path = %sink.path().display(), "alert log enabled");
            AlertStore::new().with_sink(Arc::new(sink))
        }
        None => AlertStore::new(),
    };
    Ok(Arc::new(store))
}

/// Classification pipeline. The deep classifier, if any, is probed once
/// here; no model ships with the binary.
pub fn build_orchestrator(settings: &Settings, classifier: Option<Arc<dyn DeepClassifier>>) -> Orchestrator {
    Orchestrator::new(DeepCapability::resolve(classifier))
        .with_override_confidence(settings.thresholds.deep_override_confidence)
}

/// Region monitor over the default regions with the configured tile source.
pub fn build_monitor(settings: &Settings, alerts: Arc<AlertStore>) -> RegionMonitor {
    RegionMonitor::new(
        default_regions(),
        monitor::tile::select_source(&settings.sentinel),
        alerts,
        MonitorSettings::from(settings),
    )
}

/// Decode, classify and run upload alert checks for one image file.
pub async fn analyze_file(
    path: &Path,
    orchestrator: &Orchestrator,
    alerts: &AlertStore,
    settings: &Settings,
) -> Result<(AnalysisReport, Vec<Alert>)> {
    let (input, size) = raster::load_image(path).await?;
    let report = orchestrator.analyze(&input, size)?;
    let raised = detect::check_analysis_alerts(alerts, &report, settings.thresholds.ndvi_alert_threshold).await;
    info!(path = %path.display(), alerts = raised.len(), "upload checks complete");
    Ok((report, raised))
}

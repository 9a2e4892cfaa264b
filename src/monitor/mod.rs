//! Periodic region monitoring.
//!
//! Each cycle fetches a tile per region, derives NDVI/NDWI, grades risk,
//! compares against the region's previous reading and raises alerts, then
//! records the reading in a bounded per-region history.

pub mod regions;
pub mod tile;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use self::regions::Region;
use self::tile::{SimulatedSource, Tile, TileMode, TileSource};
use crate::analysis::indices;
use crate::analysis::risk::{flood_risk, FloodRisk};
use crate::analysis::{round_to, AnalysisError};
use crate::config::Settings;
use crate::detect::{AlertModule, AlertStore, NewAlert, Severity};
use crate::raster;

/// NDVI fall between consecutive cycles that counts as a drop.
pub const NDVI_DROP_THRESHOLD: f64 = 0.1;

/// Upper bound on per-region history entries.
pub const MAX_HISTORY: usize = 30;

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        f.pad(s)
    }
}

/// Overall region risk from its index means. Flooding dominates, then low
/// vegetation; the band between 0.3 and 0.6 stays Moderate.
pub fn determine_risk(ndvi: f64, ndwi: f64) -> RiskLevel {
    if flood_risk(ndwi).is_elevated() {
        RiskLevel::Critical
    } else if ndvi < 0.15 {
        RiskLevel::High
    } else if ndvi < 0.3 {
        RiskLevel::Moderate
    } else if ndvi > 0.6 {
        RiskLevel::Low
    } else {
        RiskLevel::Moderate
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub ndvi: f64,
    pub ndwi: f64,
    pub risk: RiskLevel,
    pub mode: TileMode,
}

/// Latest reading and bounded history for one tracked region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionState {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub ndvi: f64,
    pub ndwi: f64,
    pub risk_level: RiskLevel,
    pub last_processed: DateTime<Utc>,
    pub tile_id: String,
    pub cloud_cover: f64,
    pub mode: TileMode,
    pub history: VecDeque<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub region_name: String,
    pub ndvi: f64,
    pub ndwi: f64,
    pub risk_level: RiskLevel,
    pub alerts_triggered: usize,
    pub mode: TileMode,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub ndvi_alert_threshold: f64,
    pub history_limit: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            ndvi_alert_threshold: 0.2,
            history_limit: MAX_HISTORY,
        }
    }
}

impl From<&Settings> for MonitorSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            ndvi_alert_threshold: settings.thresholds.ndvi_alert_threshold,
            history_limit: settings.monitor.history_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct RegionMonitor {
    regions: Vec<Region>,
    source: Arc<dyn TileSource>,
    fallback: SimulatedSource,
    alerts: Arc<AlertStore>,
    settings: MonitorSettings,
    state: RwLock<HashMap<String, RegionState>>,
}

impl RegionMonitor {
    pub fn new(
        regions: Vec<Region>,
        source: Arc<dyn TileSource>,
        alerts: Arc<AlertStore>,
        mut settings: MonitorSettings,
    ) -> Self {
        settings.history_limit = settings.history_limit.clamp(1, MAX_HISTORY);
        Self {
            regions,
            source,
            fallback: SimulatedSource::new(),
            alerts,
            settings,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Use this simulator for degraded readings instead of the wall-clock one.
    pub fn with_fallback(mut self, fallback: SimulatedSource) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn monitored_regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn source_mode(&self) -> TileMode {
        self.source.mode()
    }

    pub fn alerts(&self) -> &Arc<AlertStore> {
        &self.alerts
    }

    /// Process one region. Never fails: fetch errors and unreadable rasters
    /// degrade to simulated values.
    pub async fn run_cycle(&self, region: &Region) -> CycleSummary {
        let tile = match self.source.fetch(region).await {
            Ok(tile) => tile,
            Err(e) => {
                warn!(region = %region.name, error = %e, "tile fetch failed, using simulated tile");
                self.fallback.tile_for(region)
            }
        };

        let (ndvi, ndwi, mode) = read_indices(&tile);
        let risk = determine_risk(ndvi, ndwi);
        let flood = flood_risk(ndwi);
        let threshold = self.settings.ndvi_alert_threshold;

        let mut states = self.state.write().await;
        let prev_ndvi = states.get(&region.name).map(|s| s.ndvi);

        let mut drafts = Vec::new();
        if let Some(prev) = prev_ndvi {
            if prev - ndvi > NDVI_DROP_THRESHOLD {
                drafts.push(NewAlert::new(
                    format!("NDVI drop detected in {}: {:.3} -> {:.3}", region.name, prev, ndvi),
                    Severity::High,
                    AlertModule::Deforestation,
                    &region.name,
                ));
            }
        }
        if ndvi < threshold {
            drafts.push(NewAlert::new(
                format!("Vegetation stress in {}: NDVI {:.3} below {}", region.name, ndvi, threshold),
                if ndvi < 0.1 { Severity::High } else { Severity::Medium },
                AlertModule::Deforestation,
                &region.name,
            ));
        }
        if flood.is_elevated() {
            drafts.push(NewAlert::new(
                format!("Flood risk {} in {}: NDWI {:.3}", flood, region.name, ndwi),
                if flood == FloodRisk::Critical {
                    Severity::Critical
                } else {
                    Severity::High
                },
                AlertModule::FloodMonitoring,
                &region.name,
            ));
        }

        let alerts_triggered = drafts.len();

        let now = Utc::now();
        let state = states.entry(region.name.clone()).or_insert_with(|| RegionState {
            name: region.name.clone(),
            latitude: region.latitude,
            longitude: region.longitude,
            ndvi,
            ndwi,
            risk_level: risk,
            last_processed: now,
            tile_id: String::new(),
            cloud_cover: 0.0,
            mode,
            history: VecDeque::new(),
        });

        state.history.push_back(HistoryEntry {
            date: now.date_naive(),
            ndvi,
            ndwi,
            risk,
            mode,
        });
        while state.history.len() > self.settings.history_limit {
            state.history.pop_front();
        }

        state.ndvi = ndvi;
        state.ndwi = ndwi;
        state.risk_level = risk;
        state.last_processed = now;
        state.tile_id = tile.tile_id;
        state.cloud_cover = tile.cloud_cover;
        state.mode = mode;
        drop(states);

        // The store assigns ids under its own lock; sink I/O stays off the
        // region map.
        for draft in drafts {
            self.alerts.record(draft).await;
        }

        info!(
            region = %region.name,
            mode = %mode,
            ndvi,
            ndwi,
            risk = %risk,
            alerts = alerts_triggered,
            "region processed"
        );

        CycleSummary {
            region_name: region.name.clone(),
            ndvi,
            ndwi,
            risk_level: risk,
            alerts_triggered,
            mode,
            processed_at: now,
        }
    }

    /// Process every region in order, one summary each.
    pub async fn run_full_cycle(&self) -> Vec<CycleSummary> {
        info!(
            mode = %self.source.mode(),
            regions = self.regions.len(),
            "starting monitoring cycle"
        );

        let mut summaries = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            summaries.push(self.run_cycle(region).await);
        }

        let alerts: usize = summaries.iter().map(|s| s.alerts_triggered).sum();
        info!(regions = summaries.len(), alerts, "monitoring cycle complete");
        summaries
    }

    pub async fn region(&self, name: &str) -> Option<RegionState> {
        self.state.read().await.get(name).cloned()
    }

    /// Tracked regions in processing order.
    pub async fn regions(&self) -> Vec<RegionState> {
        let states = self.state.read().await;
        self.regions
            .iter()
            .filter_map(|r| states.get(&r.name).cloned())
            .collect()
    }

    /// Like [`regions`](Self::regions), but runs a full cycle first when no
    /// region has been tracked yet.
    pub async fn regions_or_refresh(&self) -> Vec<RegionState> {
        if self.state.read().await.is_empty() {
            debug!("no tracked regions, running initial cycle");
            self.run_full_cycle().await;
        }
        self.regions().await
    }
}

/// Index means for a tile. Raster data is processed when present; otherwise,
/// or when processing fails, the precomputed values are used (0.0 if absent).
fn read_indices(tile: &Tile) -> (f64, f64, TileMode) {
    if let Some(data) = &tile.raster {
        match raster_means(data) {
            Ok((ndvi, ndwi)) => return (ndvi, ndwi, tile.mode),
            Err(e) => {
                warn!(tile = %tile.tile_id, error = %e, "failed to process tile raster, using fallback values");
                // A simulator-provided fallback makes this a simulated reading.
                let mode = if tile.ndvi.is_some() {
                    TileMode::Simulated
                } else {
                    tile.mode
                };
                return (tile.ndvi.unwrap_or(0.0), tile.ndwi.unwrap_or(0.0), mode);
            }
        }
    }
    (tile.ndvi.unwrap_or(0.0), tile.ndwi.unwrap_or(0.0), tile.mode)
}

fn raster_means(data: &[u8]) -> Result<(f64, f64), AnalysisError> {
    let bands = raster::tile_bands(&raster::decode_tiff(data)?)?;
    let ndvi = indices::ndvi(bands.nir.view(), bands.red.view())?;
    let ndwi = indices::ndwi(bands.green.view(), bands.nir.view())?;
    Ok((
        round_to(indices::stats(ndvi.view()).mean, 4),
        round_to(indices::stats(ndwi.view()).mean, 4),
    ))
}

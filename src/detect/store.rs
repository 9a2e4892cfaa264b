use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{Alert, AlertSink, NewAlert};
use crate::analysis::pipeline::AnalysisReport;
use crate::analysis::round_to;

/// Running totals over analyzed uploads.
#[derive(Debug, Default)]
struct UploadTotals {
    total_uploads: u64,
    ndvi_sum: f64,
    ndwi_sum: f64,
    flood_high_count: u64,
    stress_count: u64,
}

/// Averages and counts over every upload recorded so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_uploads: u64,
    pub avg_ndvi: f64,
    pub avg_ndwi: f64,
    pub flood_risk_count: u64,
    pub vegetation_stress_count: u64,
}

struct AlertLog {
    alerts: Vec<Alert>,
    /// Next id to hand out. Independent of `alerts.len()`.
    next_id: u64,
    uploads: UploadTotals,
}

/// Process-wide alert list and upload counters.
///
/// Created once at startup and shared by handle. Appends and id
/// assignment happen under one write lock; reads clone a snapshot.
pub struct AlertStore {
    inner: RwLock<AlertLog>,
    sink: Option<Arc<dyn AlertSink>>,
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AlertLog {
                alerts: Vec::new(),
                next_id: 1,
                uploads: UploadTotals::default(),
            }),
            sink: None,
        }
    }

    /// Forward every recorded alert to an external sink as well.
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Assign an id, append, and forward to the sink. Sink failures are
    /// logged and do not affect the stored alert.
    pub async fn record(&self, draft: NewAlert) -> Alert {
        let alert = {
            let mut log = self.inner.write().await;
            let alert = Alert {
                id: log.next_id,
                title: draft.title,
                severity: draft.severity,
                module: draft.module,
                region: draft.region,
                resolved: false,
                created_at: Utc::now(),
            };
            log.next_id += 1;
            log.alerts.push(alert.clone());
            alert
        };

        info!(
            id = alert.id,
            severity = ?alert.severity,
            module = %alert.module,
            region = %alert.region,
            "ALERT: {}",
            alert.title
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.emit(&alert).await {
                warn!(id = alert.id, error = %e, "alert sink rejected alert");
            }
        }
        alert
    }

    /// Mark an alert resolved. Returns false if no alert has that id.
    pub async fn resolve(&self, id: u64) -> bool {
        let mut log = self.inner.write().await;
        match log.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.resolved = true;
                true
            }
            None => false,
        }
    }

    /// All alerts, oldest first.
    pub async fn list(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.clone()
    }

    /// Up to `limit` alerts, newest first.
    pub async fn list_recent(&self, limit: usize) -> Vec<Alert> {
        let log = self.inner.read().await;
        log.alerts.iter().rev().take(limit).cloned().collect()
    }

    pub async fn unresolved_count(&self) -> usize {
        let log = self.inner.read().await;
        log.alerts.iter().filter(|a| !a.resolved).count()
    }

    /// Fold one analyzed upload into the aggregate counters.
    pub async fn record_upload(&self, report: &AnalysisReport) {
        let mut log = self.inner.write().await;
        let totals = &mut log.uploads;
        totals.total_uploads += 1;
        totals.ndvi_sum += report.indices.ndvi_mean;
        totals.ndwi_sum += report.indices.ndwi_mean;
        if report.risk.flood_risk.is_elevated() {
            totals.flood_high_count += 1;
        }
        if report.risk.vegetation_stress.is_significant() {
            totals.stress_count += 1;
        }
    }

    pub async fn aggregate_stats(&self) -> AggregateStats {
        let log = self.inner.read().await;
        let totals = &log.uploads;
        let divisor = totals.total_uploads.max(1) as f64;
        AggregateStats {
            total_uploads: totals.total_uploads,
            avg_ndvi: round_to(totals.ndvi_sum / divisor, 4),
            avg_ndwi: round_to(totals.ndwi_sum / divisor, 4),
            flood_risk_count: totals.flood_high_count,
            vegetation_stress_count: totals.stress_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{AlertModule, Severity};

    fn draft(title: &str) -> NewAlert {
        NewAlert::new(title, Severity::High, AlertModule::Deforestation, "Amazon Basin")
    }

    #[tokio::test]
    async fn test_ids_monotonic_and_never_reused() {
        let store = AlertStore::new();
        let a = store.record(draft("first")).await;
        let b = store.record(draft("second")).await;
        assert_eq!((a.id, b.id), (1, 2));

        assert!(store.resolve(a.id).await);
        let c = store.record(draft("third")).await;
        assert_eq!(c.id, 3);

        let all = store.list().await;
        assert_eq!(all.len(), 3);
        assert!(all[0].resolved);
        assert_eq!(store.unresolved_count().await, 2);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id() {
        let store = AlertStore::new();
        assert!(!store.resolve(42).await);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = AlertStore::new();
        for i in 0..5 {
            store.record(draft(&format!("alert {}", i))).await;
        }
        let recent = store.list_recent(2).await;
        assert_eq!(recent.iter().map(|a| a.id).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_concurrent_records_get_unique_ids() {
        let store = Arc::new(AlertStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record(draft(&format!("concurrent {}", i))).await.id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_empty_aggregate_stats() {
        let stats = AlertStore::new().aggregate_stats().await;
        assert_eq!(stats.total_uploads, 0);
        assert_eq!(stats.avg_ndvi, 0.0);
    }
}

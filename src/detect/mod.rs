//! Alerting -- alert records, the in-process alert store, and sinks.

pub mod engine;
pub mod sink;
pub mod store;

pub use self::engine::check_analysis_alerts;
pub use self::sink::{AlertSink, JsonlAlertSink};
pub use self::store::{AggregateStats, AlertStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels for alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

/// Subsystem an alert originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertModule {
    Deforestation,
    #[serde(rename = "Flood Monitoring")]
    FloodMonitoring,
}

impl std::fmt::Display for AlertModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertModule::Deforestation => write!(f, "Deforestation"),
            AlertModule::FloodMonitoring => write!(f, "Flood Monitoring"),
        }
    }
}

/// An alert as stored and emitted. Never deleted, only resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub title: String,
    pub severity: Severity,
    pub module: AlertModule,
    pub region: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// Alert contents before the store assigns an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub title: String,
    pub severity: Severity,
    pub module: AlertModule,
    pub region: String,
}

impl NewAlert {
    pub fn new(
        title: impl Into<String>,
        severity: Severity,
        module: AlertModule,
        region: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            severity,
            module,
            region: region.into(),
        }
    }
}

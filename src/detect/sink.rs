//! Alert sinks.
//!
//! The store hands each new alert to an [`AlertSink`]. The bundled
//! [`JsonlAlertSink`] appends one JSON object per line to a file, with
//! writes serialized through a `tokio::sync::Mutex`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::Alert;

/// Receiver for newly created alerts.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, alert: &Alert) -> Result<()>;
}

/// Append-only JSON-lines alert log.
pub struct JsonlAlertSink {
    path: PathBuf,
    writer: Mutex<tokio::fs::File>,
}

impl JsonlAlertSink {
    /// Open (or create) the log at `path` in append mode, creating parent
    /// directories as needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create alert log directory: {}", parent.display()))?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open alert log: {}", path.display()))?;

        debug!(path = %path.display(), "alert log opened");

        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl AlertSink for JsonlAlertSink {
    async fn emit(&self, alert: &Alert) -> Result<()> {
        let mut line = serde_json::to_string(alert).context("failed to serialize alert")?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write alert log: {}", self.path.display()))?;
        writer
            .flush()
            .await
            .with_context(|| format!("failed to flush alert log: {}", self.path.display()))?;
        Ok(())
    }
}

/// Read every alert back from a JSON-lines log, skipping blank lines.
pub async fn read_log(path: &Path) -> Result<Vec<Alert>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read alert log: {}", path.display()))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).context("malformed alert log line"))
        .collect()
}

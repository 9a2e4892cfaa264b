//! Tile sources -- where a monitoring cycle gets its observation.
//!
//! Two implementations: [`SentinelSource`] talks to the Sentinel Hub
//! Process API, [`SimulatedSource`] derives deterministic values from the
//! region name and the current hour. Which one runs is decided once from
//! configuration by [`select_source`].

pub mod auth;
pub mod sentinel;
pub mod simulated;

pub use self::sentinel::SentinelSource;
pub use self::simulated::SimulatedSource;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::regions::Region;
use crate::config::SentinelConfig;

/// Whether an observation came from a real satellite source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileMode {
    Real,
    Simulated,
}

impl std::fmt::Display for TileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileMode::Real => write!(f, "real"),
            TileMode::Simulated => write!(f, "simulated"),
        }
    }
}

/// One observation of a region.
#[derive(Debug, Clone)]
pub struct Tile {
    pub tile_id: String,
    pub region_name: String,
    pub acquired_at: DateTime<Utc>,
    pub mode: TileMode,
    pub cloud_cover: f64,
    /// Encoded multi-band GeoTIFF (B02, B03, B04, B08) for real tiles.
    pub raster: Option<Vec<u8>>,
    /// Precomputed indices: the values of a simulated tile, or the fallback
    /// used when a real raster cannot be processed.
    pub ndvi: Option<f64>,
    pub ndwi: Option<f64>,
}

#[derive(Debug, Error)]
pub enum TileError {
    #[error("no credentials configured for the tile source")]
    NotConfigured,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("tile service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode tile: {0}")]
    Decode(String),
}

impl TileError {
    /// Classify a reqwest failure, keeping timeouts distinct.
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            TileError::Timeout(timeout)
        } else {
            TileError::Transport(e.to_string())
        }
    }
}

/// Provider of tiles for a region.
#[async_trait::async_trait]
pub trait TileSource: Send + Sync {
    /// The mode this source produces when everything works.
    fn mode(&self) -> TileMode;

    async fn fetch(&self, region: &Region) -> Result<Tile, TileError>;
}

/// Sentinel Hub when both client id and secret are set, otherwise the
/// simulator.
pub fn select_source(config: &SentinelConfig) -> Arc<dyn TileSource> {
    match SentinelSource::from_config(config) {
        Ok(source) => {
            info!("tile source: Sentinel Hub (real mode)");
            Arc::new(source)
        }
        Err(e) => {
            info!(reason = %e, "tile source: simulator");
            Arc::new(SimulatedSource::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_selects_simulator() {
        let source = select_source(&SentinelConfig::default());
        assert_eq!(source.mode(), TileMode::Simulated);
    }

    #[test]
    fn test_configured_selects_sentinel() {
        let config = SentinelConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            ..SentinelConfig::default()
        };
        assert_eq!(select_source(&config).mode(), TileMode::Real);
    }

    #[test]
    fn test_partial_credentials_select_simulator() {
        let config = SentinelConfig {
            client_id: "id".into(),
            ..SentinelConfig::default()
        };
        assert_eq!(select_source(&config).mode(), TileMode::Simulated);
    }
}

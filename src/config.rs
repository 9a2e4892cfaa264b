//! TOML configuration for landwatch.
//!
//! Layered: the file named by `LANDWATCH_CONFIG`, then `./landwatch.toml`,
//! then compiled-in defaults. Sentinel Hub credentials may also come from
//! `SENTINEL_CLIENT_ID` / `SENTINEL_CLIENT_SECRET`, which win over the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const CONFIG_ENV: &str = "LANDWATCH_CONFIG";
pub const LOCAL_CONFIG: &str = "landwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub sentinel: SentinelConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(settings)
    }

    /// Resolve configuration from the usual locations and apply credential
    /// overrides from the environment.
    pub fn load_or_default() -> Self {
        let mut settings = Self::from_files();
        settings.apply_credentials(
            std::env::var("SENTINEL_CLIENT_ID").ok(),
            std::env::var("SENTINEL_CLIENT_SECRET").ok(),
        );
        settings
    }

    fn from_files() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "LANDWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Non-empty values replace the configured credentials.
    pub fn apply_credentials(&mut self, client_id: Option<String>, client_secret: Option<String>) {
        if let Some(id) = client_id.filter(|v| !v.is_empty()) {
            self.sentinel.client_id = id;
        }
        if let Some(secret) = client_secret.filter(|v| !v.is_empty()) {
            self.sentinel.client_secret = secret;
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// NDVI below this raises a vegetation stress alert.
    pub ndvi_alert_threshold: f64,
    /// NDWI above this is reported as flood-prone in summaries.
    pub ndwi_flood_threshold: f64,
    /// Minimum deep-model confidence that replaces the pixel label.
    pub deep_override_confidence: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            ndvi_alert_threshold: 0.2,
            ndwi_flood_threshold: 0.3,
            deep_override_confidence: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Sentinel Hub
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub process_url: String,
    pub request_timeout_secs: u64,
    pub token_timeout_secs: u64,
    /// Width and height of the requested tile in pixels.
    pub output_size: u32,
    /// Maximum scene cloud coverage, percent.
    pub max_cloud_coverage: u32,
}

impl SentinelConfig {
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://services.sentinel-hub.com/oauth/token".to_string(),
            process_url: "https://services.sentinel-hub.com/api/v1/process".to_string(),
            request_timeout_secs: 30,
            token_timeout_secs: 15,
            output_size: 512,
            max_cloud_coverage: 30,
        }
    }
}

// Keeps the secret out of logs.
impl std::fmt::Debug for SentinelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentinelConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &if self.client_secret.is_empty() { "" } else { "***" })
            .field("token_url", &self.token_url)
            .field("process_url", &self.process_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_timeout_secs", &self.token_timeout_secs)
            .field("output_size", &self.output_size)
            .field("max_cloud_coverage", &self.max_cloud_coverage)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Hours between full cycles in `watch` mode.
    pub interval_hours: u64,
    /// History entries kept per region, capped at 30.
    pub history_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            history_limit: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// `"text"` or `"json"`.
    pub format: String,
    /// JSON-lines alert log; alerts stay in memory only when unset.
    pub alert_log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            alert_log_path: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = Settings::default();

        assert_eq!(cfg.thresholds.ndvi_alert_threshold, 0.2);
        assert_eq!(cfg.thresholds.ndwi_flood_threshold, 0.3);
        assert_eq!(cfg.thresholds.deep_override_confidence, 0.5);

        assert!(!cfg.sentinel.has_credentials());
        assert_eq!(cfg.sentinel.request_timeout_secs, 30);
        assert_eq!(cfg.sentinel.token_timeout_secs, 15);
        assert_eq!(cfg.sentinel.output_size, 512);
        assert_eq!(cfg.sentinel.max_cloud_coverage, 30);

        assert_eq!(cfg.monitor.interval_hours, 24);
        assert_eq!(cfg.monitor.history_limit, 30);

        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.is_json());
        assert!(cfg.logging.alert_log_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("landwatch.toml");
        std::fs::write(
            &path,
            r#"
[thresholds]
ndvi_alert_threshold = 0.25

[logging]
format = "json"
alert_log_path = "/tmp/alerts.jsonl"
"#,
        )
        .unwrap();

        let cfg = Settings::load(&path).unwrap();
        assert_eq!(cfg.thresholds.ndvi_alert_threshold, 0.25);
        assert_eq!(cfg.thresholds.deep_override_confidence, 0.5);
        assert!(cfg.logging.is_json());
        assert_eq!(cfg.logging.alert_log_path, Some(PathBuf::from("/tmp/alerts.jsonl")));
        assert_eq!(cfg.monitor.history_limit, 30);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[thresholds\nndvi_alert_threshold = ").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_credential_overrides() {
        let mut cfg = Settings::default();
        cfg.sentinel.client_id = "from-file".into();

        cfg.apply_credentials(Some(String::new()), Some("env-secret".into()));
        assert_eq!(cfg.sentinel.client_id, "from-file");
        assert_eq!(cfg.sentinel.client_secret, "env-secret");
        assert!(cfg.sentinel.has_credentials());

        let printed = format!("{:?}", cfg.sentinel);
        assert!(!printed.contains("env-secret"));
    }
}

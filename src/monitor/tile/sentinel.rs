//! Sentinel Hub Process API client.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::auth::TokenCache;
use super::simulated::SimulatedSource;
use super::{Tile, TileError, TileMode, TileSource};
use crate::config::SentinelConfig;
use crate::monitor::regions::Region;

const EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: ["B02", "B03", "B04", "B08"],
    output: { bands: 4, sampleType: "FLOAT32" }
  };
}
function evaluatePixel(sample) {
  return [sample.B02, sample.B03, sample.B04, sample.B08];
}"#;

/// Real-mode tile source. Any failure degrades to a simulated tile.
pub struct SentinelSource {
    client: reqwest::Client,
    auth: TokenCache,
    process_url: String,
    request_timeout: Duration,
    output_size: u32,
    max_cloud_coverage: u32,
    fallback: SimulatedSource,
}

impl SentinelSource {
    /// Build from configuration. Fails with `NotConfigured` unless both
    /// the client id and secret are present.
    pub fn from_config(config: &SentinelConfig) -> Result<Self, TileError> {
        if !config.has_credentials() {
            return Err(TileError::NotConfigured);
        }

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("landwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TileError::Transport(e.to_string()))?;

        let auth = TokenCache::new(
            client.clone(),
            config.token_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            Duration::from_secs(config.token_timeout_secs),
        );

        Ok(Self {
            client,
            auth,
            process_url: config.process_url.clone(),
            request_timeout,
            output_size: config.output_size,
            max_cloud_coverage: config.max_cloud_coverage,
            fallback: SimulatedSource::new(),
        })
    }

    fn process_request(&self, region: &Region) -> Value {
        json!({
            "input": {
                "bounds": {
                    "bbox": region.bbox.to_array(),
                    "properties": { "crs": "http://www.opengis.net/def/crs/EPSG/0/4326" }
                },
                "data": [{
                    "type": "sentinel-2-l2a",
                    "dataFilter": {
                        "maxCloudCoverage": self.max_cloud_coverage,
                        "mosaickingOrder": "leastCC"
                    }
                }]
            },
            "output": {
                "width": self.output_size,
                "height": self.output_size,
                "responses": [{ "identifier": "default", "format": { "type": "image/tiff" } }]
            },
            "evalscript": EVALSCRIPT
        })
    }

    /// Fetch a real tile without fallback.
    pub async fn fetch_real(&self, region: &Region) -> Result<Tile, TileError> {
        let token = self.auth.access_token().await?;

        debug!(region = %region.name, "requesting sentinel tile");
        let response = self
            .client
            .post(&self.process_url)
            .bearer_auth(token)
            .header(ACCEPT, "image/tiff")
            .json(&self.process_request(region))
            .send()
            .await
            .map_err(|e| TileError::from_reqwest(e, self.request_timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
            return Err(TileError::Auth("process API rejected the access token".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TileError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let raster = response
            .bytes()
            .await
            .map_err(|e| TileError::from_reqwest(e, self.request_timeout))?;
        if raster.is_empty() {
            return Err(TileError::Decode("empty response body".to_string()));
        }

        // Simulator values ride along as the fallback if the raster cannot
        // be processed downstream.
        let sim = self.fallback.tile_for(region);
        let acquired_at = Utc::now();

        info!(region = %region.name, bytes = raster.len(), "sentinel tile downloaded");
        Ok(Tile {
            tile_id: format!("S2_REAL_{}_{}", region.slug(), acquired_at.format("%Y%m%d")),
            region_name: region.name.clone(),
            acquired_at,
            mode: TileMode::Real,
            cloud_cover: 0.0,
            raster: Some(raster.to_vec()),
            ndvi: sim.ndvi,
            ndwi: sim.ndwi,
        })
    }
}

#[async_trait::async_trait]
impl TileSource for SentinelSource {
    fn mode(&self) -> TileMode {
        TileMode::Real
    }

    async fn fetch(&self, region: &Region) -> Result<Tile, TileError> {
        match self.fetch_real(region).await {
            Ok(tile) => Ok(tile),
            Err(e) => {
                warn!(region = %region.name, error = %e, "sentinel fetch failed, using simulated tile");
                Ok(self.fallback.tile_for(region))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::regions::default_regions;

    fn unreachable_config() -> SentinelConfig {
        SentinelConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            // Port 9 (discard) on loopback refuses connections.
            token_url: "http://127.0.0.1:9/oauth/token".into(),
            process_url: "http://127.0.0.1:9/api/v1/process".into(),
            request_timeout_secs: 2,
            token_timeout_secs: 2,
            ..SentinelConfig::default()
        }
    }

    #[test]
    fn test_requires_both_credentials() {
        assert!(matches!(
            SentinelSource::from_config(&SentinelConfig::default()),
            Err(TileError::NotConfigured)
        ));
    }

    #[test]
    fn test_process_request_shape() {
        let source = SentinelSource::from_config(&unreachable_config()).unwrap();
        let region = &default_regions()[3];
        let body = source.process_request(region);

        assert_eq!(body["input"]["bounds"]["bbox"], json!([13.0, 12.0, 16.0, 14.0]));
        assert_eq!(body["input"]["data"][0]["type"], "sentinel-2-l2a");
        assert_eq!(body["input"]["data"][0]["dataFilter"]["maxCloudCoverage"], 30);
        assert_eq!(body["output"]["width"], 512);
        assert!(body["evalscript"].as_str().unwrap().contains("B08"));
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let source = SentinelSource::from_config(&unreachable_config()).unwrap();
        let region = &default_regions()[0];

        assert!(source.fetch_real(region).await.is_err());

        let tile = source.fetch(region).await.unwrap();
        assert_eq!(tile.mode, TileMode::Simulated);
        assert!(tile.raster.is_none());
        assert!(tile.ndvi.is_some());
    }
}

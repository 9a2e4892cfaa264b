//! OAuth2 client-credentials token cache for Sentinel Hub.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::TileError;

/// Tokens are refreshed this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const DEFAULT_EXPIRES_IN: u64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

/// Shared access token. The lock is held across a refresh so concurrent
/// callers wait for one token request instead of issuing their own.
pub struct TokenCache {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout,
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, fetching a new one when the cached token is
    /// missing or within the expiry margin.
    pub async fn access_token(&self) -> Result<String, TileError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token, e.g. after the service rejected it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
        debug!("sentinel token invalidated");
    }

    async fn request_token(&self) -> Result<CachedToken, TileError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TileError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TileError::Auth(format!("token endpoint returned {}: {}", status.as_u16(), body)));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| TileError::Auth(format!("malformed token response: {}", e)))?;

        info!(expires_in = parsed.expires_in, "sentinel access token acquired");
        Ok(CachedToken {
            value: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_margin() {
        let now = Instant::now();
        let token = CachedToken {
            value: "t".into(),
            expires_at: now + Duration::from_secs(61),
        };
        assert!(token.is_fresh(now));

        let stale = CachedToken {
            value: "t".into(),
            expires_at: now + Duration::from_secs(59),
        };
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn test_expires_in_defaults() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(parsed.expires_in, DEFAULT_EXPIRES_IN);
        assert_eq!(parsed.access_token, "abc");
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let cache = TokenCache::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/oauth/token",
            "id",
            "secret",
            Duration::from_millis(200),
        );
        *cache.cached.lock().await = Some(CachedToken {
            value: "cached".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        });
        assert_eq!(cache.access_token().await.unwrap(), "cached");

        cache.invalidate().await;
        assert!(cache.cached.lock().await.is_none());
    }
}

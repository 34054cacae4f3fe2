//! Typed access to the external analytics service.
//!
//! These endpoints return largely static or mocked payloads (portfolio
//! summaries, "ML" signal fixtures). They are consumed strictly as a
//! fallback/display data source: nothing in the computed indicator → signal
//! → risk path reads them, and the in-process `Signal`/`RiskProfile` types
//! supersede them whenever the real computation path is active.

use crate::domain::ports::RefreshTask;
use crate::infrastructure::core::http_client_factory::retrying_client;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::sync::RwLock;
use tracing::debug;

/// Envelope common to every analytics endpoint:
/// `{"success": bool, "data": {...}}`.
#[derive(Debug, Deserialize)]
struct AnalyticsEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// A signal as reported by the remote service's fixture endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSignal {
    pub symbol: String,
    pub signal_type: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Clone)]
pub struct AnalyticsClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl AnalyticsClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: retrying_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one endpoint's `data` payload, verifying the envelope.
    pub async fn fetch(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch analytics endpoint {}", path))?;
        if !response.status().is_success() {
            anyhow::bail!("analytics endpoint {} returned {}", path, response.status());
        }

        let envelope: AnalyticsEnvelope = response
            .json()
            .await
            .with_context(|| format!("failed to parse analytics envelope from {}", path))?;
        anyhow::ensure!(envelope.success, "analytics endpoint {} reported failure", path);
        Ok(envelope.data.unwrap_or(serde_json::Value::Null))
    }
}

/// Extract the `current_signals` list from a signals-endpoint payload.
pub fn parse_current_signals(data: &serde_json::Value) -> Vec<RemoteSignal> {
    data.get("current_signals")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// One analytics endpoint kept fresh by the refresh scheduler, latest
/// payload cached for readers.
pub struct CachedEndpoint {
    client: AnalyticsClient,
    path: &'static str,
    last: RwLock<Option<serde_json::Value>>,
}

impl CachedEndpoint {
    pub fn new(client: AnalyticsClient, path: &'static str) -> Self {
        Self {
            client,
            path,
            last: RwLock::new(None),
        }
    }

    pub fn latest(&self) -> Option<serde_json::Value> {
        self.last.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl RefreshTask for CachedEndpoint {
    async fn refresh(&self) -> Result<()> {
        let data = self.client.fetch(self.path).await?;
        debug!("CachedEndpoint: refreshed {}", self.path);
        *self.last.write().unwrap_or_else(|e| e.into_inner()) = Some(data);
        Ok(())
    }
}

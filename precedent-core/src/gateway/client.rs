//! Bedrock-style model gateway: validates a model id and region, lazily
//! constructs one HTTP client per region, and exposes a single `request`
//! operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::gateway::types::{GatewayRequest, GatewayResponse, StopReason, TokenUsage};

/// Recognised model ids. The gateway only knows how to resolve these;
/// anything else is a config_missing error rather than a silent pass-through.
fn known_model_ids() -> &'static [&'static str] {
    &[
        "anthropic.claude-3-5-sonnet",
        "anthropic.claude-3-haiku",
        "google.gemini-1.5-pro",
        "google.gemini-1.5-flash",
    ]
}

/// One region's backend connection. Construction is deferred until the
/// first request addressed to that region, mirroring the teacher's
/// `MultiProviderClient` lazy-provider map.
#[async_trait]
pub trait RegionClient: Send + Sync {
    async fn complete(&self, req: &GatewayRequest) -> Result<GatewayResponse>;
}

/// Minimal reqwest-backed region client. The wire format here is a
/// generic "messages" completion call; provider-specific framing is an
/// explicit Non-goal (spec §1) so this stays deliberately thin.
pub struct HttpRegionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRegionClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::network(format!("building gateway http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl RegionClient for HttpRegionClient {
    async fn complete(&self, req: &GatewayRequest) -> Result<GatewayResponse> {
        let body = serde_json::json!({
            "model": req.model_id,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "system": req.system,
            "messages": [{"role": "user", "content": req.prompt}],
            "response_schema": req.output_schema,
        });

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::network(format!("gateway request failed: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(Error::rate_limited("gateway", retry_after));
        }
        if !status.is_success() {
            return Err(Error::reasoner_error(
                "gateway_call",
                format!("gateway returned status {status}"),
            ));
        }

        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::network(format!("decoding gateway response: {e}")))?;

        let text = parsed["content"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let stop_reason = match parsed["stop_reason"].as_str() {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("end_turn") => StopReason::EndTurn,
            _ => StopReason::Other,
        };
        let usage = TokenUsage {
            input_tokens: parsed["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: parsed["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(GatewayResponse {
            text,
            usage,
            stop_reason,
        })
    }
}

/// Per-region credentials/endpoint, supplied by configuration.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub region: String,
    pub base_url: String,
    pub api_key: String,
}

/// The gateway itself: validates (model_id, region), resolves a
/// `RegionClient` lazily, and exposes `request`.
pub struct ModelGateway {
    regions: HashMap<String, RegionConfig>,
    default_region: String,
    clients: RwLock<HashMap<String, Arc<dyn RegionClient>>>,
}

impl ModelGateway {
    pub fn new(regions: Vec<RegionConfig>, default_region: impl Into<String>) -> Self {
        let regions = regions.into_iter().map(|r| (r.region.clone(), r)).collect();
        Self {
            regions,
            default_region: default_region.into(),
            clients: RwLock::new(HashMap::new()),
        }
    }

    fn resolve_region(&self, requested: Option<&str>) -> Result<&RegionConfig> {
        let region = requested.unwrap_or(&self.default_region);
        self.regions
            .get(region)
            .ok_or_else(|| Error::config_missing(format!("no gateway region configured for '{region}'")))
    }

    fn validate_model_id(model_id: &str) -> Result<()> {
        if known_model_ids().contains(&model_id) {
            Ok(())
        } else {
            Err(Error::config_missing(format!("unrecognised model id '{model_id}'")))
        }
    }

    async fn client_for(&self, region_cfg: &RegionConfig) -> Result<Arc<dyn RegionClient>> {
        if let Some(existing) = self.clients.read().await.get(&region_cfg.region) {
            return Ok(existing.clone());
        }
        let mut clients = self.clients.write().await;
        if let Some(existing) = clients.get(&region_cfg.region) {
            return Ok(existing.clone());
        }
        let client: Arc<dyn RegionClient> = Arc::new(HttpRegionClient::new(
            region_cfg.base_url.clone(),
            region_cfg.api_key.clone(),
        )?);
        clients.insert(region_cfg.region.clone(), client.clone());
        Ok(client)
    }

    /// The gateway's single operation: validate, resolve, lazily
    /// construct the region client, and request.
    #[tracing::instrument(skip(self, req), fields(model_id = %req.model_id))]
    pub async fn request(&self, req: GatewayRequest) -> Result<GatewayResponse> {
        Self::validate_model_id(&req.model_id)?;
        let region_cfg = self.resolve_region(req.region.as_deref())?;
        let client = self.client_for(region_cfg).await?;
        client.complete(&req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> ModelGateway {
        ModelGateway::new(
            vec![RegionConfig {
                region: "ap-south-1".into(),
                base_url: "https://example.invalid".into(),
                api_key: "test-key".into(),
            }],
            "ap-south-1",
        )
    }

    #[test]
    fn rejects_unknown_model_id() {
        assert!(ModelGateway::validate_model_id("not-a-real-model").is_err());
        assert!(ModelGateway::validate_model_id("anthropic.claude-3-5-sonnet").is_ok());
    }

    #[tokio::test]
    async fn resolves_default_region_when_none_requested() {
        let gw = gateway();
        let cfg = gw.resolve_region(None).unwrap();
        assert_eq!(cfg.region, "ap-south-1");
    }

    #[tokio::test]
    async fn missing_region_is_config_missing() {
        let gw = gateway();
        let err = gw.resolve_region(Some("eu-west-1")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigMissing);
    }
}

//! Wire types for the model gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A prompt plus optional structured-output schema request.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayRequest {
    pub model_id: String,
    pub region: Option<String>,
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// When set, the gateway asks the backend for strict-JSON output
    /// conforming to this schema (when the backend supports it).
    pub output_schema: Option<Value>,
}

impl GatewayRequest {
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            region: None,
            prompt: prompt.into(),
            system: None,
            max_tokens: 2048,
            temperature: 0.0,
            output_schema: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Strip the schema request, used on the "unsupported output config"
    /// retry path (spec §4.4 step "Call").
    pub fn without_schema(mut self) -> Self {
        self.output_schema = None;
        self
    }
}

/// Text plus usage telemetry, the gateway's sole return shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    Other,
}

/// A resolved (model, region) pair. Region defaults apply when the
/// request or configuration does not override one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub model_id: String,
    pub region: String,
}

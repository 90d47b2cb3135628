//! Bedrock-style model gateway (spec §4, "Bedrock-style model gateway").
//!
//! Validates and resolves a model identifier and a region, lazily
//! constructs one per-region model client, and exposes one request
//! operation that accepts a prompt plus optional structured-output
//! schema and returns text plus usage telemetry. Grounded on the
//! per-provider client map in `llm::client::MultiProviderClient`.

mod client;
mod types;

pub use client::{HttpRegionClient, ModelGateway, RegionClient, RegionConfig};
pub use types::{GatewayRequest, GatewayResponse, ModelKey, StopReason, TokenUsage};

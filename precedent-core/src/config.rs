//! One immutable configuration struct consolidating every recognised
//! knob (spec §9 design note: "consolidate into one immutable
//! configuration struct"), grouped the way spec §6 groups the
//! configuration envelope.

use std::env;
use std::time::Duration;

/// Model selection and the gateway's retry/compaction behaviour.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_id: String,
    pub region: Option<String>,
    pub fallback_model_id: Option<String>,
    pub reasoner_mode: ReasonerMode,
    pub request_timeout: Duration,
    pub max_output_tokens: u32,
    pub compact_prompts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonerMode {
    On,
    Deterministic,
}

/// Reasoner governance: budgets, cache TTLs, circuit breaker, rate
/// limiting, concurrency, and lock wait (spec §6, §4.4, §5).
#[derive(Debug, Clone)]
pub struct ReasonerGovernance {
    pub max_calls_per_request: u32,
    pub pass1_cache_ttl: Duration,
    pub pass2_cache_ttl: Duration,
    pub circuit_fail_threshold: u32,
    pub circuit_cooldown: Duration,
    pub global_rate_limit: u32,
    pub global_rate_window: Duration,
    pub max_inflight: usize,
    pub lock_wait_attempts: u32,
    pub lock_wait_interval: Duration,
}

/// Retrieval provider behaviour (spec §6, §4.6, §4.7, §4.8).
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub provider_timeout: Duration,
    pub max_429_retries: u32,
    pub max_retry_after: Duration,
    pub cooldown_duration: Duration,
    pub detail_concurrency: usize,
    pub detail_cache_ttl: Duration,
    pub docmeta_top_n: usize,
    pub docmeta_concurrency: usize,
    pub hybrid_enabled: bool,
    pub hybrid_shadow_capture: bool,
    pub hybrid_shadow_timeout: Duration,
    pub rerank_top_n: usize,
    pub verify_limit: usize,
    pub min_snippets: usize,
    pub hybrid_fallback_cutoff: usize,
    pub snippet_fallback_cutoff: usize,
}

/// Feature flags. Each gates an entire code path rather than a minor
/// tweak, per spec §6.
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    pub proposition_v5: bool,
    pub intent_v2: bool,
    pub structured_query_v2: bool,
    pub category_expansion_v1: bool,
    pub docmeta_enrich_v1: bool,
    pub serper_query_v2: bool,
    pub always_return_v1: bool,
    pub stale_fallback: bool,
}

/// The full, immutable pipeline configuration. Built once per process by
/// [`PipelineConfig::load`] and shared behind an `Arc` thereafter.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    pub reasoner: ReasonerGovernance,
    pub retrieval: RetrievalConfig,
    pub flags: FeatureFlags,
    pub exploratory_confidence_cap: f64,
    pub max_per_fingerprint: usize,
    pub max_per_court_day: usize,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl PipelineConfig {
    /// Load defaults, then apply environment overrides. Called once per
    /// process; downstream code receives a shared reference.
    pub fn load() -> Self {
        let reasoner_mode = match env_or("REASONER_MODE", "on").as_str() {
            "deterministic" => ReasonerMode::Deterministic,
            _ => ReasonerMode::On,
        };

        Self {
            model: ModelConfig {
                model_id: env_or("GATEWAY_MODEL_ID", "anthropic.claude-3-5-sonnet"),
                region: env::var("GATEWAY_REGION").ok(),
                fallback_model_id: env::var("GATEWAY_FALLBACK_MODEL_ID").ok(),
                reasoner_mode,
                request_timeout: Duration::from_millis(env_u64("GATEWAY_TIMEOUT_MS", 20_000)),
                max_output_tokens: env_u64("GATEWAY_MAX_TOKENS", 2048) as u32,
                compact_prompts: env_bool("GATEWAY_COMPACT_PROMPTS", true),
            },
            reasoner: ReasonerGovernance {
                max_calls_per_request: env_u64("LLM_REASONER_MAX_CALLS", 2) as u32,
                pass1_cache_ttl: Duration::from_secs(env_u64("REASONER_PASS1_TTL_SEC", 6 * 3600)),
                pass2_cache_ttl: Duration::from_secs(env_u64("REASONER_PASS2_TTL_SEC", 15 * 60)),
                circuit_fail_threshold: env_u64("CIRCUIT_FAIL_THRESHOLD", 5) as u32,
                circuit_cooldown: Duration::from_millis(env_u64("CIRCUIT_COOLDOWN_MS", 120_000)),
                global_rate_limit: env_u64("LLM_REASONER_RATE_LIMIT", 60) as u32,
                global_rate_window: Duration::from_secs(env_u64("LLM_REASONER_RATE_WINDOW_SEC", 60)),
                max_inflight: env_u64("LLM_REASONER_MAX_INFLIGHT", 4) as usize,
                lock_wait_attempts: env_u64("REASONER_LOCK_WAIT_ATTEMPTS", 5) as u32,
                lock_wait_interval: Duration::from_millis(env_u64("REASONER_LOCK_WAIT_INTERVAL_MS", 200)),
            },
            retrieval: RetrievalConfig {
                provider_timeout: Duration::from_millis(env_u64("PROVIDER_TIMEOUT_MS", 8_000)),
                max_429_retries: env_u64("MAX_429_RETRIES", 2) as u32,
                max_retry_after: Duration::from_secs(env_u64("MAX_RETRY_AFTER_SEC", 30)),
                cooldown_duration: Duration::from_secs(env_u64("PROVIDER_COOLDOWN_SEC", 60)),
                detail_concurrency: env_u64("DETAIL_CONCURRENCY", 4) as usize,
                detail_cache_ttl: Duration::from_secs(env_u64("DETAIL_CACHE_TTL_SEC", 300)),
                docmeta_top_n: env_u64("DOCMETA_TOP_N", 10) as usize,
                docmeta_concurrency: env_u64("DOCMETA_CONCURRENCY", 4) as usize,
                hybrid_enabled: env_bool("HYBRID_ENABLED", false),
                hybrid_shadow_capture: env_bool("HYBRID_SHADOW_CAPTURE", false),
                hybrid_shadow_timeout: Duration::from_millis(env_u64("HYBRID_SHADOW_TIMEOUT_MS", 2_000)),
                rerank_top_n: env_u64("RERANK_TOP_N", 20) as usize,
                verify_limit: env_u64("DEFAULT_VERIFY_LIMIT", 20) as usize,
                min_snippets: env_u64("MIN_SNIPPETS", 2) as usize,
                hybrid_fallback_cutoff: env_u64("HYBRID_FALLBACK_CUTOFF", 10) as usize,
                snippet_fallback_cutoff: env_u64("SNIPPET_FALLBACK_CUTOFF", 15) as usize,
            },
            flags: FeatureFlags {
                proposition_v5: env_bool("FLAG_PROPOSITION_V5", true),
                intent_v2: env_bool("FLAG_INTENT_V2", true),
                structured_query_v2: env_bool("FLAG_STRUCTURED_QUERY_V2", true),
                category_expansion_v1: env_bool("FLAG_CATEGORY_EXPANSION_V1", true),
                docmeta_enrich_v1: env_bool("FLAG_DOCMETA_ENRICH_V1", true),
                serper_query_v2: env_bool("FLAG_SERPER_QUERY_V2", true),
                always_return_v1: env_bool("FLAG_ALWAYS_RETURN_V1", true),
                stale_fallback: env_bool("FLAG_STALE_FALLBACK", true),
            },
            exploratory_confidence_cap: env_or("EXPLORATORY_CONFIDENCE_CAP", "0.55")
                .parse()
                .unwrap_or(0.55),
            max_per_fingerprint: env_u64("MAX_PER_FINGERPRINT", 2) as usize,
            max_per_court_day: env_u64("MAX_PER_COURT_DAY", 3) as usize,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = PipelineConfig::load();
        assert!(cfg.reasoner.max_inflight > 0);
        assert!(cfg.retrieval.verify_limit > 0);
        assert!(cfg.exploratory_confidence_cap > 0.0 && cfg.exploratory_confidence_cap < 1.0);
    }
}

//! Retrieval providers (spec §4.6): a uniform interface over a lexical
//! JSON API, an HTML scraper, and a web-search bypass/fallback.

pub mod html;
pub mod lexical;
pub mod websearch;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{CaseCandidate, QueryVariant};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedKind {
    LocalCooldown,
    CloudflareChallenge,
    RateLimit,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderDebug {
    pub compiled_query: String,
    pub http_status: Option<u16>,
    pub parser_mode: Option<&'static str>,
    pub pages_scanned: u32,
    pub raw_count: u32,
    pub parsed_count: u32,
    pub cloudflare: bool,
    pub no_match: bool,
    pub rate_limited: bool,
    pub retry_after_hint: Option<u64>,
    pub timed_out: bool,
    pub fetch_timeout_used: Duration,
    pub source_tag: String,
    pub blocked_kind: Option<BlockedKind>,
}

#[derive(Debug, Clone)]
pub struct SearchOutput {
    pub cases: Vec<CaseCandidate>,
    pub debug: ProviderDebug,
}

#[derive(Debug, Clone)]
pub struct SearchInput<'a> {
    pub variant: &'a QueryVariant,
    pub max_results: usize,
}

#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    fn source_tag(&self) -> &'static str;
    async fn search(&self, input: SearchInput<'_>) -> Result<SearchOutput>;
}

/// Per-scope cooldown map mutated by many concurrent tasks, guarded by
/// a single `RwLock` (spec §5, §9 design note: "expose as a typed
/// struct with explicit mutual-exclusion discipline").
#[derive(Default)]
pub struct CooldownMap {
    inner: RwLock<HashMap<String, Instant>>,
}

impl CooldownMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_cooling_down(&self, scope: &str) -> bool {
        self.inner
            .read()
            .await
            .get(scope)
            .is_some_and(|until| *until > Instant::now())
    }

    pub async fn set_cooldown(&self, scope: &str, duration: Duration) {
        self.inner.write().await.insert(scope.to_string(), Instant::now() + duration);
    }
}

pub type SharedCooldownMap = Arc<CooldownMap>;

/// The `ANDD`/`ORR`/`NOTT` structured query compiler for the lexical
/// provider (spec §4.6, §6). Bounded must-haves, optional `ORR` block
/// for expansion, `ANDD NOTT` exclusions only in precision with >=2
/// must-haves (spec §4.6).
pub fn compile_structured_query(
    base_phrase: &str,
    must_haves: &[String],
    expansion_terms: &[String],
    exclusions: &[String],
    precision: bool,
) -> String {
    let mut query = base_phrase.to_string();

    let bounded_must_haves: Vec<&String> = must_haves.iter().take(4).collect();
    for term in &bounded_must_haves {
        query.push_str(&format!(" ANDD \"{term}\""));
    }

    if !expansion_terms.is_empty() {
        let orr_block = expansion_terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" ORR ");
        query.push_str(&format!(" ORR ({orr_block})"));
    }

    if precision && bounded_must_haves.len() >= 2 {
        for term in exclusions {
            query.push_str(&format!(" ANDD NOTT \"{term}\""));
        }
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cooldown_map_reports_active_cooldown() {
        let map = CooldownMap::new();
        assert!(!map.is_cooling_down("indiankanoon").await);
        map.set_cooldown("indiankanoon", Duration::from_millis(50)).await;
        assert!(map.is_cooling_down("indiankanoon").await);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!map.is_cooling_down("indiankanoon").await);
    }

    #[test]
    fn exclusions_only_apply_in_precision_with_two_must_haves() {
        let query = compile_structured_query(
            "state appeal",
            &["section 197".into(), "section 19".into()],
            &[],
            &["condoned".into()],
            true,
        );
        assert!(query.contains("ANDD NOTT \"condoned\""));

        let expansion_query = compile_structured_query(
            "state appeal",
            &["section 197".into()],
            &["broad term".into()],
            &["condoned".into()],
            false,
        );
        assert!(!expansion_query.contains("NOTT"));
        assert!(expansion_query.contains("ORR"));
    }
}

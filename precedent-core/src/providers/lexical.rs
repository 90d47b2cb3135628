//! Lexical JSON API provider (spec §4.6).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::domain::{CaseCandidate, Classification, Court, RetrievalMeta};
use crate::error::{Error, Result};
use crate::providers::{compile_structured_query, BlockedKind, ProviderDebug, RetrievalProvider, SearchInput, SearchOutput, SharedCooldownMap};

pub struct LexicalApiProvider {
    http: reqwest::Client,
    base_url: String,
    cooldowns: SharedCooldownMap,
    enrich_concurrency: usize,
    enrich_top_n: usize,
    fetch_timeout: Duration,
}

impl LexicalApiProvider {
    pub fn new(
        base_url: impl Into<String>,
        cooldowns: SharedCooldownMap,
        enrich_concurrency: usize,
        enrich_top_n: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            cooldowns,
            enrich_concurrency,
            enrich_top_n,
            fetch_timeout,
        }
    }

    fn looks_like_judgment(title: &str) -> bool {
        let lower = title.to_lowercase();
        !(lower.contains(" act, ") || lower.contains("the constitution") || lower.ends_with("rules"))
    }

    /// Fetch `/docfragment` (detail text) and `/docmeta` (author, bench,
    /// court, citation count) for the top `enrich_top_n` candidates and
    /// merge the parsed fields back in, bounded by `enrich_concurrency`
    /// (spec §4.6).
    async fn enrich(&self, candidates: &mut [CaseCandidate]) {
        let semaphore = Arc::new(Semaphore::new(self.enrich_concurrency));
        let n = self.enrich_top_n.min(candidates.len());
        let tasks = candidates[..n].iter().map(|c| {
            let semaphore = semaphore.clone();
            let fragment_url = format!("{}/docfragment?doc={}", self.base_url, c.url);
            let meta_url = format!("{}/docmeta?doc={}", self.base_url, c.url);
            let http = self.http.clone();
            let timeout = self.fetch_timeout;
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                let (fragment, meta) = tokio::join!(
                    Self::fetch_json(&http, &fragment_url, timeout),
                    Self::fetch_json(&http, &meta_url, timeout),
                );
                Some((fragment, meta))
            }
        });

        let results = join_all(tasks).await;
        for (candidate, outcome) in candidates[..n].iter_mut().zip(results) {
            let Some((fragment, meta)) = outcome else { continue };
            if let Some(body) = fragment {
                Self::merge_fragment(candidate, &body);
            }
            if let Some(body) = meta {
                Self::merge_meta(candidate, &body);
            }
        }
    }

    async fn fetch_json(http: &reqwest::Client, url: &str, timeout: Duration) -> Option<serde_json::Value> {
        let resp = tokio::time::timeout(timeout, http.get(url).send()).await.ok()?.ok()?;
        resp.json::<serde_json::Value>().await.ok()
    }

    fn merge_fragment(candidate: &mut CaseCandidate, body: &serde_json::Value) {
        if let Some(text) = body["fragment"].as_str() {
            candidate.detail_text = Some(text.to_string());
        }
        if let Some(full_url) = body["full_document_url"].as_str() {
            candidate.full_document_url = Some(full_url.to_string());
        }
    }

    fn merge_meta(candidate: &mut CaseCandidate, body: &serde_json::Value) {
        if let Some(author) = body["author"].as_str() {
            candidate.author = Some(author.to_string());
        }
        if let Some(bench) = body["bench"].as_str() {
            candidate.bench = Some(bench.to_string());
        }
        if let Some(court_text) = body["court_text"].as_str() {
            candidate.court_text = Some(court_text.to_string());
        }
        if let Some(count) = body["cited_by_count"].as_u64() {
            candidate.cited_by_count = Some(count as u32);
        }
    }
}

#[async_trait]
impl RetrievalProvider for LexicalApiProvider {
    fn source_tag(&self) -> &'static str {
        "lexical_api"
    }

    async fn search(&self, input: SearchInput<'_>) -> Result<SearchOutput> {
        let scope = self.source_tag();
        if self.cooldowns.is_cooling_down(scope).await {
            return Err(Error::rate_limited(scope, None));
        }

        let query = compile_structured_query(
            &input.variant.phrase,
            &input.variant.must_include_tokens,
            &[],
            &input.variant.must_exclude_tokens,
            matches!(
                input.variant.retrieval_directives.query_mode,
                Some(crate::domain::variant::QueryMode::Precision)
            ),
        );

        let started = Instant::now();
        let resp = tokio::time::timeout(
            self.fetch_timeout,
            self.http.get(format!("{}/search", self.base_url)).query(&[("q", &query)]).send(),
        )
        .await;

        let mut debug = ProviderDebug {
            compiled_query: query,
            source_tag: scope.to_string(),
            fetch_timeout_used: self.fetch_timeout,
            ..Default::default()
        };

        let resp = match resp {
            Err(_) => {
                debug.timed_out = true;
                return Ok(SearchOutput { cases: vec![], debug });
            }
            Ok(r) => r,
        };
        let resp = resp.map_err(|e| Error::network(e.to_string()))?;
        debug.http_status = Some(resp.status().as_u16());

        if resp.status().as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            self.cooldowns
                .set_cooldown(scope, Duration::from_secs(retry_after.unwrap_or(60)))
                .await;
            debug.rate_limited = true;
            debug.retry_after_hint = retry_after;
            debug.blocked_kind = Some(BlockedKind::RateLimit);
            return Err(Error::rate_limited(scope, retry_after));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| Error::network(e.to_string()))?;
        let rows = body["results"].as_array().cloned().unwrap_or_default();
        debug.raw_count = rows.len() as u32;

        let mut cases: Vec<CaseCandidate> = rows
            .into_iter()
            .filter_map(|row| {
                let title = row["title"].as_str()?.to_string();
                if !Self::looks_like_judgment(&title) {
                    return None;
                }
                Some(CaseCandidate {
                    source: scope.to_string(),
                    title,
                    url: row["url"].as_str().unwrap_or_default().to_string(),
                    snippet: row["snippet"].as_str().unwrap_or_default().to_string(),
                    court: Court::Unknown,
                    court_text: None,
                    cites_count: row["citedbys"].as_u64().map(|n| n as u32),
                    cited_by_count: None,
                    author: row["author"].as_str().map(str::to_string),
                    bench: row["bench"].as_str().map(str::to_string),
                    full_document_url: None,
                    detail_text: None,
                    detail_artifact: None,
                    evidence_quality: None,
                    detail_hydration: None,
                    classification: Some(Classification::Case),
                    retrieval: RetrievalMeta {
                        source_tags: vec![scope.to_string()],
                        ..Default::default()
                    },
                })
            })
            .take(input.max_results)
            .collect();

        debug.parsed_count = cases.len() as u32;
        self.enrich(&mut cases).await;
        let _ = started.elapsed();

        Ok(SearchOutput { cases, debug })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_statute_and_rules_titles() {
        assert!(!LexicalApiProvider::looks_like_judgment("The Prevention of Corruption Act, 1988"));
        assert!(!LexicalApiProvider::looks_like_judgment("The Constitution of India"));
        assert!(!LexicalApiProvider::looks_like_judgment("Criminal Procedure Rules"));
        assert!(LexicalApiProvider::looks_like_judgment("State vs Accused"));
    }

    fn blank_candidate() -> CaseCandidate {
        CaseCandidate {
            source: "lexical_api".into(),
            title: "State vs Accused".into(),
            url: "http://example/doc/1".into(),
            snippet: String::new(),
            court: Court::Unknown,
            court_text: None,
            cites_count: None,
            cited_by_count: None,
            author: None,
            bench: None,
            full_document_url: None,
            detail_text: None,
            detail_artifact: None,
            evidence_quality: None,
            detail_hydration: None,
            classification: Some(Classification::Case),
            retrieval: RetrievalMeta::default(),
        }
    }

    #[test]
    fn merge_fragment_fills_detail_text_and_full_url() {
        let mut candidate = blank_candidate();
        let body = serde_json::json!({
            "fragment": "the appellant's sanction was held valid",
            "full_document_url": "http://example/doc/1/full",
        });
        LexicalApiProvider::merge_fragment(&mut candidate, &body);
        assert_eq!(candidate.detail_text.as_deref(), Some("the appellant's sanction was held valid"));
        assert_eq!(candidate.full_document_url.as_deref(), Some("http://example/doc/1/full"));
    }

    #[test]
    fn merge_meta_fills_author_bench_and_citation_count() {
        let mut candidate = blank_candidate();
        let body = serde_json::json!({
            "author": "J. Rao",
            "bench": "division bench",
            "court_text": "High Court of Delhi",
            "cited_by_count": 7,
        });
        LexicalApiProvider::merge_meta(&mut candidate, &body);
        assert_eq!(candidate.author.as_deref(), Some("J. Rao"));
        assert_eq!(candidate.bench.as_deref(), Some("division bench"));
        assert_eq!(candidate.court_text.as_deref(), Some("High Court of Delhi"));
        assert_eq!(candidate.cited_by_count, Some(7));
    }

    #[test]
    fn merge_helpers_leave_candidate_untouched_on_missing_fields() {
        let mut candidate = blank_candidate();
        LexicalApiProvider::merge_fragment(&mut candidate, &serde_json::json!({}));
        LexicalApiProvider::merge_meta(&mut candidate, &serde_json::json!({}));
        assert!(candidate.detail_text.is_none());
        assert!(candidate.author.is_none());
    }

    #[tokio::test]
    async fn search_returns_rate_limited_error_while_cooling_down() {
        let cooldowns = Arc::new(crate::providers::CooldownMap::new());
        cooldowns.set_cooldown("lexical_api", Duration::from_secs(30)).await;
        let provider = LexicalApiProvider::new("http://localhost:0", cooldowns, 2, 5, Duration::from_millis(50));

        let variant = crate::domain::variant::QueryVariant {
            id: "v1".into(),
            phrase: "state appeal".into(),
            phase: crate::domain::variant::Phase::Primary,
            purpose: "test".into(),
            court_scope: crate::domain::canonical::CourtScope::Any,
            strictness: crate::domain::variant::Strictness::Strict,
            tokens: vec![],
            canonical_key: "k".into(),
            priority: 0,
            must_include_tokens: vec![],
            must_exclude_tokens: vec![],
            provider_hints: vec![],
            retrieval_directives: crate::domain::variant::RetrievalDirectives::default(),
        };
        let input = SearchInput { variant: &variant, max_results: 10 };
        let err = provider.search(input).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RateLimited);
    }
}

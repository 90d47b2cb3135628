//! Site-restricted web-search bypass/fallback provider (spec §4.6).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::Cache;
use crate::domain::variant::QueryMode;
use crate::domain::{CaseCandidate, Classification, Court, RetrievalMeta};
use crate::error::{Error, Result};
use crate::providers::{BlockedKind, ProviderDebug, RetrievalProvider, SearchInput, SearchOutput, SharedCooldownMap};

const CACHE_TTL_SECS: u64 = 600;

/// Builds the site-restricted query: quoted phrase, up to 4 must-have
/// terms quoted individually, and `-term` exclusions (spec §4.6).
fn build_query(site: &str, phrase: &str, must_haves: &[String], exclusions: &[String]) -> String {
    let mut query = format!("site:{site} \"{phrase}\"");
    for term in must_haves.iter().take(4) {
        query.push_str(&format!(" \"{term}\""));
    }
    for term in exclusions {
        query.push_str(&format!(" -{term}"));
    }
    query
}

/// Drops quoting and exclusions, keeping only the core terms (spec
/// §4.6: "relax and retry once on zero results in context/expansion
/// modes").
fn relax_query(site: &str, phrase: &str) -> String {
    format!("site:{site} {phrase}")
}

pub struct WebSearchProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    site: String,
    cooldowns: SharedCooldownMap,
    cache: Arc<Cache>,
    fetch_timeout: Duration,
}

impl WebSearchProvider {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        site: impl Into<String>,
        cooldowns: SharedCooldownMap,
        cache: Arc<Cache>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            site: site.into(),
            cooldowns,
            cache,
            fetch_timeout,
        }
    }

    fn cache_key(query: &str) -> String {
        format!("websearch:query:v1:{query}")
    }

    async fn run_query(&self, query: &str) -> Result<(Vec<CaseCandidate>, ProviderDebug)> {
        let mut debug = ProviderDebug {
            compiled_query: query.to_string(),
            source_tag: self.source_tag().to_string(),
            fetch_timeout_used: self.fetch_timeout,
            ..Default::default()
        };

        let resp = match tokio::time::timeout(
            self.fetch_timeout,
            self.http
                .get(&self.api_url)
                .bearer_auth(&self.api_key)
                .query(&[("q", query)])
                .send(),
        )
        .await
        {
            Err(_) => {
                debug.timed_out = true;
                return Ok((vec![], debug));
            }
            Ok(r) => r.map_err(|e| Error::network(e.to_string()))?,
        };

        debug.http_status = Some(resp.status().as_u16());
        if resp.status().as_u16() == 429 {
            self.cooldowns.set_cooldown(self.source_tag(), Duration::from_secs(60)).await;
            debug.rate_limited = true;
            debug.blocked_kind = Some(BlockedKind::RateLimit);
            return Err(Error::rate_limited(self.source_tag(), None));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| Error::network(e.to_string()))?;
        let organic = body["organic"].as_array().cloned().unwrap_or_default();
        debug.raw_count = organic.len() as u32;

        let mut seen = std::collections::HashSet::new();
        let cases: Vec<CaseCandidate> = organic
            .into_iter()
            .filter_map(|row| {
                let url = row["link"].as_str()?.to_string();
                if !seen.insert(url.clone()) {
                    return None;
                }
                Some(CaseCandidate {
                    source: self.source_tag().to_string(),
                    title: row["title"].as_str().unwrap_or_default().to_string(),
                    url,
                    snippet: row["snippet"].as_str().unwrap_or_default().to_string(),
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
                    retrieval: RetrievalMeta {
                        source_tags: vec![self.source_tag().to_string()],
                        ..Default::default()
                    },
                })
            })
            .collect();

        debug.parsed_count = cases.len() as u32;
        Ok((cases, debug))
    }
}

#[async_trait]
impl RetrievalProvider for WebSearchProvider {
    fn source_tag(&self) -> &'static str {
        "web_search"
    }

    async fn search(&self, input: SearchInput<'_>) -> Result<SearchOutput> {
        let scope = self.source_tag();
        if self.cooldowns.is_cooling_down(scope).await {
            return Err(Error::rate_limited(scope, None));
        }

        let query = build_query(
            &self.site,
            &input.variant.phrase,
            &input.variant.must_include_tokens,
            &input.variant.must_exclude_tokens,
        );

        if let Some(cached) = self.cache.get_value::<Vec<CaseCandidate>>(&Self::cache_key(&query)).await {
            let mut debug = ProviderDebug {
                compiled_query: query,
                source_tag: scope.to_string(),
                fetch_timeout_used: self.fetch_timeout,
                ..Default::default()
            };
            debug.parsed_count = cached.len() as u32;
            let mut cases = cached;
            cases.truncate(input.max_results);
            return Ok(SearchOutput { cases, debug });
        }

        let (mut cases, mut debug) = self.run_query(&query).await?;

        let relaxable = matches!(
            input.variant.retrieval_directives.query_mode,
            Some(QueryMode::Context) | Some(QueryMode::Expansion)
        );
        if cases.is_empty() && relaxable {
            let relaxed = relax_query(&self.site, &input.variant.phrase);
            let (relaxed_cases, relaxed_debug) = self.run_query(&relaxed).await?;
            cases = relaxed_cases;
            debug = relaxed_debug;
        }

        if !cases.is_empty() {
            let _ = self.cache.set_value(&Self::cache_key(&query), &cases, Some(CACHE_TTL_SECS)).await;
        }

        cases.truncate(input.max_results);
        Ok(SearchOutput { cases, debug })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_site_restricted_quoted_query() {
        let query = build_query(
            "indiankanoon.org",
            "delay condonation",
            &["section 5".to_string(), "limitation act".to_string()],
            &["dismissed".to_string()],
        );
        assert!(query.starts_with("site:indiankanoon.org \"delay condonation\""));
        assert!(query.contains("\"section 5\""));
        assert!(query.contains("-dismissed"));
    }

    #[test]
    fn relaxed_query_drops_quoting() {
        let relaxed = relax_query("indiankanoon.org", "delay condonation appeal");
        assert!(!relaxed.contains('"'));
        assert!(relaxed.contains("delay condonation appeal"));
    }
}

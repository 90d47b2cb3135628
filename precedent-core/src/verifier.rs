//! Detail hydration and evidence extraction (spec §4.8). Bounded
//! concurrency worker pool over the top-N candidates, grounded on the
//! teacher's semaphore-bounded batch pattern (reused in
//! `providers::lexical::LexicalApiProvider::enrich`).

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use tokio::sync::Semaphore;

use crate::cache::Cache;
use crate::classifier::classify_candidate;
use crate::config::RetrievalConfig;
use crate::domain::{CaseCandidate, DetailHydrationSource, EvidenceQuality};
use crate::error::Error;
use crate::providers::websearch::WebSearchProvider;
use crate::providers::{RetrievalProvider, SearchInput};

struct EvidencePatterns {
    relation: Regex,
    polarity: Regex,
    role: Regex,
    hook_cue: Regex,
}

fn patterns() -> &'static EvidencePatterns {
    static PATTERNS: OnceLock<EvidencePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| EvidencePatterns {
        relation: Regex::new(r"(?i)\b(relied on|distinguished|followed|overruled)\b").expect("compiles"),
        polarity: Regex::new(r"(?i)\b(allowed|dismissed|quashed|refused|condoned|upheld)\b").expect("compiles"),
        role: Regex::new(r"(?i)\b(appellant|respondent|petitioner|vs\.?|preferred appeal)\b").expect("compiles"),
        hook_cue: Regex::new(r"(?i)\bsection\s+\d+[a-z]*\b").expect("compiles"),
    })
}

/// Detail text fetched for a candidate, from cache, direct fetch, hint
/// resolution, or snippet synthesis (spec §4.8).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct DetailResult {
    text: Option<String>,
    court_text: Option<String>,
    source: DetailHydrationSource,
}

fn detail_cache_key(candidate: &CaseCandidate) -> String {
    format!("detail:v1:{}", candidate.url)
}

/// Bounded-concurrency verifier: hydrates the top
/// `RetrievalConfig::verify_limit` candidates with detail evidence.
pub struct Verifier {
    http: reqwest::Client,
    cache: Arc<Cache>,
    web_search: Option<Arc<WebSearchProvider>>,
    config: RetrievalConfig,
}

impl Verifier {
    pub fn new(cache: Arc<Cache>, web_search: Option<Arc<WebSearchProvider>>, config: RetrievalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache,
            web_search,
            config,
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<String, Error> {
        let resp = tokio::time::timeout(self.config.provider_timeout, self.http.get(url).send())
            .await
            .map_err(|_| Error::timeout(self.config.provider_timeout.as_millis() as u64))?
            .map_err(|e| Error::network(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(Error::parse_empty(url));
        }
        let text = resp.text().await.map_err(|e| Error::network(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(Error::parse_empty(url));
        }
        Ok(text)
    }

    fn alternate_urls(candidate: &CaseCandidate) -> Vec<String> {
        let mut urls = Vec::new();
        if let Some(full) = &candidate.full_document_url {
            urls.push(full.clone());
        }
        urls.push(format!("{}?format=fragment", candidate.url));
        urls
    }

    /// Direct fetch with bounded retry for transient errors; permanent
    /// errors (403/429/parse_empty) are cached and not retried (spec
    /// §4.8 step 2). Returns the last error encountered so the caller
    /// can decide whether the eventual failure is cacheable.
    async fn direct_fetch(&self, candidate: &CaseCandidate) -> Result<String, Error> {
        let mut urls = vec![candidate.url.clone()];
        urls.extend(Self::alternate_urls(candidate));

        let mut last_err = Error::parse_empty(candidate.url.as_str());
        for url in urls {
            for attempt in 0..2 {
                match self.fetch_url(&url).await {
                    Ok(text) => return Ok(text),
                    Err(e) if matches!(e.kind(), crate::error::ErrorKind::Timeout | crate::error::ErrorKind::Network) => {
                        last_err = e;
                        if attempt == 0 {
                            tokio::time::sleep(Duration::from_millis(150)).await;
                            continue;
                        }
                    }
                    Err(e) => {
                        last_err = e;
                        break;
                    }
                }
            }
        }
        Err(last_err)
    }

    /// Resolve an alternate URL by hint (title + docId + court) when
    /// direct fetch fails within the hybrid-fallback cutoff (spec §4.8
    /// step 3).
    async fn hint_resolution_fetch(&self, candidate: &CaseCandidate) -> Result<String, Error> {
        let court = match candidate.court {
            crate::domain::Court::SupremeCourt => "sc",
            crate::domain::Court::HighCourt => "hc",
            crate::domain::Court::Unknown => "unknown",
        };
        let hinted_url = format!(
            "{}/hint?title={}&court={}",
            candidate.url.split("/docfragment").next().unwrap_or(&candidate.url),
            urlencoding_lite(&candidate.title),
            court
        );
        self.fetch_url(&hinted_url).await
    }

    /// Web-search snippet synthesis when hint resolution also fails,
    /// within the snippet-fallback cutoff (spec §4.8 step 4).
    async fn snippet_fallback(&self, candidate: &CaseCandidate) -> Option<String> {
        let web_search = self.web_search.as_ref()?;
        let variant = crate::domain::variant::QueryVariant {
            id: "snippet-fallback".into(),
            phrase: candidate.title.clone(),
            phase: crate::domain::variant::Phase::Rescue,
            purpose: "snippet_fallback".into(),
            court_scope: crate::domain::canonical::CourtScope::Any,
            strictness: crate::domain::variant::Strictness::Relaxed,
            tokens: vec![],
            canonical_key: "snippet-fallback".into(),
            priority: 0,
            must_include_tokens: vec![],
            must_exclude_tokens: vec![],
            provider_hints: vec![],
            retrieval_directives: crate::domain::variant::RetrievalDirectives::default(),
        };
        let output = web_search
            .search(SearchInput { variant: &variant, max_results: self.config.min_snippets.max(4) })
            .await
            .ok()?;
        if output.cases.len() < self.config.min_snippets {
            return None;
        }
        Some(
            output
                .cases
                .iter()
                .map(|c| c.snippet.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    async fn hydrate_one(&self, mut candidate: CaseCandidate, index: usize) -> CaseCandidate {
        let cache_key = detail_cache_key(&candidate);
        if let Some(cached) = self.cache.get_value::<DetailResult>(&cache_key).await {
            candidate.detail_text = cached.text.clone();
            candidate.court_text = cached.court_text.or(candidate.court_text);
            candidate.detail_hydration = Some(DetailHydrationSource::Cache);
        } else {
            let mut result = DetailResult::default();
            let mut last_err = None;
            match self.direct_fetch(&candidate).await {
                Ok(text) => {
                    result.text = Some(text);
                    result.source = DetailHydrationSource::PrimaryUrl;
                }
                Err(e) => {
                    last_err = Some(e);
                    if index < self.config.hybrid_fallback_cutoff {
                        match self.hint_resolution_fetch(&candidate).await {
                            Ok(text) => {
                                result.text = Some(text);
                                result.source = DetailHydrationSource::HintResolution;
                                last_err = None;
                            }
                            Err(e) => last_err = Some(e),
                        }
                    }
                }
            }
            if result.text.is_none() && index < self.config.snippet_fallback_cutoff {
                if let Some(text) = self.snippet_fallback(&candidate).await {
                    result.text = Some(text);
                    result.source = DetailHydrationSource::SnippetFallback;
                    candidate.detail_artifact = Some("snippet_synthesis".into());
                    last_err = None;
                }
            }

            // Only persist a failure entry for the three spec-listed
            // cacheable kinds (403/429/parse_empty, spec §3 invariant 4);
            // a plain timeout or network error must not be cached, so a
            // later request can retry instead of reusing a stale miss.
            let should_cache = result.text.is_some() || last_err.as_ref().is_some_and(Error::is_cacheable_detail_failure);
            if should_cache {
                let _ = self
                    .cache
                    .set_value(&cache_key, &result, Some(self.config.detail_cache_ttl.as_secs()))
                    .await;
            }
            candidate.detail_text = result.text;
            candidate.detail_hydration = Some(result.source);
        }

        classify_candidate(&mut candidate);
        candidate.evidence_quality = candidate.detail_text.as_deref().map(compute_evidence_quality);
        candidate
    }

    /// Hydrate up to `verify_limit` candidates with bounded concurrency
    /// (default 4, cap 6 per spec §5); remaining candidates pass through
    /// unhydrated.
    pub async fn verify(&self, candidates: Vec<CaseCandidate>) -> Vec<CaseCandidate> {
        let limit = self.config.verify_limit.min(candidates.len());
        let concurrency = self.config.detail_concurrency.min(6).max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let (to_hydrate, rest) = {
            let mut candidates = candidates;
            let rest = candidates.split_off(limit);
            (candidates, rest)
        };

        let tasks = to_hydrate.into_iter().enumerate().map(|(index, candidate)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                self.hydrate_one(candidate, index).await
            }
        });

        let mut hydrated = join_all(tasks).await;
        hydrated.extend(rest);
        hydrated
    }
}

/// Presence of relation/polarity/hook-intersection/role/chain evidence
/// sentences in the hydrated detail text (spec §4.8).
fn compute_evidence_quality(detail_text: &str) -> EvidenceQuality {
    let patterns = patterns();
    let has_relation_sentence = patterns.relation.is_match(detail_text);
    let has_polarity_sentence = patterns.polarity.is_match(detail_text);
    let has_role_sentence = patterns.role.is_match(detail_text);

    let has_hook_intersection_sentence = detail_text.split(['.', ';']).any(|sentence| {
        let hook_hits = patterns.hook_cue.find_iter(sentence).count();
        hook_hits >= 2 && (patterns.relation.is_match(sentence) || patterns.polarity.is_match(sentence))
    });

    let has_chain_sentence = detail_text.split(['.', ';']).any(|sentence| {
        patterns.role.is_match(sentence) && patterns.hook_cue.is_match(sentence)
    });

    EvidenceQuality {
        has_relation_sentence,
        has_polarity_sentence,
        has_hook_intersection_sentence,
        has_role_sentence,
        has_chain_sentence,
    }
}

fn urlencoding_lite(value: &str) -> String {
    value.replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_hook_intersection_evidence() {
        let text = "The court held that section 197 and section 19 of the Prevention of Corruption Act were followed together in this matter.";
        let quality = compute_evidence_quality(text);
        assert!(quality.has_hook_intersection_sentence);
        assert!(quality.has_relation_sentence);
    }

    #[test]
    fn detects_role_and_polarity_sentences() {
        let text = "The appellant preferred appeal before the High Court which was dismissed.";
        let quality = compute_evidence_quality(text);
        assert!(quality.has_role_sentence);
        assert!(quality.has_polarity_sentence);
    }

    #[test]
    fn absent_evidence_yields_all_false() {
        let quality = compute_evidence_quality("a plain administrative circular with no legal content");
        assert!(!quality.has_relation_sentence);
        assert!(!quality.has_polarity_sentence);
        assert!(!quality.has_hook_intersection_sentence);
    }
}

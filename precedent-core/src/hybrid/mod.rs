//! Hybrid search and rerank (spec §4.7): fuses lexical and semantic
//! candidate lists, reranks the top of the fused list, and records
//! counts/latency for the debug trace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::CaseCandidate;
use crate::error::{Error, Result};
use crate::legal::jaccard_overlap;

/// A ranked hit out of either the lexical or the semantic leg, keyed by
/// the candidate's identity so fusion can merge ranks across legs.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub candidate: CaseCandidate,
    pub rank: usize,
}

#[async_trait]
pub trait SemanticSearch: Send + Sync {
    async fn search(&self, phrase_tokens: &[String], top_n: usize) -> Result<Vec<RankedHit>>;
}

/// Hosted embedding + vector-store search. Falls back to a local hashed
/// bag-of-tokens embedding when no hosted embedding model is configured
/// (spec §4.7: "preferring a hosted embedding model; else local hashed
/// bag-of-tokens").
pub struct HostedSemanticSearch {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HostedSemanticSearch {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn local_hashed_embedding(tokens: &[String]) -> Vec<f32> {
        const DIMS: usize = 64;
        let mut bucket = vec![0f32; DIMS];
        for token in tokens {
            let hash = token.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            bucket[(hash as usize) % DIMS] += 1.0;
        }
        bucket
    }
}

#[async_trait]
impl SemanticSearch for HostedSemanticSearch {
    async fn search(&self, phrase_tokens: &[String], top_n: usize) -> Result<Vec<RankedHit>> {
        let embedding = if self.api_key.is_some() {
            let body = serde_json::json!({ "tokens": phrase_tokens });
            let resp = self
                .http
                .post(format!("{}/embed", self.endpoint))
                .bearer_auth(self.api_key.as_deref().unwrap_or_default())
                .json(&body)
                .send()
                .await;
            match resp {
                Ok(r) => r
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v["embedding"].as_array().cloned())
                    .map(|a| a.iter().filter_map(|x| x.as_f64().map(|f| f as f32)).collect())
                    .unwrap_or_else(|| Self::local_hashed_embedding(phrase_tokens)),
                Err(_) => Self::local_hashed_embedding(phrase_tokens),
            }
        } else {
            Self::local_hashed_embedding(phrase_tokens)
        };

        let resp = self
            .http
            .post(format!("{}/vector-search", self.endpoint))
            .json(&serde_json::json!({ "embedding": embedding, "top_n": top_n }))
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| Error::network(e.to_string()))?;
        let rows = body["matches"].as_array().cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .enumerate()
            .filter_map(|(rank, row)| {
                Some(RankedHit {
                    candidate: serde_json::from_value(row).ok()?,
                    rank,
                })
            })
            .collect())
    }
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query_tokens: &[String], candidates: &[CaseCandidate]) -> Result<Vec<f64>>;
}

/// Hosted rerank model with strict-JSON scoring (spec §4.7).
pub struct HostedReranker {
    http: reqwest::Client,
    endpoint: String,
}

impl HostedReranker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Reranker for HostedReranker {
    async fn rerank(&self, query_tokens: &[String], candidates: &[CaseCandidate]) -> Result<Vec<f64>> {
        let docs: Vec<&str> = candidates.iter().map(|c| c.snippet.as_str()).collect();
        let resp = self
            .http
            .post(format!("{}/rerank", self.endpoint))
            .json(&serde_json::json!({ "query_tokens": query_tokens, "documents": docs }))
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| Error::network(e.to_string()))?;
        let scores = body["scores"]
            .as_array()
            .ok_or_else(|| Error::reasoner_error("rerank", "missing scores array"))?;
        scores
            .iter()
            .map(|v| v.as_f64().ok_or_else(|| Error::reasoner_error("rerank", "non-numeric score")))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HybridDebug {
    pub lexical_count: u32,
    pub semantic_count: u32,
    pub fused_count: u32,
    pub fusion_latency_ms: u64,
    pub rerank_fallback_used: bool,
    pub shadow_mode: bool,
}

#[derive(Debug, Clone)]
pub struct HybridOutput {
    pub cases: Vec<CaseCandidate>,
    pub debug: HybridDebug,
}

pub struct HybridSearch {
    semantic: Arc<dyn SemanticSearch>,
    reranker: Arc<dyn Reranker>,
    semantic_weight: f64,
    lexical_weight: f64,
    rerank_top_n: usize,
    shadow_capture: bool,
    shadow_timeout: Duration,
}

impl HybridSearch {
    pub fn new(
        semantic: Arc<dyn SemanticSearch>,
        reranker: Arc<dyn Reranker>,
        semantic_weight: f64,
        lexical_weight: f64,
        rerank_top_n: usize,
        shadow_capture: bool,
        shadow_timeout: Duration,
    ) -> Self {
        Self {
            semantic,
            reranker,
            semantic_weight,
            lexical_weight,
            rerank_top_n,
            shadow_capture,
            shadow_timeout,
        }
    }

    /// Reciprocal-rank-style weighted fusion over two ranked lists keyed
    /// by candidate identity (spec §4.7).
    fn fuse(lexical: &[CaseCandidate], semantic: &[RankedHit], lexical_weight: f64, semantic_weight: f64) -> Vec<CaseCandidate> {
        let mut scored: Vec<(f64, CaseCandidate)> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (rank, candidate) in lexical.iter().enumerate() {
            let score = lexical_weight / (60.0 + rank as f64 + 1.0);
            seen.insert(candidate.identity().to_string());
            scored.push((score, candidate.clone()));
        }
        for hit in semantic {
            let score = semantic_weight / (60.0 + hit.rank as f64 + 1.0);
            if let Some(existing) = scored.iter_mut().find(|(_, c)| c.identity() == hit.candidate.identity()) {
                existing.0 += score;
            } else if seen.insert(hit.candidate.identity().to_string()) {
                scored.push((score, hit.candidate.clone()));
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, c)| c).collect()
    }

    /// Rerank the fused top-N, with a deterministic lexical Jaccard
    /// fallback when the hosted call fails (spec §4.7).
    async fn rerank_top_n(&self, query_tokens: &[String], fused: Vec<CaseCandidate>, debug: &mut HybridDebug) -> Vec<CaseCandidate> {
        if fused.is_empty() {
            return fused;
        }
        let n = self.rerank_top_n.min(fused.len());
        let (head, tail) = fused.split_at(n);
        let mut head = head.to_vec();
        let tail = tail.to_vec();

        match self.reranker.rerank(query_tokens, &head).await {
            Ok(scores) if scores.len() == head.len() => {
                let mut paired: Vec<(f64, CaseCandidate)> = scores.into_iter().zip(head.into_iter()).collect();
                paired.sort_by(|a, b| b.0.total_cmp(&a.0));
                head = paired.into_iter().map(|(_, c)| c).collect();
            }
            _ => {
                debug.rerank_fallback_used = true;
                head.sort_by(|a, b| {
                    let score_a = jaccard_overlap(query_tokens, &crate::legal::tokenize(&a.snippet));
                    let score_b = jaccard_overlap(query_tokens, &crate::legal::tokenize(&b.snippet));
                    score_b.total_cmp(&score_a)
                });
            }
        }

        head.into_iter().chain(tail).collect()
    }

    /// Run lexical + semantic concurrently, fuse, and rerank. When
    /// `shadow_capture` is set, this is run alongside lexical-authoritative
    /// retrieval purely to collect counts and is bounded by a short
    /// timeout (spec §4.7).
    pub async fn search(&self, query_tokens: &[String], lexical: Vec<CaseCandidate>) -> HybridOutput {
        let started = Instant::now();
        let mut debug = HybridDebug {
            lexical_count: lexical.len() as u32,
            shadow_mode: self.shadow_capture,
            ..Default::default()
        };

        let semantic_future = self.semantic.search(query_tokens, lexical.len().max(20));
        let semantic = if self.shadow_capture {
            match tokio::time::timeout(self.shadow_timeout, semantic_future).await {
                Ok(Ok(hits)) => hits,
                _ => vec![],
            }
        } else {
            semantic_future.await.unwrap_or_default()
        };
        debug.semantic_count = semantic.len() as u32;

        let fused = Self::fuse(&lexical, &semantic, self.lexical_weight, self.semantic_weight);
        debug.fused_count = fused.len() as u32;

        let cases = if self.shadow_capture {
            lexical
        } else {
            self.rerank_top_n(query_tokens, fused, &mut debug).await
        };

        debug.fusion_latency_ms = started.elapsed().as_millis() as u64;
        HybridOutput { cases, debug }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Classification, Court, RetrievalMeta};

    fn candidate(url: &str, snippet: &str) -> CaseCandidate {
        CaseCandidate {
            source: "lexical_api".into(),
            title: url.into(),
            url: url.into(),
            snippet: snippet.into(),
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
    fn fusion_combines_scores_for_overlapping_hits() {
        let lexical = vec![candidate("a", "one"), candidate("b", "two")];
        let semantic = vec![
            RankedHit { candidate: candidate("a", "one"), rank: 0 },
            RankedHit { candidate: candidate("c", "three"), rank: 1 },
        ];
        let fused = HybridSearch::fuse(&lexical, &semantic, 1.0, 1.0);
        assert_eq!(fused[0].url, "a");
        assert_eq!(fused.len(), 3);
    }

    struct FailingReranker;
    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(&self, _: &[String], _: &[CaseCandidate]) -> Result<Vec<f64>> {
            Err(Error::internal("rerank down"))
        }
    }

    struct NoopSemantic;
    #[async_trait]
    impl SemanticSearch for NoopSemantic {
        async fn search(&self, _: &[String], _: usize) -> Result<Vec<RankedHit>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn falls_back_to_lexical_jaccard_when_rerank_fails() {
        let search = HybridSearch::new(
            Arc::new(NoopSemantic),
            Arc::new(FailingReranker),
            1.0,
            1.0,
            5,
            false,
            Duration::from_millis(50),
        );
        let lexical = vec![candidate("a", "delay condonation appeal"), candidate("b", "unrelated text")];
        let output = search.search(&["delay".into(), "condonation".into()], lexical).await;
        assert!(output.debug.rerank_fallback_used);
        assert_eq!(output.cases[0].url, "a");
    }
}

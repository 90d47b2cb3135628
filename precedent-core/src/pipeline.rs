//! End-to-end orchestration (spec §6): intent extraction, planning and
//! reasoning, canonicalisation, concurrent retrieval, classification,
//! verification, scoring/gating, and response assembly.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::cache::{Cache, FallbackStore};
use crate::canonical::{build_canonical_intent, synthesize_retrieval_queries};
use crate::classifier::classify_candidate;
use crate::config::PipelineConfig;
use crate::domain::{CaseCandidate, Classification, QueryVariant, RetrievalTier, ScoredCase};
use crate::gate::{build_checklist, evaluate};
use crate::gateway::ModelGateway;
use crate::hybrid::HybridSearch;
use crate::intent::build_intent_profile;
use crate::planner::build_planner_output;
use crate::providers::{RetrievalProvider, SearchInput};
use crate::reasoner::{expand_sketch_to_plan, ground_plan, Reasoner};
use crate::scorer::{diversify, score_candidate};

#[derive(Debug, Clone)]
pub struct Request {
    pub query: String,
    pub max_results: usize,
    pub request_id: String,
    pub debug_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    NoMatch,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    ClientFirst,
    ServerFallback,
    ServerOnly,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropositionSummary {
    pub required_elements: Vec<String>,
    pub optional_elements: Vec<String>,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    pub status: ResponseStatus,
    pub retry_after_ms: Option<u64>,
    pub blocked_kind: Option<String>,
    pub execution_path: ExecutionPath,
    pub partial_run: bool,
    pub query: String,
    pub context: Vec<String>,
    pub proposition: PropositionSummary,
    pub keyword_pack: Vec<String>,
    pub total_fetched: u32,
    pub filtered_count: u32,
    pub cases: Vec<ScoredCase>,
    pub cases_exact: Vec<ScoredCase>,
    pub cases_exact_strict: Vec<ScoredCase>,
    pub cases_exact_provisional: Vec<ScoredCase>,
    pub cases_near_miss: Vec<ScoredCase>,
    pub insights: Vec<String>,
    pub notes: Vec<String>,
    pub pipeline_trace: Vec<String>,
}

/// The assembled pipeline: deterministic planner, optional reasoner,
/// a bank of retrieval providers, optional hybrid search, verifier, and
/// the stale-fallback recall store.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    reasoner: Reasoner,
    providers: Vec<Arc<dyn RetrievalProvider>>,
    verifier: crate::verifier::Verifier,
    hybrid: Option<HybridSearch>,
    fallback_store: Option<Arc<FallbackStore>>,
    provider_concurrency: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        cache: Arc<Cache>,
        gateway: Arc<ModelGateway>,
        providers: Vec<Arc<dyn RetrievalProvider>>,
        verifier: crate::verifier::Verifier,
        hybrid: Option<HybridSearch>,
        fallback_store: Option<Arc<FallbackStore>>,
    ) -> Self {
        let reasoner = Reasoner::new(gateway, cache, config.model.clone(), config.reasoner.clone());
        Self {
            provider_concurrency: Arc::new(Semaphore::new(config.retrieval.docmeta_concurrency.max(1))),
            config,
            reasoner,
            providers,
            verifier,
            hybrid,
            fallback_store,
        }
    }

    fn request_fingerprint(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Run one phase's variants concurrently, bounded by the shared
    /// provider semaphore (spec §5: "per-provider concurrency is
    /// bounded"). Returns candidates plus whether the phase was blocked
    /// by repeated rate limiting.
    async fn run_phase(&self, variants: &[QueryVariant], max_results: usize, trace: &mut Vec<String>) -> (Vec<CaseCandidate>, bool) {
        let tasks = variants.iter().flat_map(|variant| {
            self.providers.iter().map(move |provider| {
                let semaphore = self.provider_concurrency.clone();
                let provider = provider.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    provider
                        .search(SearchInput { variant, max_results })
                        .await
                        .map_err(|e| (provider.source_tag(), e))
                }
            })
        });

        let results = join_all(tasks).await;
        let mut candidates = Vec::new();
        let mut rate_limited_count = 0usize;
        let total = results.len().max(1);

        for result in results {
            match result {
                Ok(output) => candidates.extend(output.cases),
                Err((tag, e)) if e.kind() == crate::error::ErrorKind::RateLimited => {
                    rate_limited_count += 1;
                    trace.push(format!("{tag} rate limited"));
                }
                Err((tag, e)) => trace.push(format!("{tag} error: {e}")),
            }
        }

        let blocked = rate_limited_count * 2 > total;
        (candidates, blocked)
    }

    fn dedupe_candidates(candidates: Vec<CaseCandidate>) -> Vec<CaseCandidate> {
        let mut seen = std::collections::HashSet::new();
        candidates.into_iter().filter(|c| seen.insert(c.identity().to_string())).collect()
    }

    /// Run the full pipeline for one request (spec §6).
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn run(&self, request: Request) -> Response {
        let started = Instant::now();
        let mut trace = Vec::new();
        let mut notes = Vec::new();

        info!("starting pipeline run");

        let profile = build_intent_profile(&request.query);
        trace.push("intent_extracted".to_string());

        let planner_future = async { build_planner_output(&profile) };
        let reasoner_future = self.reasoner.run_pass1(&profile, 0, false);
        let (planner_output, reasoner_outcome) = tokio::join!(planner_future, reasoner_future);

        if let Some(reason) = reasoner_outcome.skip_reason {
            notes.push(format!("reasoner_skipped:{reason}"));
        }
        let pass1_call_made = reasoner_outcome.skip_reason.is_none() && !reasoner_outcome.cache_hit;

        let plan = reasoner_outcome.sketch.as_ref().map(|sketch| {
            let disjunctive = profile.cleaned_query.contains(" or ");
            ground_plan(expand_sketch_to_plan(sketch, disjunctive), &profile)
        });
        trace.push("reasoner_stage_complete".to_string());

        let mut canonical_intent = build_canonical_intent(&profile, plan.as_ref());
        let mut variants = synthesize_retrieval_queries(&canonical_intent, &profile, &planner_output.keyword_pack.search_phrases);
        variants.extend(planner_output.variants.clone());
        let variants = crate::domain::dedupe_and_cap(variants);
        trace.push(format!("variants_synthesized:{}", variants.len()));

        let mut checklist = build_checklist(&canonical_intent, plan.as_ref());

        let mut all_candidates = Vec::new();
        let mut blocked_kind: Option<String> = None;
        for phase in [
            crate::domain::Phase::Primary,
            crate::domain::Phase::Fallback,
            crate::domain::Phase::Rescue,
            crate::domain::Phase::Micro,
            crate::domain::Phase::Revolving,
            crate::domain::Phase::Browse,
        ] {
            let phase_variants: Vec<QueryVariant> = variants.iter().filter(|v| v.phase == phase).cloned().collect();
            if phase_variants.is_empty() {
                continue;
            }
            let (candidates, blocked) = self.run_phase(&phase_variants, request.max_results, &mut trace).await;
            debug!(phase = ?phase, fetched = candidates.len(), "phase complete");
            all_candidates.extend(candidates);
            if blocked {
                blocked_kind = Some("local_cooldown".to_string());
                trace.push(format!("{phase:?} phase short-circuited by rate limiting"));
                info!(phase = ?phase, "phase short-circuited by rate limiting");
                break;
            }
        }

        let mut candidates = Self::dedupe_candidates(all_candidates);
        let total_fetched = candidates.len() as u32;

        if let Some(hybrid) = &self.hybrid {
            let query_tokens = crate::intent::query_tokens(&profile);
            let hybrid_output = hybrid.search(&query_tokens, candidates.clone()).await;
            candidates = hybrid_output.cases;
            trace.push(format!(
                "hybrid_fusion:lexical={},semantic={},fused={}",
                hybrid_output.debug.lexical_count, hybrid_output.debug.semantic_count, hybrid_output.debug.fused_count
            ));
        }

        for candidate in &mut candidates {
            classify_candidate(candidate);
        }
        candidates.retain(|c| c.classification == Some(Classification::Case));
        let filtered_count = candidates.len() as u32;

        let hydrated = self.verifier.verify(candidates).await;
        trace.push("verification_complete".to_string());

        // Optional reasoner pass-2: refine the plan using hydrated detail
        // text, keyed by seed-hash(basePlan, snippets) so identical
        // evidence reuses the cached refinement (spec §4.4, §6).
        if let Some(base_plan) = &plan {
            let snippets: Vec<String> = hydrated.iter().filter_map(|c| c.detail_text.clone()).collect();
            if !snippets.is_empty() {
                let calls_made = if pass1_call_made { 1 } else { 0 };
                let pass2_outcome = self.reasoner.run_pass2(&profile, base_plan, &snippets, calls_made, false).await;
                if let Some(reason) = pass2_outcome.skip_reason {
                    notes.push(format!("reasoner_pass2_skipped:{reason}"));
                }
                if let Some(refined_plan) = pass2_outcome.plan {
                    canonical_intent = build_canonical_intent(&profile, Some(&refined_plan));
                    checklist = build_checklist(&canonical_intent, Some(&refined_plan));
                    trace.push("reasoner_pass2_applied".to_string());
                }
            }
        }

        let mut scored: Vec<ScoredCase> = hydrated
            .into_iter()
            .map(|candidate| {
                let detail_text = candidate.detail_text.clone().unwrap_or_else(|| candidate.snippet.clone());
                let (tier, missing) = evaluate(&checklist, &detail_text);
                let mut scored = score_candidate(&candidate, &canonical_intent, &profile, tier, self.config.exploratory_confidence_cap);
                scored.missing_elements = missing;
                if !scored.missing_elements.is_empty() {
                    scored.gap_summary = Some(scored.missing_elements.join(", "));
                }
                scored
            })
            .collect();

        scored = diversify(scored, self.config.max_per_fingerprint, self.config.max_per_court_day);
        scored.truncate(request.max_results.max(1));
        trace.push("scoring_and_gating_complete".to_string());

        let cases_exact_strict: Vec<ScoredCase> = scored.iter().filter(|c| c.retrieval_tier == RetrievalTier::ExactStrict).cloned().collect();
        let cases_exact_provisional: Vec<ScoredCase> = scored.iter().filter(|c| c.retrieval_tier == RetrievalTier::ExactProvisional).cloned().collect();
        let cases_near_miss: Vec<ScoredCase> = scored.iter().filter(|c| c.retrieval_tier == RetrievalTier::Exploratory).cloned().collect();
        let cases_exact: Vec<ScoredCase> = cases_exact_strict.iter().chain(cases_exact_provisional.iter()).cloned().collect();

        let proposition = PropositionSummary {
            required_elements: checklist.required_elements.clone(),
            optional_elements: checklist.optional_elements.clone(),
            constraints: checklist.relations.clone(),
        };

        let mut insights = Vec::new();
        if !cases_exact_strict.is_empty() {
            insights.push(format!("{} exact_strict match(es)", cases_exact_strict.len()));
        }
        if !cases_exact_provisional.is_empty() {
            insights.push(format!("{} exact_provisional match(es) with a peripheral gap", cases_exact_provisional.len()));
        }
        if !cases_near_miss.is_empty() {
            insights.push(format!("{} exploratory near-miss case(s)", cases_near_miss.len()));
        }

        let status = if scored.is_empty() {
            ResponseStatus::NoMatch
        } else if blocked_kind.is_some() {
            ResponseStatus::Blocked
        } else {
            ResponseStatus::Completed
        };

        let mut response = Response {
            request_id: request.request_id.clone(),
            status,
            retry_after_ms: None,
            blocked_kind: blocked_kind.clone(),
            execution_path: ExecutionPath::ServerOnly,
            partial_run: blocked_kind.is_some(),
            query: request.query.clone(),
            context: profile.anchors.clone(),
            proposition,
            keyword_pack: planner_output.keyword_pack.search_phrases.clone(),
            total_fetched,
            filtered_count,
            cases: scored,
            cases_exact,
            cases_exact_strict,
            cases_exact_provisional,
            cases_near_miss,
            insights,
            notes,
            pipeline_trace: if request.debug_enabled { trace } else { vec![] },
        };

        // Backpressure: when a phase was blocked and nothing survived,
        // return a stale-fallback recall bundle so the response is
        // never empty (spec §5 "Backpressure", §7).
        if self.config.flags.stale_fallback && response.cases.is_empty() {
            if let Some(store) = &self.fallback_store {
                let hash = Self::request_fingerprint(&request.query);
                if let Ok(Some(entry)) = store.get(&hash) {
                    if let Ok(stale) = serde_json::from_str::<Response>(&entry.response_json) {
                        let mut stale = stale;
                        stale.request_id = request.request_id.clone();
                        stale.partial_run = true;
                        stale.notes.push("stale_fallback_bundle".to_string());
                        return stale;
                    }
                }
            }
        }

        if let Some(store) = &self.fallback_store {
            if response.status == ResponseStatus::Completed && !response.cases.is_empty() {
                let hash = Self::request_fingerprint(&request.query);
                if let Ok(json) = serde_json::to_string(&response) {
                    let _ = store.put(&hash, &json);
                }
            }
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(latency_ms, status = ?response.status, cases = response.cases.len(), "pipeline run complete");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fingerprint_is_deterministic() {
        assert_eq!(Pipeline::request_fingerprint("same query"), Pipeline::request_fingerprint("same query"));
        assert_ne!(Pipeline::request_fingerprint("a"), Pipeline::request_fingerprint("b"));
    }
}

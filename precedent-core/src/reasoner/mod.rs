//! Reasoner (spec §4.4): an optional LLM stage that produces a
//! validated [`ReasonerSketch`] (pass-1), deterministically expanded
//! into a [`ReasonerPlan`] (pass-2), guarded by a circuit breaker, a
//! call budget, a local in-flight semaphore, a global rate bucket, and
//! a distributed lock.

pub mod circuit;
pub mod salvage;

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use crate::cache::{Cache, DistributedLock};
use crate::config::{ModelConfig, ReasonerGovernance, ReasonerMode};
use crate::domain::{HookGroup, OutcomeConstraint, Polarity, Proposition, ReasonerPlan, ReasonerSketch, Relation};
use crate::error::{Error, Result};
use crate::gateway::{GatewayRequest, ModelGateway};
use crate::intent::IntentProfile;
use crate::reasoner::circuit::CircuitBreaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonerStage {
    Pass1Sketch,
    Pass2Plan,
}

#[derive(Debug, Clone)]
pub struct ReasonerOutcome {
    pub sketch: Option<ReasonerSketch>,
    pub plan: Option<ReasonerPlan>,
    pub cache_hit: bool,
    pub mode: &'static str,
    pub skip_reason: Option<&'static str>,
}

pub struct Reasoner {
    gateway: Arc<ModelGateway>,
    cache: Arc<Cache>,
    model: ModelConfig,
    governance: ReasonerGovernance,
    inflight: Arc<Semaphore>,
}

fn fingerprint(profile: &IntentProfile) -> String {
    let mut hasher = Sha256::new();
    hasher.update(profile.cleaned_query.as_bytes());
    for field in [&profile.actors, &profile.procedures, &profile.issues, &profile.statutes] {
        hasher.update(field.join(",").as_bytes());
    }
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Reasoner {
    pub fn new(
        gateway: Arc<ModelGateway>,
        cache: Arc<Cache>,
        model: ModelConfig,
        governance: ReasonerGovernance,
    ) -> Self {
        let inflight = Arc::new(Semaphore::new(governance.max_inflight));
        Self {
            gateway,
            cache,
            model,
            governance,
            inflight,
        }
    }

    fn pass1_key(fp: &str) -> String {
        format!("reasoner:v2:pass1:{fp}")
    }

    fn pass2_key(fp: &str, seed_hash: &str) -> String {
        format!("reasoner:v2:pass2:{fp}:{seed_hash}")
    }

    /// Run pass-2 (plan refinement), gated the same way as pass-1 and
    /// keyed by `seed-hash(basePlan, snippets)` (spec §4.4, §6 "...→
    /// verifier (detail hydration) → optional reasoner pass-2 →
    /// scoring..."). Returns `plan: None` whenever refinement is skipped
    /// or fails, so the caller keeps using `base_plan` unchanged.
    pub async fn run_pass2(
        &self,
        profile: &IntentProfile,
        base_plan: &ReasonerPlan,
        snippets: &[String],
        calls_made_this_request: u32,
        force: bool,
    ) -> ReasonerOutcome {
        if self.model.reasoner_mode == ReasonerMode::Deterministic {
            return self.skipped("deterministic_mode");
        }
        if calls_made_this_request >= self.governance.max_calls_per_request {
            return self.skipped("budget_exhausted");
        }
        if self.model.model_id.is_empty() {
            return self.skipped("config_missing");
        }
        if snippets.is_empty() {
            return self.skipped("no_snippets");
        }

        let fp = fingerprint(profile);
        let seed = seed_hash(base_plan, snippets);
        let cache_key = Self::pass2_key(&fp, &seed);

        if let Some(plan) = self.cache.get_value::<ReasonerPlan>(&cache_key).await {
            return ReasonerOutcome {
                sketch: None,
                plan: Some(plan),
                cache_hit: true,
                mode: "reasoner",
                skip_reason: None,
            };
        }

        let breaker = CircuitBreaker::new(&self.cache, self.governance.circuit_fail_threshold, self.governance.circuit_cooldown);
        if !force && breaker.is_open().await {
            return self.skipped("reasoner_circuit_open");
        }

        let rate_key = "reasoner:rate:v1";
        let count = self
            .cache
            .increment(rate_key, Some(self.governance.global_rate_window.as_secs()))
            .await;
        if count as u32 > self.governance.global_rate_limit {
            return self.skipped("rate_limited");
        }

        let owner = uuid::Uuid::new_v4().to_string();
        let lock = DistributedLock::acquire(&self.cache, &cache_key, &owner, 30).await;
        let Some(lock) = lock else {
            let polled = DistributedLock::poll_for_result::<ReasonerPlan>(
                &self.cache,
                &cache_key,
                self.governance.lock_wait_attempts,
                self.governance.lock_wait_interval,
            )
            .await;
            return match polled {
                Some(plan) => ReasonerOutcome {
                    sketch: None,
                    plan: Some(plan),
                    cache_hit: true,
                    mode: "reasoner",
                    skip_reason: None,
                },
                None => self.skipped("lock_contended"),
            };
        };

        let Ok(_permit) = self.inflight.clone().try_acquire_owned() else {
            DistributedLock::release(&self.cache, &lock).await;
            return self.skipped("inflight_saturated");
        };

        let prompt = build_refine_prompt(base_plan, snippets);
        let result = self.call_and_validate(profile, ReasonerStage::Pass2Plan, prompt).await;
        DistributedLock::release(&self.cache, &lock).await;

        match result {
            Ok(sketch) => {
                breaker.record_success().await;
                let disjunctive = profile.cleaned_query.contains(" or ");
                let refined = ground_plan(expand_sketch_to_plan(&sketch, disjunctive), profile);
                let _ = self
                    .cache
                    .set_value(&cache_key, &refined, Some(self.governance.pass2_cache_ttl.as_secs()))
                    .await;
                ReasonerOutcome {
                    sketch: Some(sketch),
                    plan: Some(refined),
                    cache_hit: false,
                    mode: "reasoner",
                    skip_reason: None,
                }
            }
            Err(_) => {
                breaker.record_failure().await;
                self.skipped("reasoner_call_error")
            }
        }
    }

    /// Run pass-1 (sketch), evaluating every gate in order (spec §4.4).
    pub async fn run_pass1(
        &self,
        profile: &IntentProfile,
        calls_made_this_request: u32,
        force: bool,
    ) -> ReasonerOutcome {
        // Gate 1: mode disabled.
        if self.model.reasoner_mode == ReasonerMode::Deterministic {
            return self.skipped("deterministic_mode");
        }
        // Gate 2: request-local budget.
        if calls_made_this_request >= self.governance.max_calls_per_request {
            return self.skipped("budget_exhausted");
        }
        // Gate 3: model config must resolve. We validate eagerly so a
        // config_missing error degrades to deterministic rather than
        // failing the request.
        if self.model.model_id.is_empty() {
            return self.skipped("config_missing");
        }

        let fp = fingerprint(profile);
        let cache_key = Self::pass1_key(&fp);

        // Gate 4: cache lookup.
        if let Some(sketch) = self.cache.get_value::<ReasonerSketch>(&cache_key).await {
            return ReasonerOutcome {
                sketch: Some(sketch),
                plan: None,
                cache_hit: true,
                mode: "reasoner",
                skip_reason: None,
            };
        }

        // Gate 5: circuit breaker.
        let breaker = CircuitBreaker::new(&self.cache, self.governance.circuit_fail_threshold, self.governance.circuit_cooldown);
        if !force && breaker.is_open().await {
            return self.skipped("reasoner_circuit_open");
        }

        // Gate 6: global rate bucket.
        let rate_key = "reasoner:rate:v1";
        let count = self
            .cache
            .increment(rate_key, Some(self.governance.global_rate_window.as_secs()))
            .await;
        if count as u32 > self.governance.global_rate_limit {
            return self.skipped("rate_limited");
        }

        // Gate 7: distributed lock, with poll-for-contention fallback.
        let owner = uuid::Uuid::new_v4().to_string();
        let lock = DistributedLock::acquire(&self.cache, &cache_key, &owner, 30).await;
        let Some(lock) = lock else {
            let polled = DistributedLock::poll_for_result::<ReasonerSketch>(
                &self.cache,
                &cache_key,
                self.governance.lock_wait_attempts,
                self.governance.lock_wait_interval,
            )
            .await;
            return match polled {
                Some(sketch) => ReasonerOutcome {
                    sketch: Some(sketch),
                    plan: None,
                    cache_hit: true,
                    mode: "reasoner",
                    skip_reason: None,
                },
                None => self.skipped("lock_contended"),
            };
        };

        // Gate 8: local in-flight semaphore.
        let Ok(_permit) = self.inflight.clone().try_acquire_owned() else {
            DistributedLock::release(&self.cache, &lock).await;
            return self.skipped("inflight_saturated");
        };

        let prompt = build_sketch_prompt(profile);
        let result = self.call_and_validate(profile, ReasonerStage::Pass1Sketch, prompt).await;
        DistributedLock::release(&self.cache, &lock).await;

        match result {
            Ok(sketch) => {
                breaker.record_success().await;
                let _ = self
                    .cache
                    .set_value(&cache_key, &sketch, Some(self.governance.pass1_cache_ttl.as_secs()))
                    .await;
                ReasonerOutcome {
                    sketch: Some(sketch),
                    plan: None,
                    cache_hit: false,
                    mode: "reasoner",
                    skip_reason: None,
                }
            }
            Err(_) => {
                breaker.record_failure().await;
                self.skipped("reasoner_call_error")
            }
        }
    }

    fn skipped(&self, reason: &'static str) -> ReasonerOutcome {
        ReasonerOutcome {
            sketch: None,
            plan: None,
            cache_hit: false,
            mode: "deterministic",
            skip_reason: Some(reason),
        }
    }

    /// Apply an adaptive timeout, call the gateway with the given
    /// prompt, and parse/validate the response (spec §4.4 "Call"),
    /// shared by pass-1 (sketch extraction) and pass-2 (plan refinement).
    async fn call_and_validate(&self, profile: &IntentProfile, stage: ReasonerStage, prompt: String) -> Result<ReasonerSketch> {
        let complexity_bump = adaptive_timeout_bump(profile, stage);
        let timeout = self.model.request_timeout + complexity_bump;

        let req = GatewayRequest::new(self.model.model_id.clone(), prompt)
            .with_max_tokens(self.model.max_output_tokens)
            .with_schema(sketch_schema());

        let response = tokio::time::timeout(timeout, self.gateway.request(req.clone()))
            .await
            .map_err(|_| Error::timeout(timeout.as_millis() as u64))?;

        let response = match response {
            Ok(r) => r,
            Err(Error::ReasonerError { .. }) => {
                // Retry once without the schema request (spec §4.4:
                // "unsupported output/performance config" error).
                self.gateway.request(req.without_schema()).await?
            }
            Err(e) => return Err(e),
        };

        let stage_label = match stage {
            ReasonerStage::Pass1Sketch => "pass1_sketch",
            ReasonerStage::Pass2Plan => "pass2_plan",
        };
        parse_sketch(&response.text).ok_or_else(|| {
            Error::reasoner_error(stage_label, "unparseable response, salvage also failed")
        })
    }
}

/// Hash of the base plan and hydrated snippets pass-2 refines over, so
/// identical evidence for the same plan reuses a cached refinement
/// (spec §4.4, §6).
fn seed_hash(base_plan: &ReasonerPlan, snippets: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(base_plan).unwrap_or_default().as_bytes());
    for snippet in snippets {
        hasher.update(snippet.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn build_refine_prompt(base_plan: &ReasonerPlan, snippets: &[String]) -> String {
    let evidence = snippets.iter().take(6).cloned().collect::<Vec<_>>().join("\n---\n");
    format!(
        "Refine the legal proposition using the hydrated case evidence below; keep actors, \
         proceeding, and hooks consistent with the existing plan unless the evidence contradicts them. \
         Respond as strict JSON matching the schema.\n\
         Existing actors: {:?}\nExisting proceeding: {:?}\nExisting hooks: {:?}\nExisting polarity: {:?}\n\n\
         Evidence snippets:\n{}\n\n\
         polarity must be one of required|not_required|allowed|refused|dismissed|quashed|unknown.",
        base_plan.proposition.actors,
        base_plan.proposition.proceeding,
        base_plan.proposition.legal_hooks,
        base_plan.proposition.outcome_constraint.polarity,
        evidence,
    )
}

fn adaptive_timeout_bump(profile: &IntentProfile, stage: ReasonerStage) -> Duration {
    let mut bump_ms: u64 = 0;
    if profile.statutes.len() >= 2 {
        bump_ms += 1500;
    }
    if profile.procedures.len() >= 2 {
        bump_ms += 1000;
    }
    if profile.cleaned_query.len() > 180 {
        bump_ms += 1000;
    }
    if stage == ReasonerStage::Pass2Plan {
        bump_ms += 2000;
    }
    Duration::from_millis(bump_ms)
}

fn build_sketch_prompt(profile: &IntentProfile) -> String {
    format!(
        "Extract a legal proposition sketch as strict JSON matching the schema. \
         Query: {}\nActors: {:?}\nProcedures: {:?}\nIssues: {:?}\nStatutes: {:?}\n\
         polarity must be one of required|not_required|allowed|refused|dismissed|quashed|unknown.",
        profile.cleaned_query, profile.actors, profile.procedures, profile.issues, profile.statutes
    )
}

fn sketch_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "actors": {"type": "array", "items": {"type": "string"}},
            "proceeding": {"type": "array", "items": {"type": "string"}},
            "outcome": {"type": "array", "items": {"type": "string"}},
            "hooks": {"type": "array", "items": {"type": "string"}},
            "polarity": {"type": "string"},
            "strict_terms": {"type": "array", "items": {"type": "string"}},
            "broad_terms": {"type": "array", "items": {"type": "string"}},
            "court_hint": {"type": "string"}
        },
        "required": ["actors", "hooks", "polarity", "strict_terms"]
    })
}

/// Parse strict JSON first; on failure, fall through to the regex
/// salvage parser (spec §4.4, §9).
fn parse_sketch(raw: &str) -> Option<ReasonerSketch> {
    serde_json::from_str::<ReasonerSketch>(raw)
        .ok()
        .map(validate_sketch)
        .or_else(|| salvage::salvage_sketch(raw).map(validate_sketch))
}

/// Drop non-string/overlong tokens, dedupe, clamp sizes, normalise
/// polarity/court hint, require >=1 strict_term (spec §4.4 "Validation").
const MAX_TOKEN_LEN: usize = 64;
const MAX_LIST_LEN: usize = 12;

fn clamp_list(list: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    list.into_iter()
        .filter(|t| !t.is_empty() && t.len() <= MAX_TOKEN_LEN)
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_LIST_LEN)
        .collect()
}

fn validate_sketch(mut sketch: ReasonerSketch) -> ReasonerSketch {
    sketch.actors = clamp_list(sketch.actors);
    sketch.proceeding = clamp_list(sketch.proceeding);
    sketch.outcome = clamp_list(sketch.outcome);
    sketch.hooks = clamp_list(sketch.hooks);
    sketch.strict_terms = clamp_list(sketch.strict_terms);
    sketch.broad_terms = clamp_list(sketch.broad_terms);
    if sketch.strict_terms.is_empty() {
        sketch.strict_terms = sketch.hooks.first().cloned().into_iter().collect();
    }
    sketch
}

/// Default contradiction terms keyed by polarity (spec §4.4 "Default
/// contradiction terms by polarity").
fn default_contradiction_terms(polarity: Polarity) -> Vec<String> {
    match polarity {
        Polarity::Refused | Polarity::Dismissed => {
            vec!["condoned".into(), "allowed".into(), "restored".into()]
        }
        Polarity::Quashed => vec!["upheld".into(), "restored".into()],
        Polarity::Required => vec!["not required".into()],
        Polarity::NotRequired => vec!["sanction required".into()],
        Polarity::Allowed | Polarity::Unknown => vec![],
    }
}

/// Expand a validated sketch into a [`ReasonerPlan`] (spec §4.4 "Plan
/// expansion from sketch"). Builds hook groups keyed by statutory
/// family and section number (dedup same family+section).
pub fn expand_sketch_to_plan(sketch: &ReasonerSketch, disjunctive: bool) -> ReasonerPlan {
    use crate::legal::{extract_references, ReferenceKind};

    let mut hook_groups: Vec<HookGroup> = Vec::new();
    for hook in &sketch.hooks {
        let refs = extract_references(hook);
        let key = refs
            .iter()
            .find(|r| r.kind == ReferenceKind::Section)
            .map(|r| format!("{}:{}", r.family.clone().unwrap_or_default(), r.number))
            .unwrap_or_else(|| hook.clone());
        if let Some(existing) = hook_groups.iter_mut().find(|g| g.group_id == key) {
            if !existing.terms.contains(hook) {
                existing.terms.push(hook.clone());
            }
        } else {
            let is_statutory = !refs.is_empty();
            hook_groups.push(HookGroup {
                group_id: key,
                terms: vec![hook.clone()],
                min_match: 1,
                // Required for statutory hooks, or the primary hook in
                // non-disjunctive cases (spec §4.4).
                required: is_statutory || (!disjunctive && hook_groups.is_empty()),
            });
        }
    }

    let relations: Vec<Relation> = Vec::new();

    let contradiction_terms = default_contradiction_terms(sketch.polarity);

    let strict_variants: Vec<String> = sketch
        .actors
        .iter()
        .flat_map(|actor| sketch.proceeding.iter().map(move |p| (actor, p)))
        .flat_map(|(actor, proceeding)| {
            sketch.outcome.iter().map(move |outcome| {
                let mut phrase = format!("{actor} {proceeding} {outcome}");
                for hook in &sketch.hooks {
                    phrase.push(' ');
                    phrase.push_str(hook);
                }
                phrase.trim().to_string()
            })
        })
        .take(12)
        .collect();

    let broad_variants: Vec<String> = sketch.broad_terms.iter().take(12).cloned().collect();

    let mut plan = ReasonerPlan {
        proposition: Proposition {
            actors: sketch.actors.clone(),
            proceeding: sketch.proceeding.clone(),
            legal_hooks: sketch.hooks.clone(),
            outcome_required: matches!(sketch.polarity, Polarity::Required),
            outcome_negative: matches!(sketch.polarity, Polarity::Refused | Polarity::Dismissed),
            jurisdiction_hint: sketch.court_hint.clone(),
            hook_groups,
            relations,
            outcome_constraint: OutcomeConstraint {
                polarity: sketch.polarity,
                modality: None,
                terms: sketch.outcome.clone(),
                contradiction_terms,
            },
            interaction_required: sketch.hooks.len() >= 2,
        },
        must_have_terms: sketch.strict_terms.clone(),
        must_not_have_terms: vec![],
        query_variants_strict: strict_variants,
        query_variants_broad: broad_variants,
        case_anchors: sketch.hooks.clone(),
    };

    plan.drop_dangling_relations();
    plan.clamp_min_match();
    plan
}

/// Grounding pass (spec §4.4 "Grounding"): drop outcome constraints
/// lacking polarity evidence, drop hook groups with no overlap with the
/// intent's statutory signals, prune variants referencing dropped terms.
pub fn ground_plan(mut plan: ReasonerPlan, profile: &IntentProfile) -> ReasonerPlan {
    if plan.proposition.outcome_constraint.polarity == Polarity::Unknown
        && plan.proposition.outcome_constraint.terms.is_empty()
    {
        plan.proposition.outcome_constraint.contradiction_terms.clear();
    }

    let statutory_signal: std::collections::HashSet<&str> =
        profile.statutes.iter().map(String::as_str).collect();
    plan.proposition.hook_groups.retain(|g| {
        g.terms
            .iter()
            .any(|t| statutory_signal.iter().any(|s| t.to_lowercase().contains(s)))
            || g.required
    });

    let surviving: std::collections::HashSet<&str> = plan
        .proposition
        .hook_groups
        .iter()
        .flat_map(|g| g.terms.iter().map(String::as_str))
        .collect();
    plan.query_variants_strict
        .retain(|v| surviving.is_empty() || surviving.iter().any(|t| v.contains(t)));

    plan.drop_dangling_relations();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::build_intent_profile;

    #[test]
    fn expands_sketch_with_required_statutory_hook_group() {
        let mut sketch = ReasonerSketch::default();
        sketch.actors = vec!["state".into()];
        sketch.proceeding = vec!["criminal appeal".into()];
        sketch.outcome = vec!["refused".into()];
        sketch.hooks = vec!["section 197 crpc".into()];
        sketch.polarity = Polarity::Refused;
        sketch.strict_terms = vec!["section 197 crpc".into()];

        let plan = expand_sketch_to_plan(&sketch, false);
        assert_eq!(plan.proposition.hook_groups.len(), 1);
        assert!(plan.proposition.hook_groups[0].required);
        assert!(plan.proposition.outcome_constraint.contradiction_terms.contains(&"condoned".to_string()));
    }

    #[test]
    fn grounding_drops_unrelated_hook_groups() {
        let profile = build_intent_profile("state criminal appeal section 197 crpc");
        let mut sketch = ReasonerSketch::default();
        sketch.hooks = vec!["section 9999 unrelated act".into()];
        sketch.strict_terms = vec!["section 9999 unrelated act".into()];
        let plan = expand_sketch_to_plan(&sketch, false);
        let grounded = ground_plan(plan, &profile);
        assert!(grounded.proposition.hook_groups.is_empty());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let profile = build_intent_profile("state criminal appeal section 197 crpc");
        assert_eq!(fingerprint(&profile), fingerprint(&profile));
    }

    fn sample_plan() -> ReasonerPlan {
        let mut sketch = ReasonerSketch::default();
        sketch.actors = vec!["state".into()];
        sketch.proceeding = vec!["criminal appeal".into()];
        sketch.hooks = vec!["section 197 crpc".into()];
        sketch.polarity = Polarity::Refused;
        sketch.strict_terms = vec!["section 197 crpc".into()];
        expand_sketch_to_plan(&sketch, false)
    }

    #[test]
    fn seed_hash_is_deterministic_and_sensitive_to_snippets() {
        let plan = sample_plan();
        let snippets = vec!["sanction for prosecution was held valid".to_string()];
        let other_snippets = vec!["sanction was refused outright".to_string()];
        assert_eq!(seed_hash(&plan, &snippets), seed_hash(&plan, &snippets));
        assert_ne!(seed_hash(&plan, &snippets), seed_hash(&plan, &other_snippets));
    }

    #[test]
    fn refine_prompt_carries_existing_hooks_and_evidence() {
        let plan = sample_plan();
        let snippets = vec!["the sanction order under section 197 crpc was upheld".to_string()];
        let prompt = build_refine_prompt(&plan, &snippets);
        assert!(prompt.contains("section 197 crpc"));
        assert!(prompt.contains("upheld"));
    }
}

//! Deterministic planner and keyword pack (spec §4.3). Always runs,
//! independent of the reasoner — the pipeline's floor under LLM
//! unavailability.

use crate::domain::{dedupe_and_cap, CourtScope, Phase, QueryVariant, RetrievalDirectives, Strictness};
use crate::intent::IntentProfile;

#[derive(Debug, Clone, Default)]
pub struct KeywordPack {
    pub primary: Vec<String>,
    pub legal_signals: Vec<String>,
    pub search_phrases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlannerOutput {
    pub variants: Vec<QueryVariant>,
    pub keyword_pack: KeywordPack,
}

/// High-impact synonym families expanded alongside the literal phrase
/// (spec §4.3 step 3).
fn synonym_expansions(profile: &IntentProfile) -> Vec<String> {
    let mut expansions = Vec::new();
    if profile.issues.iter().any(|i| i == "delay condonation") {
        expansions.push("delay condonation refused".to_string());
        expansions.push("time barred".to_string());
    }
    if profile.issues.iter().any(|i| i == "sanction required") {
        expansions.push("sanction required".to_string());
    }
    if profile.issues.iter().any(|i| i == "sanction not required") {
        expansions.push("sanction not required".to_string());
    }
    expansions
}

fn normalise_phrase(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn make_variant(phase: Phase, phrase: String, priority: i32, purpose: &str) -> QueryVariant {
    let canonical_key = QueryVariant::canonical_key_for(phase, &phrase);
    let tokens = crate::legal::tokenize(&phrase);
    QueryVariant {
        id: uuid::Uuid::new_v4().to_string(),
        phrase,
        phase,
        purpose: purpose.to_string(),
        court_scope: CourtScope::Any,
        strictness: Strictness::Strict,
        tokens,
        canonical_key,
        priority,
        must_include_tokens: vec![],
        must_exclude_tokens: vec![],
        provider_hints: vec![],
        retrieval_directives: RetrievalDirectives::default(),
    }
}

/// Build hook intersections across the top <= 4 statutory hooks
/// (pairwise, with issue/procedure suffixes) (spec §4.3 step 1).
fn hook_intersections(profile: &IntentProfile) -> Vec<String> {
    let hooks: Vec<&String> = profile.statutes.iter().take(4).collect();
    let mut phrases = Vec::new();
    for i in 0..hooks.len() {
        for j in (i + 1)..hooks.len() {
            for issue in profile.issues.iter().chain(profile.procedures.iter()).take(1) {
                phrases.push(normalise_phrase(&[hooks[i], hooks[j], issue]));
            }
            if profile.issues.is_empty() && profile.procedures.is_empty() {
                phrases.push(normalise_phrase(&[hooks[i], hooks[j]]));
            }
        }
    }
    phrases
}

/// For each actor x procedure x (hook|""), and each (outcome x
/// procedure) and (hook x outcome), emit a normalised phrase (spec
/// §4.3 step 2). "outcome" here is sourced from issues, since the
/// deterministic planner has no reasoner-derived outcome terms yet.
fn axis_combinations(profile: &IntentProfile) -> Vec<String> {
    let mut phrases = Vec::new();
    let hooks: Vec<&str> = profile.statutes.iter().map(String::as_str).take(4).collect();
    let outcomes: Vec<&str> = profile.issues.iter().map(String::as_str).collect();

    for actor in &profile.actors {
        for procedure in &profile.procedures {
            if hooks.is_empty() {
                phrases.push(normalise_phrase(&[actor, procedure]));
            }
            for hook in &hooks {
                phrases.push(normalise_phrase(&[actor, procedure, hook]));
            }
        }
    }
    for outcome in &outcomes {
        for procedure in &profile.procedures {
            phrases.push(normalise_phrase(&[outcome, procedure]));
        }
        for hook in &hooks {
            phrases.push(normalise_phrase(&[hook, outcome]));
        }
    }
    phrases
}

fn to_variants(phrases: Vec<String>, phase: Phase, purpose: &str) -> Vec<QueryVariant> {
    let cap = phase.default_cap();
    let mut seen = std::collections::HashSet::new();
    phrases
        .into_iter()
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .take(cap)
        .enumerate()
        .map(|(i, phrase)| make_variant(phase, phrase, 100 - i as i32, purpose))
        .collect()
}

/// Build [`PlannerOutput`] from an [`IntentProfile`] (spec §4.3).
pub fn build_planner_output(profile: &IntentProfile) -> PlannerOutput {
    let intersections = hook_intersections(profile);
    let axes = axis_combinations(profile);
    let synonyms = synonym_expansions(profile);

    let mut variants = Vec::new();
    variants.extend(to_variants(intersections.clone(), Phase::Primary, "hook_intersection"));
    variants.extend(to_variants(axes.clone(), Phase::Fallback, "axis_combination"));
    variants.extend(to_variants(synonyms.clone(), Phase::Rescue, "synonym_expansion"));
    variants.extend(to_variants(
        profile.anchors.clone(),
        Phase::Micro,
        "anchor_phrase",
    ));
    variants.extend(to_variants(
        vec![profile.cleaned_query.clone()],
        Phase::Revolving,
        "full_query",
    ));
    variants.extend(to_variants(
        profile.procedures.clone(),
        Phase::Browse,
        "procedure_browse",
    ));

    let variants = dedupe_and_cap(variants);

    let keyword_pack = KeywordPack {
        primary: profile.anchors.clone(),
        legal_signals: profile.statutes.clone(),
        search_phrases: intersections.into_iter().chain(axes).chain(synonyms).collect(),
    };

    PlannerOutput {
        variants,
        keyword_pack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::build_intent_profile;

    #[test]
    fn produces_variants_across_multiple_phases() {
        let profile = build_intent_profile(
            "state criminal appeal, section 197 crpc and section 19 pc act interaction, delay condonation refused",
        );
        let output = build_planner_output(&profile);
        assert!(!output.variants.is_empty());
        assert!(output.variants.iter().any(|v| v.phase == Phase::Primary));
        assert!(output.keyword_pack.legal_signals.iter().any(|s| s == "crpc"));
    }

    #[test]
    fn respects_phase_caps() {
        let profile = build_intent_profile(
            "state criminal appeal, section 197 crpc and section 19 pc act interaction, delay condonation refused",
        );
        let output = build_planner_output(&profile);
        let primary_count = output.variants.iter().filter(|v| v.phase == Phase::Primary).count();
        assert!(primary_count <= Phase::Primary.default_cap());
    }
}

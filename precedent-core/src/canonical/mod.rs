//! Canonical intent and query rewrite (spec §4.5).

use std::collections::HashSet;

use crate::domain::{
    dedupe_and_cap, CanonicalHookGroup, CanonicalIntent, CourtScope, DoctypeProfile, Phase, Polarity,
    QueryVariant, ReasonerPlan, RetrievalDirectives, Strictness,
};
use crate::intent::{CourtHint, IntentProfile};
use crate::legal::{extract_references, transition_aliases, ReferenceKind};

const DISPOSITION_VERBS: &[(&str, Polarity)] = &[
    ("refused", Polarity::Refused),
    ("dismissed", Polarity::Dismissed),
    ("quashed", Polarity::Quashed),
    ("condoned", Polarity::Allowed),
];

const OPEN_ENDED_MARKERS: &[&str] = &["whether", "can", "could", "if"];
const DISPOSITION_QUESTION_VERBS: &[&str] = &["condone", "quash", "dismiss", "refuse"];

/// Framings where a disposition verb governs an interlocutory step (not
/// the case's own outcome) and so carries no polarity of its own — "the
/// High Court refused to interfere" affirms the order under challenge,
/// it does not mean the disposition itself was refused.
const NON_DISPOSITIVE_FRAMINGS: &[&str] = &[
    "refused to interfere",
    "declined to interfere",
    "failed to interfere",
];

/// Parse the cleaned query for explicit disposition verbs; open-ended
/// questions without one, and narrated "refused/declined to interfere"
/// framings that describe an interlocutory step rather than the case's
/// own disposition, keep polarity `unknown` (spec §3 invariant, §4.5,
/// §8 property 3).
fn parse_polarity_from_query(cleaned_query: &str) -> Polarity {
    let is_open_ended = OPEN_ENDED_MARKERS.iter().any(|m| cleaned_query.contains(m))
        && DISPOSITION_QUESTION_VERBS.iter().any(|v| cleaned_query.contains(v));
    if is_open_ended {
        return Polarity::Unknown;
    }
    if NON_DISPOSITIVE_FRAMINGS.iter().any(|f| cleaned_query.contains(f)) {
        return Polarity::Unknown;
    }
    for (verb, polarity) in DISPOSITION_VERBS {
        if cleaned_query.contains(verb) {
            return *polarity;
        }
    }
    Polarity::Unknown
}

/// Derive statutory hook groups directly from references found in the
/// cleaned query, independent of any reasoner plan (spec §4.5, §4.9) —
/// so the proposition gate and hook-coverage scoring still have
/// something to check against when the reasoner is disabled, circuit-
/// broken, or simply produced no sketch.
fn deterministic_hook_groups(cleaned_query: &str, disjunctive_query: bool) -> Vec<CanonicalHookGroup> {
    let mut groups: Vec<CanonicalHookGroup> = Vec::new();
    for reference in extract_references(cleaned_query) {
        let (family, section_number) = match reference.kind {
            ReferenceKind::Section => (reference.family.clone().unwrap_or_default(), Some(reference.number.clone())),
            ReferenceKind::Article => ("article".to_string(), Some(reference.number.clone())),
            ReferenceKind::Act => (reference.family.clone().unwrap_or_default(), None),
        };
        let group_id = format!("{family}:{}", section_number.clone().unwrap_or_default());
        if let Some(existing) = groups.iter_mut().find(|g| g.group_id == group_id) {
            if !existing.terms.contains(&reference.raw) {
                existing.terms.push(reference.raw);
            }
            continue;
        }
        groups.push(CanonicalHookGroup {
            group_id,
            family,
            section_number,
            terms: vec![reference.raw],
            min_match: 1,
            required: true,
        });
    }
    if disjunctive_query && groups.len() > 2 {
        groups.truncate(2);
    }
    groups
}

fn default_contradiction_terms(polarity: Polarity) -> Vec<String> {
    match polarity {
        Polarity::Refused | Polarity::Dismissed => {
            vec!["condoned".into(), "allowed".into(), "restored".into()]
        }
        Polarity::Quashed => vec!["upheld".into()],
        _ => vec![],
    }
}

fn has_delay_condonation_context(profile: &IntentProfile) -> bool {
    profile.issues.iter().any(|i| i == "delay condonation" || i == "time barred")
}

fn merge_unique(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for item in b {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Build a [`CanonicalIntent`] by merging an [`IntentProfile`] with an
/// optional [`ReasonerPlan`] (spec §4.5). Deterministic and idempotent
/// for the same inputs (spec §8 property 1).
pub fn build_canonical_intent(profile: &IntentProfile, plan: Option<&ReasonerPlan>) -> CanonicalIntent {
    let reasoner_actors = plan.map(|p| p.proposition.actors.as_slice()).unwrap_or(&[]);
    let reasoner_proceedings = plan.map(|p| p.proposition.proceeding.as_slice()).unwrap_or(&[]);
    let reasoner_hooks = plan.map(|p| p.proposition.legal_hooks.as_slice()).unwrap_or(&[]);

    let actors = merge_unique(&profile.actors, reasoner_actors);
    let proceedings = merge_unique(&profile.procedures, reasoner_proceedings);
    let legal_hooks = merge_unique(&profile.statutes, reasoner_hooks);

    let mut outcomes: Vec<String> = plan
        .map(|p| p.proposition.outcome_constraint.terms.clone())
        .unwrap_or_default();
    if !has_delay_condonation_context(profile) {
        outcomes.retain(|t| !t.contains("condon"));
    }

    let outcome_polarity = plan
        .map(|p| p.proposition.outcome_constraint.polarity)
        .filter(|p| *p != Polarity::Unknown)
        .unwrap_or_else(|| parse_polarity_from_query(&profile.cleaned_query));

    let mut contradiction_terms = plan
        .map(|p| p.proposition.outcome_constraint.contradiction_terms.clone())
        .unwrap_or_default();
    for term in default_contradiction_terms(outcome_polarity) {
        if !contradiction_terms.contains(&term) {
            contradiction_terms.push(term);
        }
    }

    let disjunctive_query = profile.cleaned_query.contains(" or ");

    // The deterministic base always runs so the proposition gate and
    // hook-coverage scoring have statutory hooks to check even when the
    // reasoner never produced a plan; the plan, when present, only
    // augments required/min_match metadata and contributes terms for
    // hooks it found that the deterministic pass didn't.
    let mut hook_groups: Vec<CanonicalHookGroup> = deterministic_hook_groups(&profile.cleaned_query, disjunctive_query);
    if let Some(plan) = plan {
        for group in &plan.proposition.hook_groups {
            let section_number = group
                .group_id
                .split(':')
                .nth(1)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let family = group.group_id.split(':').next().unwrap_or_default().to_string();
            let key = (family.clone(), section_number.clone());
            if let Some(existing) = hook_groups
                .iter_mut()
                .find(|g| (g.family.clone(), g.section_number.clone()) == key)
            {
                existing.required = existing.required || group.required;
                existing.min_match = existing.min_match.max(group.min_match);
                for term in &group.terms {
                    if !existing.terms.contains(term) {
                        existing.terms.push(term.clone());
                    }
                }
                continue;
            }
            hook_groups.push(CanonicalHookGroup {
                group_id: group.group_id.clone(),
                family,
                section_number,
                terms: group.terms.clone(),
                min_match: group.min_match,
                required: group.required,
            });
        }
    }
    if disjunctive_query && hook_groups.len() > 2 {
        hook_groups.truncate(2);
    }

    let must_include_tokens: Vec<String> = legal_hooks.clone();
    let must_exclude_tokens: Vec<String> = contradiction_terms
        .iter()
        .filter(|t| t.split_whitespace().count() > 1 || matches!(t.as_str(), "refused" | "condoned" | "allowed" | "restored"))
        .cloned()
        .collect();

    let doctype_profile = match profile.court_hint {
        CourtHint::SupremeCourt => DoctypeProfile::SupremeCourt,
        CourtHint::HighCourt => DoctypeProfile::HighCourts,
        CourtHint::Any => DoctypeProfile::JudgmentsScHcTribunal,
    };
    let court_scope = match profile.court_hint {
        CourtHint::SupremeCourt => CourtScope::SupremeCourt,
        CourtHint::HighCourt => CourtScope::HighCourt,
        CourtHint::Any => CourtScope::Any,
    };

    let transition_alias_terms: Vec<String> = legal_hooks
        .iter()
        .flat_map(|h| transition_aliases(h))
        .map(str::to_string)
        .collect();

    CanonicalIntent {
        actors,
        proceedings,
        outcomes,
        legal_hooks,
        hook_groups,
        outcome_polarity,
        contradiction_terms,
        doctype_profile,
        court_scope,
        date_window: profile.date_window.clone(),
        must_include_tokens,
        must_exclude_tokens,
        canonical_order_terms: profile.anchors.clone(),
        disjunctive_query,
        soft_hint_terms: profile.issues.clone(),
        notification_terms: vec![],
        transition_aliases: transition_alias_terms,
    }
}

fn variant(
    phase: Phase,
    phrase: String,
    strictness: Strictness,
    court_scope: CourtScope,
    mode: crate::domain::variant::QueryMode,
    priority: i32,
) -> QueryVariant {
    let canonical_key = QueryVariant::canonical_key_for(phase, &phrase);
    QueryVariant {
        id: uuid::Uuid::new_v4().to_string(),
        phrase: phrase.clone(),
        phase,
        purpose: format!("{mode:?}").to_lowercase(),
        court_scope,
        strictness,
        tokens: crate::legal::tokenize(&phrase),
        canonical_key,
        priority,
        must_include_tokens: vec![],
        must_exclude_tokens: vec![],
        provider_hints: vec![],
        retrieval_directives: RetrievalDirectives {
            query_mode: Some(mode),
            doctype_profile: "any".into(),
            ..Default::default()
        },
    }
}

/// Whether contradiction exclusions should apply for a precision variant
/// (spec §3 invariant 3).
fn should_apply_contradiction_exclusions(intent: &CanonicalIntent, profile: &IntentProfile) -> bool {
    if intent.outcome_polarity == Polarity::Unknown {
        return false;
    }
    if matches!(intent.outcome_polarity, Polarity::Dismissed | Polarity::Refused) {
        return has_delay_condonation_context(profile);
    }
    true
}

/// Synthesise 1..=40 [`QueryVariant`]s across three lanes (spec §4.5).
pub fn synthesize_retrieval_queries(
    intent: &CanonicalIntent,
    profile: &IntentProfile,
    keyword_pack_search_phrases: &[String],
) -> Vec<QueryVariant> {
    use crate::domain::variant::QueryMode;

    let required_groups: Vec<&CanonicalHookGroup> = intent.hook_groups.iter().filter(|g| g.required).collect();
    let apply_exclusions = should_apply_contradiction_exclusions(intent, profile);

    let mut strict_phrases: Vec<String> = Vec::new();
    for actor in &intent.actors {
        for proceeding in &intent.proceedings {
            let hook_phrase = required_groups
                .first()
                .and_then(|g| g.terms.first())
                .cloned()
                .unwrap_or_default();
            for outcome in intent.outcomes.iter().chain(std::iter::once(&String::new())) {
                let phrase = [actor.as_str(), proceeding.as_str(), hook_phrase.as_str(), outcome.as_str()]
                    .iter()
                    .filter(|p| !p.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !phrase.is_empty() {
                    strict_phrases.push(phrase);
                }
            }
        }
    }

    // Filter so every required group's terms appear when multiple are
    // required (spec §3 invariant 2, §4.5).
    if required_groups.len() >= 2 && !intent.disjunctive_query {
        strict_phrases.retain(|phrase| {
            required_groups
                .iter()
                .all(|g| g.terms.iter().any(|t| phrase.contains(t.as_str())))
        });
    }
    if strict_phrases.is_empty() {
        strict_phrases = keyword_pack_search_phrases.iter().take(4).cloned().collect();
    }

    let mut broad_phrases: Vec<String> = keyword_pack_search_phrases.to_vec();
    broad_phrases.extend(intent.transition_aliases.clone());

    let mut variants = Vec::new();
    for phrase in strict_phrases.iter().take(8) {
        let mut v = variant(
            Phase::Primary,
            phrase.clone(),
            Strictness::Strict,
            intent.court_scope,
            QueryMode::Precision,
            90,
        );
        v.must_include_tokens = intent
            .must_include_tokens
            .iter()
            .filter(|t| phrase.contains(t.as_str()))
            .cloned()
            .collect();
        v.retrieval_directives.apply_contradiction_exclusions = apply_exclusions;
        if apply_exclusions {
            v.must_exclude_tokens = intent.must_exclude_tokens.clone();
        }
        variants.push(v);
    }

    for (i, phrase) in broad_phrases.iter().take(8).enumerate() {
        let strictness = if i < 4 { Strictness::Strict } else { Strictness::Relaxed };
        variants.push(variant(
            Phase::Fallback,
            phrase.clone(),
            strictness,
            CourtScope::Any,
            QueryMode::Context,
            70 - i as i32,
        ));
    }

    for (i, phrase) in broad_phrases.iter().skip(8).take(12).enumerate() {
        variants.push(variant(
            Phase::Rescue,
            phrase.clone(),
            Strictness::Relaxed,
            CourtScope::Any,
            QueryMode::Expansion,
            40 - i as i32,
        ));
    }

    for v in &mut variants {
        v.must_include_tokens.retain(|t| intent.must_include_tokens.contains(t));
    }

    dedupe_and_cap(variants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::build_intent_profile;

    #[test]
    fn open_ended_question_stays_unknown_polarity() {
        let profile = build_intent_profile(
            "Can delay in filing a criminal appeal by the State be condoned under Section 5 of the Limitation Act when the appeal against acquittal is filed late?",
        );
        let intent = build_canonical_intent(&profile, None);
        assert_eq!(intent.outcome_polarity, Polarity::Unknown);
    }

    #[test]
    fn is_deterministic_and_idempotent() {
        let profile = build_intent_profile("state criminal appeal section 197 crpc delay condonation refused");
        let a = build_canonical_intent(&profile, None);
        let b = build_canonical_intent(&profile, None);
        assert_eq!(a.outcome_polarity, b.outcome_polarity);
        assert_eq!(a.legal_hooks, b.legal_hooks);
        assert_eq!(a.must_include_tokens, b.must_include_tokens);
    }

    #[test]
    fn no_contradiction_exclusions_without_polarity_evidence() {
        let profile = build_intent_profile(
            "Cases where the State challenged a discharge order and the High Court refused to interfere and upheld the discharge.",
        );
        let intent = build_canonical_intent(&profile, None);
        assert_eq!(intent.outcome_polarity, Polarity::Unknown);
        let keyword_pack = vec!["discharge order high court".to_string()];
        let variants = synthesize_retrieval_queries(&intent, &profile, &keyword_pack);
        for v in variants.iter().filter(|v| matches!(v.retrieval_directives.query_mode, Some(crate::domain::variant::QueryMode::Precision))) {
            assert!(!v.retrieval_directives.apply_contradiction_exclusions);
        }
    }

    #[test]
    fn hook_groups_are_derived_without_a_reasoner_plan() {
        let profile = build_intent_profile("state criminal appeal section 197 crpc delay condonation refused");
        let intent = build_canonical_intent(&profile, None);
        assert!(!intent.hook_groups.is_empty());
        assert!(intent.hook_groups.iter().any(|g| g.family == "crpc" && g.required));
    }

    #[test]
    fn reasoner_plan_augments_rather_than_replaces_hook_groups() {
        use crate::domain::{HookGroup, OutcomeConstraint, Proposition};

        let profile = build_intent_profile("state criminal appeal section 197 crpc sanction refused");
        let plan = ReasonerPlan {
            proposition: Proposition {
                actors: vec![],
                proceeding: vec![],
                legal_hooks: vec![],
                outcome_required: false,
                outcome_negative: false,
                jurisdiction_hint: None,
                hook_groups: vec![HookGroup {
                    group_id: "crpc:197".into(),
                    terms: vec!["sanction for prosecution".into()],
                    min_match: 2,
                    required: true,
                }],
                relations: vec![],
                outcome_constraint: OutcomeConstraint::default(),
                interaction_required: false,
            },
            must_have_terms: vec![],
            must_not_have_terms: vec![],
            query_variants_strict: vec![],
            query_variants_broad: vec![],
            case_anchors: vec![],
        };
        let intent = build_canonical_intent(&profile, Some(&plan));
        let group = intent.hook_groups.iter().find(|g| g.group_id == "crpc:197").unwrap();
        assert_eq!(group.min_match, 2);
        assert!(group.terms.iter().any(|t| t.contains("section 197")));
        assert!(group.terms.iter().any(|t| t.contains("sanction for prosecution")));
    }
}

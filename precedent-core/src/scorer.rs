//! Scorer and diversifier (spec §4.9).

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::domain::reasoner::Polarity;
use crate::domain::{CanonicalIntent, CaseCandidate, ConfidenceBand, RetrievalTier, ScoredCase};
use crate::intent::IntentProfile;

const ANCHOR_WEIGHT: f64 = 0.25;
const ISSUE_WEIGHT: f64 = 0.15;
const PROCEDURE_WEIGHT: f64 = 0.15;
const HOOK_COVERAGE_WEIGHT: f64 = 0.25;
const OUTCOME_ALIGNMENT_WEIGHT: f64 = 0.15;
const RERANK_WEIGHT: f64 = 0.05;
const CONTRADICTION_PENALTY: f64 = 0.3;
const POLARITY_MISMATCH_PENALTY: f64 = 0.2;

fn token_coverage(text: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let hits = terms.iter().filter(|t| lower.contains(&t.to_lowercase())).count();
    hits as f64 / terms.len() as f64
}

fn hook_group_coverage(detail_text: &str, intent: &CanonicalIntent) -> f64 {
    if intent.hook_groups.is_empty() {
        return 0.0;
    }
    let lower = detail_text.to_lowercase();
    let satisfied = intent
        .hook_groups
        .iter()
        .filter(|g| {
            let hits = g.terms.iter().filter(|t| lower.contains(&t.to_lowercase())).count();
            hits as u32 >= g.min_match
        })
        .count();
    satisfied as f64 / intent.hook_groups.len() as f64
}

fn outcome_alignment(detail_text: &str, intent: &CanonicalIntent) -> f64 {
    match intent.outcome_polarity {
        Polarity::Unknown => 0.0,
        polarity => {
            let word = format!("{polarity:?}").to_lowercase();
            if detail_text.to_lowercase().contains(&word) {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn polarity_mismatch(detail_text: &str, intent: &CanonicalIntent) -> bool {
    if intent.outcome_polarity == Polarity::Unknown {
        return false;
    }
    let lower = detail_text.to_lowercase();
    intent
        .contradiction_terms
        .iter()
        .any(|t| lower.contains(&t.to_lowercase()))
}

/// Score a hydrated candidate in `[0,1]` (spec §4.9).
pub fn score_candidate(
    candidate: &CaseCandidate,
    intent: &CanonicalIntent,
    profile: &IntentProfile,
    retrieval_tier: RetrievalTier,
    exploratory_confidence_cap: f64,
) -> ScoredCase {
    let detail_text = candidate.detail_text.as_deref().unwrap_or(&candidate.snippet);

    let anchor_score = token_coverage(detail_text, &profile.anchors);
    let issue_score = token_coverage(detail_text, &profile.issues);
    let procedure_score = token_coverage(detail_text, &profile.procedures);
    let hook_score = hook_group_coverage(detail_text, intent);
    let outcome_score = outcome_alignment(detail_text, intent);
    let rerank_score = candidate.retrieval.rerank_score.unwrap_or(0.0);

    let mut score = anchor_score * ANCHOR_WEIGHT
        + issue_score * ISSUE_WEIGHT
        + procedure_score * PROCEDURE_WEIGHT
        + hook_score * HOOK_COVERAGE_WEIGHT
        + outcome_score * OUTCOME_ALIGNMENT_WEIGHT
        + rerank_score * RERANK_WEIGHT;

    let mut match_evidence = Vec::new();
    if anchor_score > 0.0 {
        match_evidence.push(format!("anchor_coverage={anchor_score:.2}"));
    }
    if hook_score > 0.0 {
        match_evidence.push(format!("hook_coverage={hook_score:.2}"));
    }

    if has_contradiction_term(detail_text, intent) {
        score -= CONTRADICTION_PENALTY;
        match_evidence.push("contradiction_term_present".to_string());
    }
    if polarity_mismatch(detail_text, intent) {
        score -= POLARITY_MISMATCH_PENALTY;
        match_evidence.push("polarity_mismatch".to_string());
    }

    let mut score = score.clamp(0.0, 1.0);
    if retrieval_tier == RetrievalTier::Exploratory {
        score = score.min(exploratory_confidence_cap);
    }

    ScoredCase {
        candidate: candidate.clone(),
        score,
        confidence_score: score,
        confidence_band: ConfidenceBand::from_score(score),
        retrieval_tier,
        missing_elements: vec![],
        gap_summary: None,
        match_evidence,
    }
}

fn has_contradiction_term(detail_text: &str, intent: &CanonicalIntent) -> bool {
    let lower = detail_text.to_lowercase();
    intent.contradiction_terms.iter().any(|t| lower.contains(&t.to_lowercase()))
}

/// `title+court+date` fingerprint used by the diversifier (spec §4.9).
fn fingerprint(case: &ScoredCase) -> String {
    let mut hasher = Sha256::new();
    hasher.update(case.candidate.title.to_lowercase().as_bytes());
    hasher.update(format!("{:?}", case.candidate.court).as_bytes());
    hasher.update(case.candidate.court_text.as_deref().unwrap_or("").as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn court_day_key(case: &ScoredCase) -> String {
    format!("{:?}:{}", case.candidate.court, case.candidate.court_text.clone().unwrap_or_default())
}

/// Enforce `maxPerFingerprint` and `maxPerCourtDay` after scoring (spec
/// §4.9), preserving score order.
pub fn diversify(mut cases: Vec<ScoredCase>, max_per_fingerprint: usize, max_per_court_day: usize) -> Vec<ScoredCase> {
    cases.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut per_fingerprint: HashMap<String, usize> = HashMap::new();
    let mut per_court_day: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::new();

    for case in cases {
        let fp = fingerprint(&case);
        let cd = court_day_key(&case);
        let fp_count = per_fingerprint.get(&fp).copied().unwrap_or(0);
        let cd_count = per_court_day.get(&cd).copied().unwrap_or(0);
        if fp_count >= max_per_fingerprint || cd_count >= max_per_court_day {
            continue;
        }
        per_fingerprint.insert(fp, fp_count + 1);
        per_court_day.insert(cd, cd_count + 1);
        kept.push(case);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::canonical::{CanonicalHookGroup, CourtScope, DoctypeProfile};
    use crate::domain::{Classification, Court, RetrievalMeta};
    use crate::intent::DateWindow;

    fn candidate(title: &str, detail_text: &str) -> CaseCandidate {
        CaseCandidate {
            source: "lexical_api".into(),
            title: title.into(),
            url: format!("https://example.test/{title}"),
            snippet: String::new(),
            court: Court::HighCourt,
            court_text: Some("2024-01-01".into()),
            cites_count: None,
            cited_by_count: None,
            author: None,
            bench: None,
            full_document_url: None,
            detail_text: Some(detail_text.into()),
            detail_artifact: None,
            evidence_quality: None,
            detail_hydration: None,
            classification: Some(Classification::Case),
            retrieval: RetrievalMeta::default(),
        }
    }

    fn intent() -> CanonicalIntent {
        CanonicalIntent {
            actors: vec!["state".into()],
            proceedings: vec!["appeal".into()],
            outcomes: vec![],
            legal_hooks: vec!["section 197".into()],
            hook_groups: vec![CanonicalHookGroup {
                group_id: "crpc:197".into(),
                family: "crpc".into(),
                section_number: Some("197".into()),
                terms: vec!["section 197".into()],
                min_match: 1,
                required: true,
            }],
            outcome_polarity: Polarity::Dismissed,
            contradiction_terms: vec!["condoned".into()],
            doctype_profile: DoctypeProfile::Any,
            court_scope: CourtScope::Any,
            date_window: DateWindow::default(),
            must_include_tokens: vec![],
            must_exclude_tokens: vec![],
            canonical_order_terms: vec![],
            disjunctive_query: false,
            soft_hint_terms: vec![],
            notification_terms: vec![],
            transition_aliases: vec![],
        }
    }

    fn profile() -> IntentProfile {
        crate::intent::build_intent_profile("state criminal appeal section 197 crpc dismissed")
    }

    #[test]
    fn contradiction_term_reduces_score() {
        let intent = intent();
        let profile = profile();
        let clean = score_candidate(&candidate("A", "section 197 considered, appeal dismissed"), &intent, &profile, RetrievalTier::ExactStrict, 0.55);
        let contradicted = score_candidate(&candidate("B", "section 197 considered, appeal dismissed but delay condoned"), &intent, &profile, RetrievalTier::ExactStrict, 0.55);
        assert!(contradicted.score < clean.score);
    }

    #[test]
    fn exploratory_tier_is_capped() {
        let intent = intent();
        let profile = profile();
        let scored = score_candidate(
            &candidate("A", "section 197 considered, appeal dismissed strongly aligned with every anchor"),
            &intent,
            &profile,
            RetrievalTier::Exploratory,
            0.55,
        );
        assert!(scored.score <= 0.55);
    }

    #[test]
    fn diversifier_caps_per_fingerprint_and_court_day() {
        let intent = intent();
        let profile = profile();
        let cases: Vec<ScoredCase> = (0..5)
            .map(|i| score_candidate(&candidate(&format!("Same Title {i}"), "section 197"), &intent, &profile, RetrievalTier::ExactStrict, 0.55))
            .map(|mut c| {
                c.candidate.title = "Same Title".to_string();
                c
            })
            .collect();
        let diversified = diversify(cases, 2, 2);
        assert!(diversified.len() <= 2);
    }
}

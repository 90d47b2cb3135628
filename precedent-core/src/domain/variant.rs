//! QueryVariant and its phase/strictness/retrieval-directive types
//! (spec §3).

use serde::{Deserialize, Serialize};

use crate::domain::canonical::CourtScope;

/// Cap on variants emitted per request (spec §3, §4.5: "Cap at 40 variants").
pub const MAX_VARIANTS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Primary,
    Fallback,
    Rescue,
    Micro,
    Revolving,
    Browse,
}

impl Phase {
    /// Default per-phase cap from the planner algorithm (spec §4.3 step 4).
    pub fn default_cap(self) -> usize {
        match self {
            Phase::Primary => 2,
            Phase::Fallback => 2,
            Phase::Rescue => 1,
            Phase::Micro => 1,
            Phase::Revolving => 1,
            Phase::Browse => 1,
        }
    }

    /// Ordering guarantee (spec §5): primary -> fallback -> rescue ->
    /// micro -> revolving -> browse.
    pub fn order(self) -> u8 {
        match self {
            Phase::Primary => 0,
            Phase::Fallback => 1,
            Phase::Rescue => 2,
            Phase::Micro => 3,
            Phase::Revolving => 4,
            Phase::Browse => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strictness {
    Strict,
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    Precision,
    Context,
    Expansion,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalDirectives {
    pub query_mode: Option<QueryMode>,
    pub doctype_profile: String,
    pub title_terms: Vec<String>,
    pub cite_terms: Vec<String>,
    pub author_terms: Vec<String>,
    pub bench_terms: Vec<String>,
    pub category_expansions: Vec<String>,
    pub apply_contradiction_exclusions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryVariant {
    pub id: String,
    pub phrase: String,
    pub phase: Phase,
    pub purpose: String,
    pub court_scope: CourtScope,
    pub strictness: Strictness,
    pub tokens: Vec<String>,
    pub canonical_key: String,
    pub priority: i32,
    pub must_include_tokens: Vec<String>,
    pub must_exclude_tokens: Vec<String>,
    pub provider_hints: Vec<String>,
    pub retrieval_directives: RetrievalDirectives,
}

impl QueryVariant {
    pub fn canonical_key_for(phase: Phase, phrase: &str) -> String {
        format!("{phase:?}:{}", phrase.trim().to_lowercase())
    }
}

/// De-duplicate by `(phase, phrase)` and cap at [`MAX_VARIANTS`] (spec §4.5).
pub fn dedupe_and_cap(mut variants: Vec<QueryVariant>) -> Vec<QueryVariant> {
    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.canonical_key.clone()));
    variants.sort_by_key(|v| (v.phase.order(), -v.priority));
    variants.truncate(MAX_VARIANTS);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(phase: Phase, phrase: &str, priority: i32) -> QueryVariant {
        QueryVariant {
            id: format!("{phrase}-{priority}"),
            phrase: phrase.to_string(),
            phase,
            purpose: "test".into(),
            court_scope: CourtScope::Any,
            strictness: Strictness::Strict,
            tokens: vec![],
            canonical_key: QueryVariant::canonical_key_for(phase, phrase),
            priority,
            must_include_tokens: vec![],
            must_exclude_tokens: vec![],
            provider_hints: vec![],
            retrieval_directives: RetrievalDirectives::default(),
        }
    }

    #[test]
    fn dedupes_by_phase_and_phrase() {
        let variants = vec![
            variant(Phase::Primary, "state appeal", 1),
            variant(Phase::Primary, "state appeal", 2),
            variant(Phase::Fallback, "state appeal", 1),
        ];
        let deduped = dedupe_and_cap(variants);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn caps_at_max_variants() {
        let variants: Vec<_> = (0..60)
            .map(|i| variant(Phase::Browse, &format!("phrase {i}"), i))
            .collect();
        assert_eq!(dedupe_and_cap(variants).len(), MAX_VARIANTS);
    }

    #[test]
    fn orders_primary_before_browse() {
        let variants = vec![
            variant(Phase::Browse, "b", 1),
            variant(Phase::Primary, "a", 1),
        ];
        let ordered = dedupe_and_cap(variants);
        assert_eq!(ordered[0].phase, Phase::Primary);
    }
}

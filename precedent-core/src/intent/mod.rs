//! Intent extraction (spec §4.2): turns a raw query into an
//! [`IntentProfile`] by cleaning the text, matching closed-set
//! dictionaries, extracting statutory references, inferring a court
//! hint, and building bounded anchors.

use serde::{Deserialize, Serialize};

use crate::legal::{
    clean_query, dictionaries, extract_references, tokenize, transition_aliases, ReferenceKind,
};

/// Bound on the anchors list (spec §4.2: "truncated to a bounded size").
pub const MAX_ANCHORS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourtHint {
    #[serde(rename = "SC")]
    SupremeCourt,
    #[serde(rename = "HC")]
    HighCourt,
    #[serde(rename = "ANY")]
    Any,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    pub person: Vec<String>,
    pub org: Vec<String>,
    pub statute: Vec<String>,
    pub section: Vec<String>,
    pub case_citation: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalIntent {
    pub citation_hints: Vec<String>,
    pub judge_hints: Vec<String>,
    pub doctype_profile: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateWindow {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

/// Immutable once built; every downstream stage reads from this without
/// mutating it (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentProfile {
    pub cleaned_query: String,
    pub domains: Vec<String>,
    pub issues: Vec<String>,
    pub procedures: Vec<String>,
    pub actors: Vec<String>,
    pub statutes: Vec<String>,
    pub anchors: Vec<String>,
    pub entities: Entities,
    pub retrieval_intent: RetrievalIntent,
    pub date_window: DateWindow,
    pub court_hint: CourtHint,
}

fn infer_court_hint(cleaned: &str) -> CourtHint {
    if cleaned.contains("supreme court") || cleaned.contains(" sc ") || cleaned.ends_with(" sc") {
        CourtHint::SupremeCourt
    } else if cleaned.contains("high court") || cleaned.contains(" hc ") {
        CourtHint::HighCourt
    } else {
        CourtHint::Any
    }
}

/// Build an [`IntentProfile`] from a raw query string (spec §4.2).
pub fn build_intent_profile(raw_query: &str) -> IntentProfile {
    let cleaned_query = clean_query(raw_query);
    let actors = dictionaries::match_actors(&cleaned_query);
    let procedures = dictionaries::match_procedures(&cleaned_query);
    let issues = dictionaries::match_issues(&cleaned_query);
    let refs = extract_references(&cleaned_query);

    let mut statutes = Vec::new();
    let mut sections = Vec::new();
    for r in &refs {
        match r.kind {
            ReferenceKind::Section => {
                sections.push(r.raw.clone());
                if let Some(family) = &r.family {
                    statutes.push(family.clone());
                    for alias in transition_aliases(family) {
                        if !statutes.contains(&alias.to_string()) {
                            statutes.push(alias.to_string());
                        }
                    }
                }
            }
            ReferenceKind::Act => statutes.push(r.raw.clone()),
            ReferenceKind::Article => sections.push(r.raw.clone()),
        }
    }
    statutes.dedup();
    sections.dedup();

    let court_hint = infer_court_hint(&cleaned_query);

    let mut anchors: Vec<String> = Vec::new();
    for group in [&statutes, &procedures, &actors, &issues] {
        for term in group {
            if !anchors.contains(term) {
                anchors.push(term.clone());
            }
        }
    }
    anchors.truncate(MAX_ANCHORS);

    let domains = if statutes.iter().any(|s| s.contains("ipc") || s.contains("crpc") || s.contains("bns")) {
        vec!["criminal".to_string()]
    } else {
        vec!["general".to_string()]
    };

    IntentProfile {
        cleaned_query,
        domains,
        issues,
        procedures,
        actors,
        statutes,
        anchors,
        entities: Entities {
            section: sections,
            ..Default::default()
        },
        retrieval_intent: RetrievalIntent {
            doctype_profile: "any".to_string(),
            ..Default::default()
        },
        date_window: DateWindow::default(),
        court_hint,
    }
}

/// Word tokens of the cleaned query, exposed for the planner and scorer.
pub fn query_tokens(profile: &IntentProfile) -> Vec<String> {
    tokenize(&profile.cleaned_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_actors_procedures_and_statutes() {
        let profile = build_intent_profile(
            "Cases where the state criminal appeal, section 197 crpc and section 19 pc act interaction, delay condonation refused",
        );
        assert!(profile.actors.contains(&"state".to_string()));
        assert!(profile.procedures.contains(&"criminal appeal".to_string()));
        assert!(profile.issues.contains(&"delay condonation".to_string()));
        assert!(profile.statutes.iter().any(|s| s == "crpc"));
        assert!(profile.statutes.iter().any(|s| s == "bnss"));
    }

    #[test]
    fn defaults_to_any_court_hint() {
        let profile = build_intent_profile("delay condonation under limitation act");
        assert_eq!(profile.court_hint, CourtHint::Any);
    }

    #[test]
    fn infers_high_court_hint() {
        let profile = build_intent_profile("the high court refused to interfere with the discharge order");
        assert_eq!(profile.court_hint, CourtHint::HighCourt);
    }

    #[test]
    fn anchors_are_bounded() {
        let profile = build_intent_profile(
            "section 1 section 2 section 3 section 4 section 5 section 6 section 7 section 8 section 9 section 10 section 11 section 12 section 13 section 14 section 15 section 16 section 17 section 18 section 19 section 20 section 21 section 22 section 23 section 24 section 25 section 26",
        );
        assert!(profile.anchors.len() <= MAX_ANCHORS);
    }
}

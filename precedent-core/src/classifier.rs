//! Case/statute/other classifier (spec §4.8): title+snippet heuristics.
//! Only `Case` proceeds to scoring.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{CaseCandidate, Classification};

struct ClassifierPatterns {
    versus: Regex,
    party_prefix: Regex,
}

fn patterns() -> &'static ClassifierPatterns {
    static PATTERNS: OnceLock<ClassifierPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ClassifierPatterns {
        versus: Regex::new(r"(?i)\bv(?:s|ersus)?\.?\s").expect("compiles"),
        party_prefix: Regex::new(r"(?i)^(state|union of india|m/s\.?)\b").expect("compiles"),
    })
}

const STATUTE_MARKERS: &[&str] = &[" act, ", " act 19", " act 20", "the constitution", "rules, 19", "rules, 20"];

/// Classify a candidate from its title and snippet (spec §4.8).
pub fn classify(title: &str, snippet: &str) -> Classification {
    let lower_title = title.to_lowercase();

    if STATUTE_MARKERS.iter().any(|m| lower_title.contains(m)) {
        return Classification::Statute;
    }

    let has_versus_marker = patterns().versus.is_match(title);
    let has_party_prefix = patterns().party_prefix.is_match(title.trim());
    if has_versus_marker || has_party_prefix {
        return Classification::Case;
    }

    if snippet.to_lowercase().contains("appellant") || snippet.to_lowercase().contains("respondent") {
        return Classification::Case;
    }

    Classification::Other
}

/// Apply [`classify`] to a candidate, setting its `classification` field.
pub fn classify_candidate(candidate: &mut CaseCandidate) {
    candidate.classification = Some(classify(&candidate.title, &candidate.snippet));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_versus_pattern_as_case() {
        assert_eq!(classify("State of Maharashtra vs. Ramesh Kumar", ""), Classification::Case);
        assert_eq!(classify("X v. Y", ""), Classification::Case);
    }

    #[test]
    fn classifies_act_titles_as_statute() {
        assert_eq!(classify("The Prevention of Corruption Act, 1988", ""), Classification::Statute);
        assert_eq!(classify("The Constitution of India", ""), Classification::Statute);
    }

    #[test]
    fn falls_back_to_other_without_markers() {
        assert_eq!(classify("Annual Report 2023", "a summary document"), Classification::Other);
    }

    #[test]
    fn snippet_party_language_counts_as_case() {
        assert_eq!(
            classify("Order dated 12.03.2023", "the appellant challenged the order of the trial court"),
            Classification::Case
        );
    }
}

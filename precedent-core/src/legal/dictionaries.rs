//! Closed-set actor / procedure / issue dictionaries for Indian legal
//! phrases (spec §4.2). Deliberately small and curated rather than
//! exhaustive — the planner and intent stages only need reliable
//! matches, not full-coverage NLU.

pub const ACTORS: &[&str] = &[
    "state", "accused", "complainant", "appellant", "respondent", "petitioner",
    "prosecution", "public servant", "informant",
];

pub const PROCEDURES: &[&str] = &[
    "criminal appeal", "discharge", "acquittal", "bail application", "revision petition",
    "writ petition", "special leave petition", "quashing", "sanction", "cognizance",
];

pub const ISSUES: &[&str] = &[
    "delay condonation", "time barred", "limitation", "sanction required", "sanction not required",
    "interaction", "jurisdiction", "maintainability",
];

/// Match every dictionary phrase present in `cleaned_text`, in dictionary
/// order, without duplicates.
fn match_phrases(cleaned_text: &str, dictionary: &[&'static str]) -> Vec<String> {
    let mut matched = Vec::new();
    for phrase in dictionary {
        if cleaned_text.contains(phrase) && !matched.contains(&phrase.to_string()) {
            matched.push(phrase.to_string());
        }
    }
    matched
}

pub fn match_actors(cleaned_text: &str) -> Vec<String> {
    match_phrases(cleaned_text, ACTORS)
}

pub fn match_procedures(cleaned_text: &str) -> Vec<String> {
    match_phrases(cleaned_text, PROCEDURES)
}

pub fn match_issues(cleaned_text: &str) -> Vec<String> {
    match_phrases(cleaned_text, ISSUES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_actor_and_procedure() {
        let text = "the state appealed against discharge and sought delay condonation";
        assert_eq!(match_actors(text), vec!["state"]);
        assert_eq!(match_procedures(text), vec!["discharge"]);
        assert_eq!(match_issues(text), vec!["delay condonation"]);
    }

    #[test]
    fn no_match_returns_empty() {
        assert!(match_actors("a general civil matter about property").is_empty());
    }
}

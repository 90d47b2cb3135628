//! Query cleaning and tokenisation (spec §4.2).

/// User-mode verbs and filler phrases stripped before dictionary matching.
const STRIP_PHRASES: &[&str] = &[
    "find", "show", "please", "cases where", "precedents for", "precedents",
    "i want", "can you", "list of", "search for",
];

/// Lowercase, collapse whitespace, strip user-mode verbs.
pub fn clean_query(raw: &str) -> String {
    let mut text = raw.to_lowercase();
    for phrase in STRIP_PHRASES {
        text = text.replace(phrase, " ");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split cleaned text into lowercase word tokens, dropping single-character
/// noise tokens that are not digits (so section numbers survive).
pub fn tokenize(cleaned: &str) -> Vec<String> {
    cleaned
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| t.len() > 1 || t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_filler_and_collapses_whitespace() {
        let cleaned = clean_query("Please   find cases where   the State appealed");
        assert_eq!(cleaned, "the state appealed");
    }

    #[test]
    fn tokenize_keeps_section_numbers() {
        let tokens = tokenize("section 197 crpc sanction");
        assert_eq!(tokens, vec!["section", "197", "crpc", "sanction"]);
    }
}

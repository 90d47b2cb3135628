//! Statutory reference parsing: sections, articles, named Acts, and
//! transition aliases (CrPC↔BNSS, PC Act↔Prevention of Corruption Act).
//! Compiled patterns live behind a `OnceLock`, reused across requests —
//! none are recompiled per call (spec §9 design note), mirroring the
//! teacher's `QueryPatterns` discipline in `llm::router`.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatutoryReference {
    pub kind: ReferenceKind,
    pub number: String,
    pub family: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Section,
    Article,
    Act,
}

struct ReferencePatterns {
    section: Regex,
    article: Regex,
    act: Regex,
    air_scc_citation: Regex,
}

fn patterns() -> &'static ReferencePatterns {
    static PATTERNS: OnceLock<ReferencePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ReferencePatterns {
        section: Regex::new(r"(?i)section\s+(\d+[a-z]?)(?:\s*\(([\w\d]+)\))?\s*(crpc|ipc|cpc|bnss|bns|pc act|limitation act)?")
            .expect("section pattern compiles"),
        article: Regex::new(r"(?i)article\s+(\d+[a-z]?)").expect("article pattern compiles"),
        act: Regex::new(r"(?i)([A-Z][\w]*(?:\s+[A-Z][\w]*)*\s+Act,?\s*\d{4})").expect("act pattern compiles"),
        air_scc_citation: Regex::new(r"(?i)\b(AIR\s*\d{4}\s*SC\s*\d+|\d{4}\s*\(\d+\)\s*SCC\s*\d+)\b")
            .expect("citation pattern compiles"),
    })
}

/// Known family transition aliases: querying for one side of a pair
/// should also match the other in retrieval (spec §4.2, §4.5).
pub fn transition_aliases(family: &str) -> Vec<&'static str> {
    match family.to_lowercase().as_str() {
        "crpc" => vec!["bnss"],
        "bnss" => vec!["crpc"],
        "pc act" | "prevention of corruption act" => vec!["prevention of corruption act", "pc act"],
        "ipc" => vec!["bns"],
        "bns" => vec!["ipc"],
        _ => vec![],
    }
}

/// Extract every statutory reference found in `text`.
pub fn extract_references(text: &str) -> Vec<StatutoryReference> {
    let p = patterns();
    let mut refs = Vec::new();

    for cap in p.section.captures_iter(text) {
        let number = cap.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let family = cap.get(3).map(|m| m.as_str().to_lowercase());
        refs.push(StatutoryReference {
            kind: ReferenceKind::Section,
            number,
            family,
            raw: cap.get(0).unwrap().as_str().to_string(),
        });
    }
    for cap in p.article.captures_iter(text) {
        refs.push(StatutoryReference {
            kind: ReferenceKind::Article,
            number: cap.get(1).unwrap().as_str().to_string(),
            family: None,
            raw: cap.get(0).unwrap().as_str().to_string(),
        });
    }
    for cap in p.act.captures_iter(text) {
        refs.push(StatutoryReference {
            kind: ReferenceKind::Act,
            number: String::new(),
            family: Some(cap.get(1).unwrap().as_str().to_string()),
            raw: cap.get(0).unwrap().as_str().to_string(),
        });
    }
    refs
}

/// Extract AIR/SCC-style citation tokens, used by the chunker's
/// round-trip property (spec §8 property 9).
pub fn extract_citations(text: &str) -> Vec<String> {
    patterns()
        .air_scc_citation
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_section_with_family() {
        let refs = extract_references("section 197 crpc sanction required");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].number, "197");
        assert_eq!(refs[0].family.as_deref(), Some("crpc"));
    }

    #[test]
    fn crpc_bnss_are_reciprocal_aliases() {
        assert_eq!(transition_aliases("crpc"), vec!["bnss"]);
        assert_eq!(transition_aliases("bnss"), vec!["crpc"]);
    }

    #[test]
    fn extracts_air_scc_citation() {
        let citations = extract_citations("as held in AIR 1978 SC 1025, the court observed");
        assert_eq!(citations, vec!["AIR 1978 SC 1025"]);
    }

    #[test]
    fn patterns_are_compiled_once() {
        let a = patterns() as *const _;
        let b = patterns() as *const _;
        assert_eq!(a, b);
    }
}

//! Regex-based salvage parser: a parser of last resort that
//! reconstructs sketch fields from a loose, not-quite-JSON payload
//! (spec §4.4: "attempt a regex-based salvage that reconstructs fields
//! from a loose JSON-like payload"). Isolated from the primary
//! `serde_json` decode path, per spec §9 design note.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Polarity, ReasonerSketch};

struct SalvagePatterns {
    string_list_field: Regex,
    polarity_field: Regex,
}

fn patterns() -> &'static SalvagePatterns {
    static PATTERNS: OnceLock<SalvagePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SalvagePatterns {
        string_list_field: Regex::new(r#""?(\w+)"?\s*:\s*\[([^\]]*)\]"#).expect("compiles"),
        polarity_field: Regex::new(r#""?polarity"?\s*:\s*"?(\w+)"?"#).expect("compiles"),
    })
}

fn parse_string_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_polarity(raw: &str) -> Polarity {
    match raw.to_lowercase().as_str() {
        "required" => Polarity::Required,
        "not_required" | "notrequired" => Polarity::NotRequired,
        "allowed" => Polarity::Allowed,
        "refused" => Polarity::Refused,
        "dismissed" => Polarity::Dismissed,
        "quashed" => Polarity::Quashed,
        _ => Polarity::Unknown,
    }
}

/// Reconstruct a [`ReasonerSketch`] from a malformed payload, returning
/// `None` when not even one list field could be recovered — the caller
/// then falls through to the deterministic-only plan (spec §4.4: "If
/// sketch target and still unparseable").
pub fn salvage_sketch(raw: &str) -> Option<ReasonerSketch> {
    let p = patterns();
    let mut sketch = ReasonerSketch::default();
    let mut recovered_any = false;

    for cap in p.string_list_field.captures_iter(raw) {
        let field = cap.get(1).unwrap().as_str().to_lowercase();
        let values = parse_string_list(cap.get(2).unwrap().as_str());
        if values.is_empty() {
            continue;
        }
        match field.as_str() {
            "actors" | "actor" | "actor_role" => sketch.actors = values,
            "proceeding" | "proceedings" => sketch.proceeding = values,
            "outcome" | "outcomes" => sketch.outcome = values,
            "hooks" | "hook" | "legal_hooks" => sketch.hooks = values,
            "strict_terms" => sketch.strict_terms = values,
            "broad_terms" => sketch.broad_terms = values,
            _ => continue,
        }
        recovered_any = true;
    }

    if let Some(cap) = p.polarity_field.captures(raw) {
        sketch.polarity = parse_polarity(cap.get(1).unwrap().as_str());
    }

    if recovered_any {
        Some(sketch)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_fields_from_loose_payload() {
        let raw = r#"{actors: [State, Accused], hooks: ["197 crpc"], polarity: refused, garbage"#;
        let sketch = salvage_sketch(raw).expect("should salvage");
        assert_eq!(sketch.actors, vec!["State", "Accused"]);
        assert_eq!(sketch.hooks, vec!["197 crpc"]);
        assert_eq!(sketch.polarity, Polarity::Refused);
    }

    #[test]
    fn returns_none_when_nothing_recoverable() {
        assert!(salvage_sketch("not json at all, just prose").is_none());
    }
}

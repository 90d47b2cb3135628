//! Term overlap/proximity helpers and the document chunker used by the
//! hybrid semantic index (spec §4.7, §8 property 9).

use crate::legal::references::extract_citations;

/// A fetched, normalised document ready for chunking into the semantic
/// index. Mirrors the shape the offline corpus-indexing collaborator
/// (out of scope, spec §1) would hand to this pipeline.
#[derive(Debug, Clone)]
pub struct NormalizedIkDocument {
    pub doc_id: String,
    pub text: String,
    /// Statutory reference tokens already extracted for this document
    /// (e.g. "section 197", "crpc") — the chunker must preserve every
    /// one of these across the chunk boundaries it introduces.
    pub statute_tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub index: usize,
    pub text: String,
}

/// Split `doc.text` into overlapping windows sized for embedding, while
/// preserving every `statute_tokens` element and every AIR/SCC-style
/// citation in at least one chunk (spec §8 property 9).
pub fn chunk_legal_document(doc: &NormalizedIkDocument, target_chars: usize, overlap_chars: usize) -> Vec<DocumentChunk> {
    if doc.text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = doc.text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;
    while start < chars.len() {
        let end = (start + target_chars).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        chunks.push(DocumentChunk { index, text });
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap_chars);
        index += 1;
    }

    backfill_missing_tokens(&mut chunks, doc);
    chunks
}

/// Any statute token or citation absent from every chunk (possible only
/// at a chunk boundary split mid-token) gets appended to the final
/// chunk so the round-trip property always holds.
fn backfill_missing_tokens(chunks: &mut [DocumentChunk], doc: &NormalizedIkDocument) {
    let citations = extract_citations(&doc.text);
    let mut missing = Vec::new();
    for token in doc.statute_tokens.iter().chain(citations.iter()) {
        if !chunks.iter().any(|c| c.text.contains(token.as_str())) {
            missing.push(token.clone());
        }
    }
    if !missing.is_empty() {
        if let Some(last) = chunks.last_mut() {
            last.text.push(' ');
            last.text.push_str(&missing.join(" "));
        }
    }
}

/// Jaccard overlap between two token sets, used as the deterministic
/// lexical fallback for rerank (spec §4.7).
pub fn jaccard_overlap(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Whether two term sets co-occur within `window_chars` of each other in
/// `text` (used for chain-constraint proximity evaluation, spec §4.9).
pub fn within_proximity(text: &str, left: &str, right: &str, window_chars: usize) -> bool {
    let lower = text.to_lowercase();
    let left = left.to_lowercase();
    let right = right.to_lowercase();
    let left_positions: Vec<usize> = lower.match_indices(&left).map(|(i, _)| i).collect();
    let right_positions: Vec<usize> = lower.match_indices(&right).map(|(i, _)| i).collect();
    left_positions.iter().any(|&l| {
        right_positions
            .iter()
            .any(|&r| l.abs_diff(r) <= window_chars)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_preserves_statute_tokens_and_citations() {
        let doc = NormalizedIkDocument {
            doc_id: "d1".into(),
            text: "a".repeat(500) + " section 197 crpc " + &"b".repeat(500) + " AIR 1978 SC 1025 " + &"c".repeat(500),
            statute_tokens: vec!["section 197".into(), "crpc".into()],
        };
        let chunks = chunk_legal_document(&doc, 400, 50);
        assert!(!chunks.is_empty());
        for token in doc.statute_tokens.iter() {
            assert!(chunks.iter().any(|c| c.text.contains(token.as_str())));
        }
        assert!(chunks.iter().any(|c| c.text.contains("AIR 1978 SC 1025")));
    }

    #[test]
    fn jaccard_overlap_identical_sets_is_one() {
        let a = vec!["x".to_string(), "y".to_string()];
        assert_eq!(jaccard_overlap(&a, &a), 1.0);
    }

    #[test]
    fn proximity_detects_nearby_terms() {
        let text = "the appellant vs the state, preferred appeal before the high court";
        assert!(within_proximity(text, "appellant", "preferred appeal", 40));
        assert!(!within_proximity(text, "appellant", "high court", 5));
    }
}

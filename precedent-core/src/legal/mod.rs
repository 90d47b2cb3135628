//! Legal-text utilities (spec §4, "Legal-text utilities"): tokenisation,
//! normalisation, legal-reference parsing, dictionaries, and term
//! overlap/proximity helpers shared across intent extraction, the
//! planner, providers, and the proposition gate.

pub mod dictionaries;
pub mod overlap;
pub mod references;
pub mod tokenize;

pub use overlap::{chunk_legal_document, jaccard_overlap, within_proximity, DocumentChunk, NormalizedIkDocument};
pub use references::{extract_citations, extract_references, transition_aliases, ReferenceKind, StatutoryReference};
pub use tokenize::{clean_query, tokenize};

//! CaseCandidate and its classification/evidence types (spec §3, §4.6,
//! §4.8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Court {
    #[serde(rename = "SC")]
    SupremeCourt,
    #[serde(rename = "HC")]
    HighCourt,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Case,
    Statute,
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceQuality {
    pub has_relation_sentence: bool,
    pub has_polarity_sentence: bool,
    pub has_hook_intersection_sentence: bool,
    pub has_role_sentence: bool,
    pub has_chain_sentence: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetailHydrationSource {
    Cache,
    PrimaryUrl,
    AlternateUrl,
    HintResolution,
    SnippetFallback,
    #[default]
    NotHydrated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalMeta {
    pub source_tags: Vec<String>,
    pub source_version: Option<String>,
    pub rerank_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseCandidate {
    pub source: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub court: Court,
    pub court_text: Option<String>,
    pub cites_count: Option<u32>,
    pub cited_by_count: Option<u32>,
    pub author: Option<String>,
    pub bench: Option<String>,
    pub full_document_url: Option<String>,
    pub detail_text: Option<String>,
    pub detail_artifact: Option<String>,
    pub evidence_quality: Option<EvidenceQuality>,
    pub detail_hydration: Option<DetailHydrationSource>,
    pub classification: Option<Classification>,
    pub retrieval: RetrievalMeta,
}

impl CaseCandidate {
    /// URL is the primary identity (spec §3).
    pub fn identity(&self) -> &str {
        &self.url
    }
}

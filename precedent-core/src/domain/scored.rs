//! Scored and gated candidate outputs (spec §3, §4.9).

use serde::{Deserialize, Serialize};

use crate::domain::candidate::CaseCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    /// LOW<0.41<MEDIUM<0.73≤HIGH (spec §4.9).
    pub fn from_score(score: f64) -> Self {
        if score < 0.41 {
            ConfidenceBand::Low
        } else if score < 0.73 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalTier {
    ExactStrict,
    ExactProvisional,
    Exploratory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCase {
    #[serde(flatten)]
    pub candidate: CaseCandidate,
    pub score: f64,
    pub confidence_score: f64,
    pub confidence_band: ConfidenceBand,
    pub retrieval_tier: RetrievalTier,
    pub missing_elements: Vec<String>,
    pub gap_summary: Option<String>,
    pub match_evidence: Vec<String>,
}

pub type NearMissCase = ScoredCase;

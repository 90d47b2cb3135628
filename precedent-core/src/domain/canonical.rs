//! CanonicalIntent (spec §3, §4.5).

use serde::{Deserialize, Serialize};

use crate::domain::reasoner::Polarity;
use crate::intent::DateWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoctypeProfile {
    JudgmentsScHcTribunal,
    SupremeCourt,
    HighCourts,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourtScope {
    #[serde(rename = "SC")]
    SupremeCourt,
    #[serde(rename = "HC")]
    HighCourt,
    #[serde(rename = "ANY")]
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalHookGroup {
    pub group_id: String,
    pub family: String,
    pub section_number: Option<String>,
    pub terms: Vec<String>,
    pub min_match: u32,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalIntent {
    pub actors: Vec<String>,
    pub proceedings: Vec<String>,
    pub outcomes: Vec<String>,
    pub legal_hooks: Vec<String>,
    pub hook_groups: Vec<CanonicalHookGroup>,
    pub outcome_polarity: Polarity,
    pub contradiction_terms: Vec<String>,
    pub doctype_profile: DoctypeProfile,
    pub court_scope: CourtScope,
    pub date_window: DateWindow,
    pub must_include_tokens: Vec<String>,
    pub must_exclude_tokens: Vec<String>,
    pub canonical_order_terms: Vec<String>,
    pub disjunctive_query: bool,
    pub soft_hint_terms: Vec<String>,
    pub notification_terms: Vec<String>,
    pub transition_aliases: Vec<String>,
}

impl CanonicalIntent {
    pub fn required_hook_group_count(&self) -> usize {
        self.hook_groups.iter().filter(|g| g.required).count()
    }
}

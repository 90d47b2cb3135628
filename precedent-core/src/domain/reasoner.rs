//! ReasonerSketch and ReasonerPlan (spec §3, §4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Required,
    NotRequired,
    Allowed,
    Refused,
    Dismissed,
    Quashed,
    Unknown,
}

impl Default for Polarity {
    fn default() -> Self {
        Polarity::Unknown
    }
}

/// Pass-1 target: a validated sketch, tolerant of alternate key names on
/// the wire (`actor|actors|actor_role`, spec §9 design note) — the
/// permissive decode lives in `reasoner::parse`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasonerSketch {
    pub actors: Vec<String>,
    pub proceeding: Vec<String>,
    pub outcome: Vec<String>,
    pub hooks: Vec<String>,
    pub polarity: Polarity,
    pub strict_terms: Vec<String>,
    pub broad_terms: Vec<String>,
    pub court_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookGroup {
    pub group_id: String,
    pub terms: Vec<String>,
    pub min_match: u32,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Requires,
    AppliesTo,
    InteractsWith,
    ExcludedBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "type")]
    pub kind: RelationType,
    pub left_group_id: String,
    pub right_group_id: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeConstraint {
    pub polarity: Polarity,
    pub modality: Option<String>,
    pub terms: Vec<String>,
    pub contradiction_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposition {
    pub actors: Vec<String>,
    pub proceeding: Vec<String>,
    pub legal_hooks: Vec<String>,
    pub outcome_required: bool,
    pub outcome_negative: bool,
    pub jurisdiction_hint: Option<String>,
    pub hook_groups: Vec<HookGroup>,
    pub relations: Vec<Relation>,
    pub outcome_constraint: OutcomeConstraint,
    pub interaction_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerPlan {
    pub proposition: Proposition,
    pub must_have_terms: Vec<String>,
    pub must_not_have_terms: Vec<String>,
    pub query_variants_strict: Vec<String>,
    pub query_variants_broad: Vec<String>,
    pub case_anchors: Vec<String>,
}

impl ReasonerPlan {
    /// Drop relations that reference a non-existent group id — the
    /// validator must never let a dangling group_id through (spec §3).
    pub fn drop_dangling_relations(&mut self) {
        let known: std::collections::HashSet<&str> = self
            .proposition
            .hook_groups
            .iter()
            .map(|g| g.group_id.as_str())
            .collect();
        self.proposition
            .relations
            .retain(|r| known.contains(r.left_group_id.as_str()) && known.contains(r.right_group_id.as_str()));
    }

    /// Clamp every hook group's `min_match` into `[1, min(|terms|, 4)]`
    /// (spec §3).
    pub fn clamp_min_match(&mut self) {
        for group in &mut self.proposition.hook_groups {
            let upper = group.terms.len().min(4).max(1) as u32;
            group.min_match = group.min_match.clamp(1, upper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_groups(ids: &[&str]) -> ReasonerPlan {
        ReasonerPlan {
            proposition: Proposition {
                actors: vec![],
                proceeding: vec![],
                legal_hooks: vec![],
                outcome_required: false,
                outcome_negative: false,
                jurisdiction_hint: None,
                hook_groups: ids
                    .iter()
                    .map(|id| HookGroup {
                        group_id: id.to_string(),
                        terms: vec!["term".into()],
                        min_match: 1,
                        required: true,
                    })
                    .collect(),
                relations: vec![],
                outcome_constraint: OutcomeConstraint::default(),
                interaction_required: false,
            },
            must_have_terms: vec![],
            must_not_have_terms: vec![],
            query_variants_strict: vec![],
            query_variants_broad: vec![],
            case_anchors: vec![],
        }
    }

    #[test]
    fn drops_dangling_relation() {
        let mut plan = plan_with_groups(&["g1"]);
        plan.proposition.relations.push(Relation {
            kind: RelationType::Requires,
            left_group_id: "g1".into(),
            right_group_id: "g-missing".into(),
            required: true,
        });
        plan.drop_dangling_relations();
        assert!(plan.proposition.relations.is_empty());
    }

    #[test]
    fn clamps_min_match_into_bounds() {
        let mut plan = plan_with_groups(&["g1"]);
        plan.proposition.hook_groups[0].terms = vec!["a".into(), "b".into()];
        plan.proposition.hook_groups[0].min_match = 99;
        plan.clamp_min_match();
        assert_eq!(plan.proposition.hook_groups[0].min_match, 2);
    }
}

//! PropositionChecklist and the PropositionGraph arena (spec §3, §4.9,
//! §9 design note: "use an arena of steps indexed by id; steps
//! reference other steps by id, not by pointer").

use serde::{Deserialize, Serialize};

use crate::domain::reasoner::OutcomeConstraint;

pub type StepId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    RequiredHookGroup { group_id: String, terms: Vec<String>, min_match: u32 },
    RequiredOutcome,
    RoleConstraint { role: ActorRole, pattern_hint: String },
    ChainConstraint { left_terms: Vec<String>, right_terms: Vec<String>, window_chars: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    Appellant,
    Respondent,
    Prosecution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub kind: StepKind,
    /// Other steps this one depends on, referenced by id so the arena
    /// stays free of cyclic ownership (spec §9).
    pub depends_on: Vec<StepId>,
}

/// Arena of steps indexed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropositionGraph {
    pub mandatory_steps: Vec<Step>,
    pub peripheral_steps: Vec<Step>,
    pub enforce_no_hook_role_chain: bool,
}

impl PropositionGraph {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.mandatory_steps
            .iter()
            .chain(self.peripheral_steps.iter())
            .find(|s| s.id == id)
    }

    pub fn next_id(&self) -> StepId {
        self.mandatory_steps
            .iter()
            .chain(self.peripheral_steps.iter())
            .map(|s| s.id)
            .max()
            .map_or(0, |m| m + 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropositionChecklist {
    pub required_elements: Vec<String>,
    pub optional_elements: Vec<String>,
    pub hook_groups: Vec<String>,
    pub relations: Vec<String>,
    pub outcome_constraint: OutcomeConstraint,
    pub interaction_required: bool,
    pub graph: Option<PropositionGraph>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_by_id_across_mandatory_and_peripheral() {
        let mut graph = PropositionGraph::default();
        graph.mandatory_steps.push(Step {
            id: 0,
            kind: StepKind::RequiredOutcome,
            depends_on: vec![],
        });
        graph.peripheral_steps.push(Step {
            id: 1,
            kind: StepKind::RoleConstraint {
                role: ActorRole::Appellant,
                pattern_hint: "appellant".into(),
            },
            depends_on: vec![0],
        });
        assert!(graph.step(1).unwrap().depends_on.contains(&0));
        assert_eq!(graph.next_id(), 2);
    }
}

//! Proposition gate (spec §4.9): builds a [`PropositionGraph`] from the
//! canonical intent and reasoner plan, evaluates it against each
//! candidate's detail text, and splits candidates into
//! exact_strict/exact_provisional/near_miss buckets.

use crate::domain::proposition::{ActorRole, PropositionChecklist, PropositionGraph, Step, StepKind};
use crate::domain::reasoner::{OutcomeConstraint, Polarity, ReasonerPlan};
use crate::domain::{CanonicalIntent, RetrievalTier};
use crate::legal::within_proximity;

const ROLE_PATTERNS: &[(&str, ActorRole)] = &[
    ("appellant", ActorRole::Appellant),
    ("vs", ActorRole::Appellant),
    ("respondent", ActorRole::Respondent),
    ("prosecution", ActorRole::Prosecution),
];

/// Build the [`PropositionChecklist`] and its [`PropositionGraph`] from
/// the canonical intent and (optional) reasoner plan (spec §4.9).
pub fn build_checklist(intent: &CanonicalIntent, plan: Option<&ReasonerPlan>) -> PropositionChecklist {
    let mut graph = PropositionGraph::default();

    for group in intent.hook_groups.iter().filter(|g| g.required) {
        let id = graph.next_id();
        graph.mandatory_steps.push(Step {
            id,
            kind: StepKind::RequiredHookGroup {
                group_id: group.group_id.clone(),
                terms: group.terms.clone(),
                min_match: group.min_match,
            },
            depends_on: vec![],
        });
    }
    for group in intent.hook_groups.iter().filter(|g| !g.required) {
        let id = graph.next_id();
        graph.peripheral_steps.push(Step {
            id,
            kind: StepKind::RequiredHookGroup {
                group_id: group.group_id.clone(),
                terms: group.terms.clone(),
                min_match: group.min_match,
            },
            depends_on: vec![],
        });
    }

    if intent.outcome_polarity != Polarity::Unknown {
        let id = graph.next_id();
        graph.mandatory_steps.push(Step {
            id,
            kind: StepKind::RequiredOutcome,
            depends_on: vec![],
        });
    }

    for (pattern, role) in ROLE_PATTERNS {
        if intent.actors.iter().any(|a| a.to_lowercase().contains(pattern)) {
            let id = graph.next_id();
            graph.peripheral_steps.push(Step {
                id,
                kind: StepKind::RoleConstraint { role: *role, pattern_hint: (*pattern).to_string() },
                depends_on: vec![],
            });
        }
    }

    if let Some(plan) = plan {
        for relation in &plan.proposition.relations {
            let left = intent.hook_groups.iter().find(|g| g.group_id == relation.left_group_id);
            let right = intent.hook_groups.iter().find(|g| g.group_id == relation.right_group_id);
            if let (Some(left), Some(right)) = (left, right) {
                let left_terms = left.terms.clone();
                let right_terms = right.terms.clone();
                let id = graph.next_id();
                let step = Step {
                    id,
                    kind: StepKind::ChainConstraint { left_terms, right_terms, window_chars: 200 },
                    depends_on: vec![],
                };
                if relation.required {
                    graph.mandatory_steps.push(step);
                } else {
                    graph.peripheral_steps.push(step);
                }
            }
        }
    }

    graph.enforce_no_hook_role_chain = intent.disjunctive_query && intent.required_hook_group_count() >= 2;

    let outcome_constraint = OutcomeConstraint {
        polarity: intent.outcome_polarity,
        modality: None,
        terms: intent.outcomes.clone(),
        contradiction_terms: intent.contradiction_terms.clone(),
    };

    PropositionChecklist {
        required_elements: intent.hook_groups.iter().filter(|g| g.required).map(|g| g.group_id.clone()).collect(),
        optional_elements: intent.hook_groups.iter().filter(|g| !g.required).map(|g| g.group_id.clone()).collect(),
        hook_groups: intent.hook_groups.iter().map(|g| g.group_id.clone()).collect(),
        relations: plan
            .map(|p| p.proposition.relations.iter().map(|r| format!("{}->{}", r.left_group_id, r.right_group_id)).collect())
            .unwrap_or_default(),
        outcome_constraint,
        interaction_required: plan.map(|p| p.proposition.interaction_required).unwrap_or(false),
        graph: Some(graph),
    }
}

fn step_passes(step: &Step, detail_text: &str, checklist: &PropositionChecklist) -> bool {
    let lower = detail_text.to_lowercase();
    match &step.kind {
        StepKind::RequiredHookGroup { terms, min_match, .. } => {
            let hits = terms.iter().filter(|t| lower.contains(&t.to_lowercase())).count();
            hits as u32 >= *min_match
        }
        StepKind::RequiredOutcome => match checklist.outcome_constraint.polarity {
            Polarity::Unknown => true,
            polarity => {
                let polarity_word = format!("{polarity:?}").to_lowercase();
                lower.contains(&polarity_word)
            }
        },
        StepKind::RoleConstraint { pattern_hint, .. } => lower.contains(pattern_hint),
        StepKind::ChainConstraint { left_terms, right_terms, window_chars } => left_terms
            .iter()
            .any(|l| right_terms.iter().any(|r| within_proximity(detail_text, l, r, *window_chars))),
    }
}

fn has_contradiction_term(detail_text: &str, checklist: &PropositionChecklist) -> bool {
    let lower = detail_text.to_lowercase();
    checklist
        .outcome_constraint
        .contradiction_terms
        .iter()
        .any(|t| lower.contains(&t.to_lowercase()))
}

/// Evaluate `detail_text` against the checklist's graph and classify the
/// retrieval tier, returning the missing-element labels for any step
/// that failed (spec §4.9).
pub fn evaluate(checklist: &PropositionChecklist, detail_text: &str) -> (RetrievalTier, Vec<String>) {
    let graph = match &checklist.graph {
        Some(graph) => graph,
        None => return (RetrievalTier::Exploratory, vec!["no_proposition_graph".into()]),
    };

    let mut missing = Vec::new();
    let mut all_mandatory_pass = true;
    for step in &graph.mandatory_steps {
        if !step_passes(step, detail_text, checklist) {
            all_mandatory_pass = false;
            missing.push(step_label(step));
        }
    }

    if !all_mandatory_pass {
        return (RetrievalTier::Exploratory, missing);
    }

    let mut peripheral_failed = false;
    for step in &graph.peripheral_steps {
        if !step_passes(step, detail_text, checklist) {
            peripheral_failed = true;
            missing.push(step_label(step));
        }
    }

    let contradiction_present = has_contradiction_term(detail_text, checklist);
    if contradiction_present {
        missing.push("contradiction_term_present".into());
        return (RetrievalTier::Exploratory, missing);
    }

    if peripheral_failed {
        (RetrievalTier::ExactProvisional, missing)
    } else {
        (RetrievalTier::ExactStrict, missing)
    }
}

fn step_label(step: &Step) -> String {
    match &step.kind {
        StepKind::RequiredHookGroup { group_id, .. } => format!("hook_group:{group_id}"),
        StepKind::RequiredOutcome => "outcome".to_string(),
        StepKind::RoleConstraint { role, .. } => format!("role:{role:?}"),
        StepKind::ChainConstraint { .. } => "chain_constraint".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::canonical::{CanonicalHookGroup, CourtScope, DoctypeProfile};
    use crate::intent::DateWindow;

    fn intent_with_hook(required: bool) -> CanonicalIntent {
        CanonicalIntent {
            actors: vec!["state".into()],
            proceedings: vec!["appeal".into()],
            outcomes: vec![],
            legal_hooks: vec!["section 197".into()],
            hook_groups: vec![CanonicalHookGroup {
                group_id: "crpc:197".into(),
                family: "crpc".into(),
                section_number: Some("197".into()),
                terms: vec!["section 197".into()],
                min_match: 1,
                required,
            }],
            outcome_polarity: Polarity::Unknown,
            contradiction_terms: vec![],
            doctype_profile: DoctypeProfile::Any,
            court_scope: CourtScope::Any,
            date_window: DateWindow::default(),
            must_include_tokens: vec![],
            must_exclude_tokens: vec![],
            canonical_order_terms: vec![],
            disjunctive_query: false,
            soft_hint_terms: vec![],
            notification_terms: vec![],
            transition_aliases: vec![],
        }
    }

    #[test]
    fn required_hook_group_failure_demotes_to_exploratory() {
        let intent = intent_with_hook(true);
        let checklist = build_checklist(&intent, None);
        let (tier, missing) = evaluate(&checklist, "this judgment discusses an unrelated matter");
        assert_eq!(tier, RetrievalTier::Exploratory);
        assert!(!missing.is_empty());
    }

    #[test]
    fn all_mandatory_steps_passing_yields_exact_strict() {
        let intent = intent_with_hook(true);
        let checklist = build_checklist(&intent, None);
        let (tier, _) = evaluate(&checklist, "the court considered section 197 of the code in detail");
        assert_eq!(tier, RetrievalTier::ExactStrict);
    }

    #[test]
    fn contradiction_term_present_forces_exploratory() {
        let mut intent = intent_with_hook(true);
        intent.contradiction_terms = vec!["condoned".into()];
        let checklist = build_checklist(&intent, None);
        let (tier, missing) = evaluate(&checklist, "the court considered section 197 and the delay was condoned");
        assert_eq!(tier, RetrievalTier::Exploratory);
        assert!(missing.contains(&"contradiction_term_present".to_string()));
    }
}

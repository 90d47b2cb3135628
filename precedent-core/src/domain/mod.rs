//! Core data-model types shared across pipeline stages (spec §3).

pub mod candidate;
pub mod canonical;
pub mod proposition;
pub mod reasoner;
pub mod scored;
pub mod variant;

pub use candidate::{CaseCandidate, Classification, Court, DetailHydrationSource, EvidenceQuality, RetrievalMeta};
pub use canonical::{CanonicalHookGroup, CanonicalIntent, CourtScope, DoctypeProfile};
// Note: `variant::CourtScope` was removed; `QueryVariant` reuses `canonical::CourtScope`.
pub use proposition::{ActorRole, PropositionChecklist, PropositionGraph, Step, StepId, StepKind};
pub use reasoner::{HookGroup, OutcomeConstraint, Polarity, Proposition, ReasonerPlan, ReasonerSketch, Relation, RelationType};
pub use scored::{ConfidenceBand, NearMissCase, RetrievalTier, ScoredCase};
pub use variant::{dedupe_and_cap, Phase, QueryVariant, RetrievalDirectives, Strictness, MAX_VARIANTS};

//! Core type definitions for the Covenant governance engine.
//!
//! This crate provides the shared value types. No business logic beyond the
//! decision transition table; every Covenant crate depends on this one.

pub mod constraints;
pub mod decision;
pub mod dispute;
pub mod error;
pub mod ids;
pub mod party;
pub mod proof;
pub mod result;

// Re-export primary types at crate root for ergonomic use.
pub use constraints::{
    pattern_matches, CapabilityGrant, CapabilityManifest, CmDiff, ConstraintSet, CsDiff,
};
pub use decision::{
    Decision, DecisionProposal, DecisionState, DecisionType, StateTransition, VoteRecord,
};
pub use dispute::{
    Appeal, AppealFiling, ArbitrationOutcome, Objection, ObjectionFiling, VetoCategory,
};
pub use error::DecisionError;
pub use ids::{AppealId, DecisionId, EntryId, EpId, ObjectionId, PartyClass, PartyId};
pub use party::Party;
pub use proof::{QuorumProof, ThresholdProof};
pub use result::GovernanceResult;

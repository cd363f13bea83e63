//! Covenant governance engine.
//!
//! Parties propose decisions, vote under quorum, threshold and class-wise
//! assent rules, object and appeal, and execute approved decisions behind
//! evidence packages anchored in a hash-chained audit log. An emergency
//! circuit breaker with escalating renewal thresholds bans permanent and
//! irreversible changes while active.
//!
//! ```no_run
//! use covenant_engine::{GovernanceConfig, GovernanceEngine};
//! use covenant_types::{DecisionProposal, DecisionType, Party, PartyId};
//!
//! let mut engine = GovernanceEngine::new(GovernanceConfig::default())?;
//! engine.register_party(Party::new("alice", "H"));
//! engine.register_party(Party::new("bob", "H"));
//!
//! let proposed = engine.propose_decision(DecisionProposal::new(
//!     "alice",
//!     DecisionType::D1,
//!     serde_json::json!({ "op": "rotate-keys" }),
//! ));
//! let id = proposed.decision_id.expect("proposal accepted");
//! engine.cast_vote(&id, &PartyId::new("alice"), true);
//! engine.cast_vote(&id, &PartyId::new("bob"), true);
//! assert!(engine.evaluate_decision(&id).legitimate);
//! assert!(engine.execute_decision(&id).legitimate);
//! # Ok::<(), covenant_engine::EngineError>(())
//! ```

pub mod clock;
pub mod config;
pub mod disputes;
pub mod emergency;
pub mod enforcement;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod evidence;
pub mod registry;
pub mod signing;
pub mod snapshot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BondConfig, EmergencyConfig, GovernanceConfig, QuorumConfig, RegistryConfig, ThresholdConfig,
};
pub use disputes::{BondPolicy, DisputeDesk, DisputeError, TieredBondPolicy};
pub use emergency::{EmergencyError, EmergencyManager, EmergencyState};
pub use enforcement::{
    ActionContext, EnforcementGate, EnforcementInterface, EnforcementVerdict, GateVerdict,
    SanctionLevel, SandboxEnforcer, SanctionsLadder,
};
pub use engine::{Ballot, GovernanceEngine, GovernanceEngineBuilder};
pub use error::{ConfigError, EngineError};
pub use evaluator::ProofEvaluator;
pub use evidence::{
    EpSignature, EpTimestamps, EvidenceError, EvidencePackage, Participant, ParticipantRole,
};
pub use registry::{PartyRegistry, RegistryError};
pub use signing::{DigestSigner, VoteSigner};
pub use snapshot::{EngineSnapshot, SNAPSHOT_VERSION};

//! Decisions and their lifecycle.
//!
//! A decision moves through a closed set of states. Every transition goes
//! through [`DecisionState::can_transition_to`], so the only way to reach
//! `Executed` is from `Approved`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constraints::{CmDiff, CsDiff};
use crate::dispute::{Appeal, Objection};
use crate::error::DecisionError;
use crate::ids::{DecisionId, PartyClass, PartyId};

/// Severity tiers. D0 is operational and pre-authorized; D1 through D4
/// require increasingly strict governance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DecisionType {
    D0,
    D1,
    D2,
    D3,
    D4,
}

impl DecisionType {
    pub const ALL: [DecisionType; 5] = [Self::D0, Self::D1, Self::D2, Self::D3, Self::D4];

    /// Whether this type goes through voting at all.
    pub fn requires_votes(&self) -> bool {
        !matches!(self, Self::D0)
    }

    pub fn severity(&self) -> u8 {
        match self {
            Self::D0 => 0,
            Self::D1 => 1,
            Self::D2 => 2,
            Self::D3 => 3,
            Self::D4 => 4,
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "D{}", self.severity())
    }
}

/// Lifecycle state of a governed decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Voting,
    Objected,
    Approved,
    Rejected,
    Expired,
    Executed,
    Appealed,
}

impl DecisionState {
    /// The legal transition table.
    ///
    /// `Objected -> Rejected` is only taken when a veto is sustained by
    /// external arbitration.
    pub fn can_transition_to(&self, next: DecisionState) -> bool {
        use DecisionState::*;
        match self {
            Voting => matches!(next, Objected | Approved | Rejected | Expired),
            Objected => matches!(next, Voting | Rejected),
            Approved => matches!(next, Executed | Appealed),
            Rejected => matches!(next, Appealed),
            Expired | Executed | Appealed => false,
        }
    }

    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Executed | Self::Appealed)
    }

    /// Decided outcomes that may still be appealed.
    pub fn is_appealable(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for DecisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Voting => "VOTING",
            Self::Objected => "OBJECTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Executed => "EXECUTED",
            Self::Appealed => "APPEALED",
        };
        f.write_str(s)
    }
}

/// A single cast vote. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub party_id: PartyId,
    pub party_class: PartyClass,
    pub approve: bool,
    /// Opaque signature attached by the engine's signer.
    pub signature: String,
    pub cast_at: DateTime<Utc>,
}

/// One recorded state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: DecisionState,
    pub to: DecisionState,
    pub at: DateTime<Utc>,
}

/// Everything a proposer supplies when opening a decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionProposal {
    pub proposer_id: PartyId,
    pub decision_type: DecisionType,
    pub payload: serde_json::Value,
    pub rationale: String,
    pub impact_statement: String,
    pub cs_diff: Option<CsDiff>,
    pub cm_diff: Option<CmDiff>,
    pub voting_deadline: Option<DateTime<Utc>>,
    pub irreversible: bool,
}

impl DecisionProposal {
    pub fn new(
        proposer_id: impl Into<PartyId>,
        decision_type: DecisionType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            proposer_id: proposer_id.into(),
            decision_type,
            payload,
            rationale: String::new(),
            impact_statement: String::new(),
            cs_diff: None,
            cm_diff: None,
            voting_deadline: None,
            irreversible: false,
        }
    }

    pub fn rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn impact_statement(mut self, impact: impl Into<String>) -> Self {
        self.impact_statement = impact.into();
        self
    }

    pub fn cs_diff(mut self, diff: CsDiff) -> Self {
        self.cs_diff = Some(diff);
        self
    }

    pub fn cm_diff(mut self, diff: CmDiff) -> Self {
        self.cm_diff = Some(diff);
        self
    }

    pub fn voting_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.voting_deadline = Some(deadline);
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    /// Whether the proposal carries a permanent constraint or capability change.
    pub fn has_permanent_change(&self) -> bool {
        self.cs_diff.as_ref().is_some_and(|d| d.permanent)
            || self.cm_diff.as_ref().is_some_and(|d| d.permanent)
    }
}

/// A governed decision, exclusively owned by the engine's decision table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub decision_type: DecisionType,
    pub proposer_id: PartyId,
    pub payload: serde_json::Value,
    pub rationale: String,
    pub impact_statement: String,
    pub cs_diff: Option<CsDiff>,
    pub cm_diff: Option<CmDiff>,
    pub irreversible: bool,
    pub votes: Vec<VoteRecord>,
    pub objections: Vec<Objection>,
    pub appeals: Vec<Appeal>,
    pub state: DecisionState,
    pub created_at: DateTime<Utc>,
    pub voting_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<StateTransition>,
}

impl Decision {
    /// Open a decision in `Voting`.
    pub fn open(proposal: DecisionProposal, created_at: DateTime<Utc>) -> Self {
        Self {
            id: DecisionId::new(),
            decision_type: proposal.decision_type,
            proposer_id: proposal.proposer_id,
            payload: proposal.payload,
            rationale: proposal.rationale,
            impact_statement: proposal.impact_statement,
            cs_diff: proposal.cs_diff,
            cm_diff: proposal.cm_diff,
            irreversible: proposal.irreversible,
            votes: Vec::new(),
            objections: Vec::new(),
            appeals: Vec::new(),
            state: DecisionState::Voting,
            created_at,
            voting_deadline: proposal.voting_deadline,
            history: Vec::new(),
        }
    }

    /// Move to `next` if the transition table allows it.
    pub fn transition(
        &mut self,
        next: DecisionState,
        at: DateTime<Utc>,
    ) -> Result<(), DecisionError> {
        if !self.state.can_transition_to(next) {
            return Err(DecisionError::IllegalTransition {
                decision_id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.history.push(StateTransition {
            from: self.state,
            to: next,
            at,
        });
        self.state = next;
        Ok(())
    }

    /// Record a vote. A party votes at most once; the first vote stands.
    pub fn record_vote(&mut self, vote: VoteRecord) -> Result<(), DecisionError> {
        if self.state != DecisionState::Voting {
            return Err(DecisionError::NotAcceptingVotes {
                decision_id: self.id.clone(),
                state: self.state,
            });
        }
        if self.has_voted(&vote.party_id) {
            return Err(DecisionError::DuplicateVote {
                decision_id: self.id.clone(),
                party_id: vote.party_id,
            });
        }
        self.votes.push(vote);
        Ok(())
    }

    pub fn vote_of(&self, party_id: &PartyId) -> Option<&VoteRecord> {
        self.votes.iter().find(|v| &v.party_id == party_id)
    }

    pub fn has_voted(&self, party_id: &PartyId) -> bool {
        self.vote_of(party_id).is_some()
    }

    pub fn approving_votes(&self) -> impl Iterator<Item = &VoteRecord> {
        self.votes.iter().filter(|v| v.approve)
    }

    /// `now` is strictly past the voting deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.voting_deadline.is_some_and(|deadline| now > deadline)
    }

    /// Objections not yet resolved.
    pub fn open_objections(&self) -> impl Iterator<Item = &Objection> {
        self.objections.iter().filter(|o| o.resolved_at.is_none())
    }

    /// Whether an unresolved veto is still waiting for arbitration.
    pub fn has_pending_veto(&self) -> bool {
        self.objections.iter().any(Objection::awaiting_arbitration)
    }
}

use thiserror::Error;

use crate::decision::DecisionState;
use crate::ids::{DecisionId, PartyId};

/// Errors raised by decision mutators. The engine turns these into
/// reasoned [`GovernanceResult`](crate::GovernanceResult) rejections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("illegal transition for {decision_id}: {from} -> {to}")]
    IllegalTransition {
        decision_id: DecisionId,
        from: DecisionState,
        to: DecisionState,
    },

    #[error("party {party_id} has already voted on {decision_id}")]
    DuplicateVote {
        decision_id: DecisionId,
        party_id: PartyId,
    },

    #[error("decision {decision_id} is not accepting votes (state {state})")]
    NotAcceptingVotes {
        decision_id: DecisionId,
        state: DecisionState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_vote_display() {
        let err = DecisionError::DuplicateVote {
            decision_id: DecisionId::new(),
            party_id: "bob".into(),
        };
        assert!(err.to_string().contains("bob has already voted"));
    }
}

//! Objection and appeal tracking.
//!
//! Objections pause a decision in `Objected`; vetoes additionally hold it
//! there until an external arbiter rules. Appeals take a settled decision
//! out of circulation. Both are bond-gated through a [`BondPolicy`].

use std::fmt;

use chrono::{DateTime, Utc};
use covenant_types::{
    Appeal, AppealFiling, AppealId, ArbitrationOutcome, Decision, DecisionError, DecisionId,
    DecisionState, DecisionType, Objection, ObjectionFiling, ObjectionId, Party,
};
use thiserror::Error;
use tracing::info;

use crate::config::BondConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisputeError {
    #[error("cannot {action} decision {decision_id} in state {state}")]
    WrongState {
        action: &'static str,
        decision_id: DecisionId,
        state: DecisionState,
    },

    #[error("bond of {offered} does not cover the required {required}")]
    InsufficientBond { required: u64, offered: u64 },

    #[error("decision {0} has a veto awaiting external arbitration")]
    PendingVeto(DecisionId),

    #[error("objection {0} not found")]
    ObjectionNotFound(ObjectionId),

    #[error("objection {0} is not a veto awaiting arbitration")]
    NotArbitrable(ObjectionId),

    #[error(transparent)]
    Transition(#[from] DecisionError),
}

/// Prices objections and appeals.
pub trait BondPolicy: Send + Sync + fmt::Debug {
    fn objection_bond(&self, decision_type: DecisionType, filer: &Party) -> u64;

    fn appeal_bond(&self, decision_type: DecisionType, filer: &Party) -> u64;
}

/// Flat per-type amounts from [`BondConfig`], for objections and appeals
/// alike.
#[derive(Debug, Clone, Default)]
pub struct TieredBondPolicy {
    amounts: BondConfig,
}

impl TieredBondPolicy {
    pub fn new(amounts: BondConfig) -> Self {
        Self { amounts }
    }
}

impl BondPolicy for TieredBondPolicy {
    fn objection_bond(&self, decision_type: DecisionType, _filer: &Party) -> u64 {
        self.amounts.amount_for(decision_type)
    }

    fn appeal_bond(&self, decision_type: DecisionType, _filer: &Party) -> u64 {
        self.amounts.amount_for(decision_type)
    }
}

/// Applies objections, arbitration rulings and appeals to decisions.
#[derive(Debug)]
pub struct DisputeDesk {
    policy: Box<dyn BondPolicy>,
}

impl DisputeDesk {
    pub fn new(policy: Box<dyn BondPolicy>) -> Self {
        Self { policy }
    }

    pub fn file_objection(
        &self,
        decision: &mut Decision,
        filer: &Party,
        filing: ObjectionFiling,
        now: DateTime<Utc>,
    ) -> Result<Objection, DisputeError> {
        if !matches!(decision.state, DecisionState::Voting | DecisionState::Objected) {
            return Err(wrong_state("object to", decision));
        }
        let required = self.policy.objection_bond(decision.decision_type, filer);
        check_bond(required, filing.bond)?;

        if decision.state == DecisionState::Voting {
            decision.transition(DecisionState::Objected, now)?;
        }
        let objection = Objection {
            objection_id: ObjectionId::new(),
            decision_id: decision.id.clone(),
            party_id: filing.party_id,
            basis: filing.basis,
            detail: filing.detail,
            is_veto: filing.is_veto,
            veto_category: filing.veto_category,
            bond_amount: filing.bond,
            filed_at: now,
            resolved_at: None,
            arbitration: None,
        };
        decision.objections.push(objection.clone());
        info!(
            decision_id = %decision.id,
            objection_id = %objection.objection_id,
            is_veto = objection.is_veto,
            "Objection filed"
        );
        Ok(objection)
    }

    /// Resolve every open objection and resume voting. Returns how many
    /// objections were closed.
    pub fn resolve_objection(
        &self,
        decision: &mut Decision,
        now: DateTime<Utc>,
    ) -> Result<usize, DisputeError> {
        if decision.state != DecisionState::Objected {
            return Err(wrong_state("resolve objections on", decision));
        }
        if decision.has_pending_veto() {
            return Err(DisputeError::PendingVeto(decision.id.clone()));
        }
        decision.transition(DecisionState::Voting, now)?;

        let mut closed = 0;
        for objection in decision
            .objections
            .iter_mut()
            .filter(|o| o.resolved_at.is_none())
        {
            objection.resolved_at = Some(now);
            closed += 1;
        }
        info!(decision_id = %decision.id, closed, "Objections resolved; voting resumed");
        Ok(closed)
    }

    /// Record an external arbiter's ruling on a veto. A sustained veto
    /// rejects the decision; a dismissed one stops blocking resolution.
    pub fn record_arbitration(
        &self,
        decision: &mut Decision,
        objection_id: &ObjectionId,
        outcome: ArbitrationOutcome,
        now: DateTime<Utc>,
    ) -> Result<DecisionState, DisputeError> {
        if decision.state != DecisionState::Objected {
            return Err(wrong_state("arbitrate", decision));
        }
        let index = decision
            .objections
            .iter()
            .position(|o| &o.objection_id == objection_id)
            .ok_or_else(|| DisputeError::ObjectionNotFound(objection_id.clone()))?;
        if !decision.objections[index].awaiting_arbitration() {
            return Err(DisputeError::NotArbitrable(objection_id.clone()));
        }

        if outcome == ArbitrationOutcome::Sustained {
            decision.transition(DecisionState::Rejected, now)?;
            // the rejection settles every objection still open
            for objection in decision
                .objections
                .iter_mut()
                .filter(|o| o.resolved_at.is_none())
            {
                objection.resolved_at = Some(now);
            }
        }
        decision.objections[index].arbitration = Some(outcome);
        info!(
            decision_id = %decision.id,
            objection_id = %objection_id,
            outcome = ?outcome,
            state = %decision.state,
            "Veto arbitrated"
        );
        Ok(decision.state)
    }

    pub fn file_appeal(
        &self,
        decision: &mut Decision,
        filer: &Party,
        filing: AppealFiling,
        now: DateTime<Utc>,
    ) -> Result<Appeal, DisputeError> {
        if !decision.state.is_appealable() {
            return Err(wrong_state("appeal", decision));
        }
        let required = self.policy.appeal_bond(decision.decision_type, filer);
        check_bond(required, filing.bond)?;

        decision.transition(DecisionState::Appealed, now)?;
        let appeal = Appeal {
            appeal_id: AppealId::new(),
            decision_id: decision.id.clone(),
            party_id: filing.party_id,
            grounds: filing.grounds,
            detail: filing.detail,
            bond_amount: filing.bond,
            filed_at: now,
        };
        decision.appeals.push(appeal.clone());
        info!(decision_id = %decision.id, appeal_id = %appeal.appeal_id, "Appeal filed");
        Ok(appeal)
    }
}

impl Default for DisputeDesk {
    fn default() -> Self {
        Self::new(Box::new(TieredBondPolicy::default()))
    }
}

fn wrong_state(action: &'static str, decision: &Decision) -> DisputeError {
    DisputeError::WrongState {
        action,
        decision_id: decision.id.clone(),
        state: decision.state,
    }
}

fn check_bond(required: u64, offered: u64) -> Result<(), DisputeError> {
    if offered < required {
        return Err(DisputeError::InsufficientBond { required, offered });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_types::{DecisionProposal, VetoCategory};

    fn decision(decision_type: DecisionType) -> Decision {
        Decision::open(
            DecisionProposal::new("alice", decision_type, serde_json::Value::Null),
            Utc::now(),
        )
    }

    fn bob() -> Party {
        Party::new("bob", "H")
    }

    #[test]
    fn objection_pauses_voting() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D2);
        let objection = desk
            .file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "scope", "too broad"), Utc::now())
            .unwrap();
        assert_eq!(d.state, DecisionState::Objected);
        assert_eq!(objection.bond_amount, 0);

        // a second objection piles on without another transition
        desk.file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "cost", ""), Utc::now())
            .unwrap();
        assert_eq!(d.history.len(), 1);

        assert_eq!(desk.resolve_objection(&mut d, Utc::now()), Ok(2));
        assert_eq!(d.state, DecisionState::Voting);
        assert_eq!(d.open_objections().count(), 0);
    }

    #[test]
    fn bond_is_enforced_per_type() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D3);
        let err = desk
            .file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "x", "y").bond(99), Utc::now())
            .unwrap_err();
        assert_eq!(err, DisputeError::InsufficientBond { required: 100, offered: 99 });
        assert_eq!(d.state, DecisionState::Voting);

        desk.file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "x", "y").bond(100), Utc::now())
            .unwrap();
        assert_eq!(d.objections[0].bond_amount, 100);
    }

    #[test]
    fn veto_blocks_resolution_until_arbitrated() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D2);
        let veto = desk
            .file_objection(
                &mut d,
                &bob(),
                ObjectionFiling::new("bob", "safety", "unsafe").veto(VetoCategory::Safety),
                Utc::now(),
            )
            .unwrap();

        assert!(matches!(
            desk.resolve_objection(&mut d, Utc::now()),
            Err(DisputeError::PendingVeto(_))
        ));

        let state = desk
            .record_arbitration(&mut d, &veto.objection_id, ArbitrationOutcome::Dismissed, Utc::now())
            .unwrap();
        assert_eq!(state, DecisionState::Objected);
        assert!(desk.resolve_objection(&mut d, Utc::now()).is_ok());
        assert_eq!(d.state, DecisionState::Voting);
    }

    #[test]
    fn sustained_veto_rejects() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D2);
        let veto = desk
            .file_objection(
                &mut d,
                &bob(),
                ObjectionFiling::new("bob", "rights", "").veto(VetoCategory::Rights),
                Utc::now(),
            )
            .unwrap();
        desk.file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "cost", ""), Utc::now())
            .unwrap();
        let state = desk
            .record_arbitration(&mut d, &veto.objection_id, ArbitrationOutcome::Sustained, Utc::now())
            .unwrap();
        assert_eq!(state, DecisionState::Rejected);
        assert!(d.objections.iter().all(|o| o.resolved_at.is_some()));
        assert_eq!(d.open_objections().count(), 0);
        assert!(!d.has_pending_veto());
    }

    #[test]
    fn plain_objection_is_not_arbitrable() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D2);
        let objection = desk
            .file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "x", ""), Utc::now())
            .unwrap();
        assert_eq!(
            desk.record_arbitration(&mut d, &objection.objection_id, ArbitrationOutcome::Sustained, Utc::now()),
            Err(DisputeError::NotArbitrable(objection.objection_id.clone()))
        );
    }

    #[test]
    fn appeals_only_from_settled_states() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D2);
        assert!(matches!(
            desk.file_appeal(&mut d, &bob(), AppealFiling::new("bob", "process", ""), Utc::now()),
            Err(DisputeError::WrongState { .. })
        ));

        d.transition(DecisionState::Rejected, Utc::now()).unwrap();
        let appeal = desk
            .file_appeal(&mut d, &bob(), AppealFiling::new("bob", "process", "votes miscounted"), Utc::now())
            .unwrap();
        assert_eq!(d.state, DecisionState::Appealed);
        assert_eq!(d.appeals, vec![appeal]);
    }

    #[test]
    fn objections_refused_after_settlement() {
        let desk = DisputeDesk::default();
        let mut d = decision(DecisionType::D1);
        d.transition(DecisionState::Approved, Utc::now()).unwrap();
        let err = desk
            .file_objection(&mut d, &bob(), ObjectionFiling::new("bob", "late", ""), Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("APPROVED"));
    }
}

//! Shared fixtures for engine scenario tests.

#![allow(dead_code)]

use chrono::Utc;
use covenant_engine::{GovernanceConfig, GovernanceEngine, ManualClock};
use covenant_types::{DecisionId, DecisionProposal, DecisionType, Party, PartyId};

pub fn engine_with_clock(config: GovernanceConfig) -> (GovernanceEngine, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let engine = GovernanceEngine::builder(config)
        .clock(clock.clone())
        .build()
        .expect("valid config");
    (engine, clock)
}

/// Engine with parties `(id, class)` registered.
pub fn engine_with_parties(parties: &[(&str, &str)]) -> (GovernanceEngine, ManualClock) {
    let (mut engine, clock) = engine_with_clock(GovernanceConfig::default());
    for (id, class) in parties {
        let result = engine.register_party(Party::new(*id, *class));
        assert!(result.legitimate, "{result}");
    }
    (engine, clock)
}

pub fn propose(engine: &mut GovernanceEngine, proposal: DecisionProposal) -> DecisionId {
    let result = engine.propose_decision(proposal);
    assert!(result.legitimate, "{result}");
    result.decision_id.expect("decision id")
}

pub fn simple(proposer: &str, decision_type: DecisionType) -> DecisionProposal {
    DecisionProposal::new(proposer, decision_type, serde_json::json!({ "op": "noop" }))
        .rationale("scenario")
        .impact_statement("none")
}

pub fn vote(engine: &mut GovernanceEngine, id: &DecisionId, party: &str, approve: bool) {
    let result = engine.cast_vote(id, &PartyId::new(party), approve);
    assert!(result.legitimate, "{result}");
}

/// Propose, vote and evaluate a decision that every listed party approves.
pub fn approved(engine: &mut GovernanceEngine, proposal: DecisionProposal, voters: &[&str]) -> DecisionId {
    let id = propose(engine, proposal);
    for voter in voters {
        vote(engine, &id, voter, true);
    }
    let result = engine.evaluate_decision(&id);
    assert!(result.legitimate, "{result}");
    id
}

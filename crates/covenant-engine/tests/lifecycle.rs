//! End-to-end decision lifecycle scenarios.

mod common;

use chrono::Duration;
use covenant_audit::AuditEventType;
use covenant_engine::{Clock, ParticipantRole};
use covenant_types::{CmDiff, CsDiff, DecisionState, DecisionType, ObjectionFiling, PartyClass, PartyId};

use common::*;

#[test]
fn d0_is_preauthorized_without_votes() {
    let (mut engine, _) = engine_with_parties(&[("ops", "H")]);
    let result = engine.propose_decision(simple("ops", DecisionType::D0));

    assert!(result.legitimate);
    assert!(result.reason.contains("pre-authorized"));
    let id = result.decision_id.unwrap();
    assert!(engine.get_decision(&id).is_none());

    let entries = engine.audit_log().get_entries_by_decision(&id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, AuditEventType::D0Preauthorized);
    assert!(engine.verify_decision_audit(&id).legitimate);
}

#[test]
fn approved_decision_executes_with_evidence() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H"), ("m1", "M")]);
    let id = approved(&mut engine, simple("alice", DecisionType::D2), &["alice", "bob", "m1"]);

    let result = engine.execute_decision(&id);
    assert!(result.legitimate, "{result}");
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Executed);

    let package = engine.evidence_package(&id).unwrap();
    assert!(package.verify_hash());
    assert_eq!(package.participants[0].party_id, PartyId::new("alice"));
    assert_eq!(package.participants[0].role, ParticipantRole::Proposer);
    assert_eq!(package.signatures.len(), 3);
    assert!(package.threshold_proof.satisfied);

    // the anchor precedes the executed entry in the chain
    let anchor = package.audit_anchor_ref.clone().unwrap();
    let kinds: Vec<AuditEventType> = engine
        .audit_log()
        .get_entries_by_decision(&id)
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::DecisionProposed,
            AuditEventType::VoteCast,
            AuditEventType::VoteCast,
            AuditEventType::VoteCast,
            AuditEventType::DecisionEvaluated,
            AuditEventType::EpAnchored,
            AuditEventType::DecisionExecuted,
        ]
    );
    assert!(engine.audit_log().verify_entry_inclusion(&anchor));
    assert!(engine.verify_decision_audit(&id).legitimate);
    assert!(engine.verify_audit_log().legitimate);
}

#[test]
fn d0_cannot_carry_constraint_or_capability_changes() {
    let (mut engine, _) = engine_with_parties(&[("ops", "H")]);
    let audit_len = engine.audit_log().len();

    let with_cs = simple("ops", DecisionType::D0).cs_diff(CsDiff {
        add_forbidden: vec!["net.*".into()],
        ..CsDiff::default()
    });
    let result = engine.propose_decision(with_cs);
    assert!(!result.legitimate);
    assert!(result.reason.contains("require a governed (D1+) decision"));

    let with_cm = simple("ops", DecisionType::D0).cm_diff(CmDiff::default());
    assert!(!engine.propose_decision(with_cm).legitimate);

    assert!(!engine.constraint_set().is_forbidden("net.connect"));
    assert!(engine.check_action("net.connect", None).legitimate);
    // only the check_action entry was added
    assert_eq!(engine.audit_log().len(), audit_len + 1);
}

#[test]
fn objected_decision_cannot_execute() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let id = propose(&mut engine, simple("alice", DecisionType::D1));
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", true);
    assert!(engine
        .file_objection(&id, ObjectionFiling::new("bob", "timing", ""))
        .legitimate);

    let result = engine.execute_decision(&id);
    assert!(!result.legitimate);
    assert!(result.reason.contains("only APPROVED decisions execute"));
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Objected);
    assert!(engine.evidence_package(&id).is_none());
}

#[test]
fn no_skip_to_executed() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let id = propose(&mut engine, simple("alice", DecisionType::D1));

    let result = engine.execute_decision(&id);
    assert!(!result.legitimate);
    assert!(result.reason.contains("only APPROVED decisions execute"));
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Voting);
    assert!(engine.evidence_package(&id).is_none());

    // rejected decisions cannot execute either
    vote(&mut engine, &id, "alice", false);
    vote(&mut engine, &id, "bob", false);
    assert!(!engine.evaluate_decision(&id).legitimate);
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Rejected);
    assert!(!engine.execute_decision(&id).legitimate);
}

#[test]
fn executed_decision_cannot_execute_again() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let id = approved(&mut engine, simple("alice", DecisionType::D1), &["alice", "bob"]);
    assert!(engine.execute_decision(&id).legitimate);
    let again = engine.execute_decision(&id);
    assert!(!again.legitimate);
    assert!(again.reason.contains("EXECUTED"));
}

#[test]
fn double_vote_rejected_and_first_vote_stands() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let id = propose(&mut engine, simple("alice", DecisionType::D1));
    vote(&mut engine, &id, "alice", true);

    let second = engine.cast_vote(&id, &PartyId::new("alice"), false);
    assert!(!second.legitimate);
    assert!(second.reason.contains("already voted"));

    let decision = engine.get_decision(&id).unwrap();
    assert_eq!(decision.votes.len(), 1);
    assert!(decision.votes[0].approve);
}

#[test]
fn class_fairness_silent_class_blocks_approval() {
    let (mut engine, _) = engine_with_parties(&[("h1", "H"), ("h2", "H"), ("m1", "M")]);
    let id = propose(&mut engine, simple("h1", DecisionType::D2));
    vote(&mut engine, &id, "h1", true);
    vote(&mut engine, &id, "h2", true);

    let result = engine.evaluate_decision(&id);
    assert!(!result.legitimate);
    assert_eq!(result.reason, "missing class-wise assent from: [M]");
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Rejected);

    let proof = &result.data["threshold_proof"];
    assert_eq!(proof["approval_ratio"], 1.0);
    assert_eq!(proof["class_wise_assent"]["M"], false);
}

#[test]
fn expired_deadline_moves_to_expired() {
    let (mut engine, clock) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let deadline = clock.now() + Duration::hours(1);
    let id = propose(&mut engine, simple("alice", DecisionType::D1).voting_deadline(deadline));
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", true);

    clock.advance(Duration::hours(2));
    let result = engine.evaluate_decision(&id);
    assert!(!result.legitimate);
    assert!(result.reason.contains("expired"));
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Expired);

    // terminal: no appeal, no execution
    assert!(!engine.execute_decision(&id).legitimate);
    assert!(!engine.evaluate_decision(&id).legitimate);
}

#[test]
fn deadline_is_inclusive() {
    let (mut engine, clock) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let deadline = clock.now() + Duration::hours(1);
    let id = propose(&mut engine, simple("alice", DecisionType::D1).voting_deadline(deadline));
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", true);

    clock.set(deadline);
    assert!(engine.evaluate_decision(&id).legitimate);
}

#[test]
fn departed_class_is_no_longer_required_to_assent() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H"), ("m1", "M")]);
    let id = propose(&mut engine, simple("alice", DecisionType::D1));
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", true);

    // m1 leaves before voting; M no longer has registered parties
    assert!(engine
        .remove_party(&PartyId::new("m1"), &PartyId::new("m1"))
        .legitimate);
    assert!(engine.evaluate_decision(&id).legitimate);

    let decision = engine.get_decision(&id).unwrap();
    assert_eq!(decision.state, DecisionState::Approved);
    assert!(!engine.registry().classes().contains(&PartyClass::new("M")));
}

#[test]
fn late_class_registration_aborts_execution() {
    let (mut engine, _) = engine_with_parties(&[("alice", "H"), ("bob", "H")]);
    let id = approved(&mut engine, simple("alice", DecisionType::D1), &["alice", "bob"]);

    // a new class joins before execution and has not assented
    engine.register_party(covenant_types::Party::new("m1", "M"));
    let result = engine.execute_decision(&id);
    assert!(!result.legitimate);
    assert!(result.reason.contains("aborted"));
    assert_eq!(engine.get_decision(&id).unwrap().state, DecisionState::Approved);
    assert!(engine.evidence_package(&id).is_none());

    let last = engine.audit_log().entries().last().unwrap().clone();
    assert_eq!(last.event_type, AuditEventType::ExecutionAborted);
}

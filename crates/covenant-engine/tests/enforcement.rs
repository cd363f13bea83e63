//! Action authorization through registered enforcers and forbidden patterns.

use covenant_audit::AuditEventType;
use covenant_engine::{
    ActionContext, GovernanceConfig, GovernanceEngine, ManualClock, SanctionLevel,
    SandboxEnforcer, SanctionsLadder,
};
use covenant_types::ConstraintSet;

fn gated_engine() -> GovernanceEngine {
    GovernanceEngine::builder(GovernanceConfig::default())
        .clock(ManualClock::default())
        .enforcer(SandboxEnforcer::new().sandbox("intern").allow("docs.*"))
        .enforcer(
            SanctionsLadder::new()
                .restrict("payments.*")
                .with_sanction("mallory", SanctionLevel::Suspended)
                .with_sanction("trent", SanctionLevel::Restricted),
        )
        .constraints(ConstraintSet::new().with_forbidden("infra.shutdown"))
        .build()
        .unwrap()
}

#[test]
fn enforcers_are_registered_in_order() {
    let engine = gated_engine();
    assert_eq!(engine.enforcer_names(), vec!["sandbox", "sanctions"]);
}

#[test]
fn sandboxed_actor_limited_to_allow_list() {
    let mut engine = gated_engine();
    assert!(engine
        .check_action("docs.edit", Some(ActionContext::actor("intern")))
        .legitimate);

    let denied = engine.check_action("deploy.prod", Some(ActionContext::actor("intern")));
    assert!(!denied.legitimate);
    assert!(denied.reason.contains("sandbox: sandboxed actor intern"));

    // other actors are not confined
    assert!(engine
        .check_action("deploy.prod", Some(ActionContext::actor("alice")))
        .legitimate);
}

#[test]
fn sanctions_deny_by_level() {
    let mut engine = gated_engine();
    assert!(!engine
        .check_action("docs.read", Some(ActionContext::actor("mallory")))
        .legitimate);
    assert!(!engine
        .check_action("payments.send", Some(ActionContext::actor("trent")))
        .legitimate);
    assert!(engine
        .check_action("docs.read", Some(ActionContext::actor("trent")))
        .legitimate);
}

#[test]
fn every_denial_source_is_reported() {
    let mut engine = gated_engine();
    let result = engine.check_action("infra.shutdown", Some(ActionContext::actor("intern")));
    assert!(!result.legitimate);

    let denials = result.data["denials"].as_array().unwrap();
    assert_eq!(denials.len(), 2);
    assert!(result.reason.contains("constraints: forbidden by infra.shutdown"));

    let last = engine.audit_log().entries().last().unwrap();
    assert_eq!(last.event_type, AuditEventType::ActionDenied);
    assert_eq!(last.actor_id.as_deref(), Some("intern"));
}

#[test]
fn anonymous_actions_only_face_constraints() {
    let mut engine = gated_engine();
    assert!(engine.check_action("payments.send", None).legitimate);
    assert!(!engine.check_action("infra.shutdown", None).legitimate);
}

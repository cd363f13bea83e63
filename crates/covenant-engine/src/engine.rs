//! The governance engine.
//!
//! `GovernanceEngine` owns the party registry, the decision table, the
//! audit log, the emergency manager and the enforcement gate, and exposes
//! every governance operation. Each operation returns a [`GovernanceResult`]:
//! domain failures are `legitimate == false` with a reason, never panics or
//! errors. Mutating operations take `&mut self`, so a single owner serializes
//! writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use covenant_audit::{AuditEntry, AuditEvent, AuditEventType, AuditLog, ChainVerification};
use covenant_types::{
    AppealFiling, ArbitrationOutcome, CapabilityManifest, ConstraintSet, Decision, DecisionId,
    DecisionProposal, DecisionState, DecisionType, GovernanceResult, ObjectionFiling, ObjectionId,
    Party, PartyId, ThresholdProof, VoteRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::GovernanceConfig;
use crate::disputes::{BondPolicy, DisputeDesk, TieredBondPolicy};
use crate::emergency::{EmergencyManager, EmergencyState};
use crate::enforcement::{ActionContext, EnforcementGate, EnforcementInterface};
use crate::error::EngineError;
use crate::evaluator::ProofEvaluator;
use crate::evidence::EvidencePackage;
use crate::registry::PartyRegistry;
use crate::signing::{DigestSigner, VoteSigner};
use crate::snapshot::{EngineSnapshot, SNAPSHOT_VERSION};

/// One party's ballot in an emergency vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub party_id: PartyId,
    pub approve: bool,
}

impl Ballot {
    pub fn new(party_id: impl Into<PartyId>, approve: bool) -> Self {
        Self {
            party_id: party_id.into(),
            approve,
        }
    }
}

/// Builder for [`GovernanceEngine`].
#[derive(Debug)]
pub struct GovernanceEngineBuilder {
    config: GovernanceConfig,
    clock: Arc<dyn Clock>,
    signer: Box<dyn VoteSigner>,
    bond_policy: Option<Box<dyn BondPolicy>>,
    gate: EnforcementGate,
    constraints: ConstraintSet,
    capabilities: CapabilityManifest,
    snapshot: Option<EngineSnapshot>,
}

impl GovernanceEngineBuilder {
    pub fn new(config: GovernanceConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            signer: Box::new(DigestSigner),
            bond_policy: None,
            gate: EnforcementGate::new(),
            constraints: ConstraintSet::new(),
            capabilities: CapabilityManifest::new(),
            snapshot: None,
        }
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn signer(mut self, signer: impl VoteSigner + 'static) -> Self {
        self.signer = Box::new(signer);
        self
    }

    /// Replace the default [`TieredBondPolicy`].
    pub fn bond_policy(mut self, policy: impl BondPolicy + 'static) -> Self {
        self.bond_policy = Some(Box::new(policy));
        self
    }

    pub fn enforcer(mut self, enforcer: impl EnforcementInterface + 'static) -> Self {
        self.gate.register(Box::new(enforcer));
        self
    }

    pub fn constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn capabilities(mut self, capabilities: CapabilityManifest) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Start from persisted state. The snapshot's configuration, constraints
    /// and capabilities replace the builder's.
    pub fn restore(mut self, snapshot: EngineSnapshot) -> Self {
        self.config = snapshot.config.clone();
        self.snapshot = Some(snapshot);
        self
    }

    pub fn build(self) -> Result<GovernanceEngine, EngineError> {
        self.config.validate()?;

        let bond_policy: Box<dyn BondPolicy> = match self.bond_policy {
            Some(policy) => policy,
            None => Box::new(TieredBondPolicy::new(self.config.bonds.clone())),
        };

        let mut engine = GovernanceEngine {
            evaluator: ProofEvaluator::new(
                self.config.quorum.clone(),
                self.config.thresholds.clone(),
            ),
            emergency: EmergencyManager::new(self.config.emergency.clone()),
            disputes: DisputeDesk::new(bond_policy),
            registry: PartyRegistry::new(),
            decisions: BTreeMap::new(),
            evidence: BTreeMap::new(),
            audit: AuditLog::new(),
            gate: self.gate,
            constraints: self.constraints,
            capabilities: self.capabilities,
            signer: self.signer,
            clock: self.clock,
            config: self.config,
        };

        if let Some(snapshot) = self.snapshot {
            engine.load(snapshot)?;
        }
        Ok(engine)
    }
}

#[derive(Debug)]
pub struct GovernanceEngine {
    config: GovernanceConfig,
    registry: PartyRegistry,
    evaluator: ProofEvaluator,
    decisions: BTreeMap<DecisionId, Decision>,
    evidence: BTreeMap<DecisionId, EvidencePackage>,
    audit: AuditLog,
    emergency: EmergencyManager,
    disputes: DisputeDesk,
    gate: EnforcementGate,
    constraints: ConstraintSet,
    capabilities: CapabilityManifest,
    signer: Box<dyn VoteSigner>,
    clock: Arc<dyn Clock>,
}

impl GovernanceEngine {
    /// Engine with the system clock, digest signer and tiered bonds.
    pub fn new(config: GovernanceConfig) -> Result<Self, EngineError> {
        GovernanceEngineBuilder::new(config).build()
    }

    pub fn builder(config: GovernanceConfig) -> GovernanceEngineBuilder {
        GovernanceEngineBuilder::new(config)
    }

    /// Rebuild an engine from a snapshot with default collaborators.
    pub fn from_snapshot(snapshot: EngineSnapshot) -> Result<Self, EngineError> {
        GovernanceEngineBuilder::new(GovernanceConfig::default())
            .restore(snapshot)
            .build()
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Self::from_snapshot(EngineSnapshot::from_json(json)?)
    }

    fn load(&mut self, snapshot: EngineSnapshot) -> Result<(), EngineError> {
        for decision in snapshot.decisions {
            let id = decision.id.clone();
            if self.decisions.insert(id.clone(), decision).is_some() {
                return Err(EngineError::InconsistentSnapshot(format!(
                    "decision {id} appears twice"
                )));
            }
        }
        for package in snapshot.evidence_packages {
            if !self.decisions.contains_key(&package.decision_id) {
                return Err(EngineError::InconsistentSnapshot(format!(
                    "evidence package {} refers to unknown decision {}",
                    package.ep_id, package.decision_id
                )));
            }
            self.evidence.insert(package.decision_id.clone(), package);
        }
        self.registry = snapshot.parties;
        self.audit = snapshot.audit_log;
        self.emergency = EmergencyManager::restore(
            self.config.emergency.clone(),
            snapshot.emergency,
            snapshot.emergency_history,
        );
        self.constraints = snapshot.constraints;
        self.capabilities = snapshot.capabilities;

        let verification = self.audit.verify_chain();
        if !verification.valid {
            warn!(
                first_invalid_index = ?verification.first_invalid_index,
                "Restored snapshot has a broken audit chain"
            );
        }
        info!(
            parties = self.registry.len(),
            decisions = self.decisions.len(),
            audit_entries = self.audit.len(),
            "Engine restored from snapshot"
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Parties
    // ---------------------------------------------------------------------

    pub fn register_party(&mut self, party: Party) -> GovernanceResult {
        let party_id = party.id.clone();
        let class = party.class.clone();
        if let Err(err) = self.registry.register(party) {
            return rejected(err.to_string());
        }
        self.record(
            AuditEntry::event(AuditEventType::PartyRegistered)
                .data(json!({ "party_id": party_id, "class": class }))
                .actor(party_id.as_str())
                .summary(format!("party {party_id} registered as {class}")),
        );
        info!(party_id = %party_id, class = %class, "Party registered");
        GovernanceResult::allow(format!("party {party_id} registered"))
            .with_data("party_id", &party_id)
            .with_data("class", &class)
    }

    /// Remove a party. Parties may always remove themselves; removing
    /// anyone else requires `requested_by` to be a configured admin.
    /// Votes already cast stay on their decisions.
    pub fn remove_party(&mut self, party_id: &PartyId, requested_by: &PartyId) -> GovernanceResult {
        if !self.registry.contains(party_id) {
            return rejected(format!("party {party_id} is not registered"));
        }
        if requested_by != party_id && !self.config.registry.is_admin(requested_by) {
            return rejected(format!(
                "{requested_by} is not authorized to remove party {party_id}"
            ));
        }
        let removed = match self.registry.remove(party_id) {
            Ok(party) => party,
            Err(err) => return rejected(err.to_string()),
        };
        self.record(
            AuditEntry::event(AuditEventType::PartyRemoved)
                .data(json!({ "party_id": party_id, "class": removed.class, "requested_by": requested_by }))
                .actor(requested_by.as_str())
                .summary(format!("party {party_id} removed by {requested_by}")),
        );
        info!(party_id = %party_id, requested_by = %requested_by, "Party removed");
        GovernanceResult::allow(format!("party {party_id} removed"))
    }

    // ---------------------------------------------------------------------
    // Decisions
    // ---------------------------------------------------------------------

    /// Open a decision for voting. D0 proposals are pre-authorized on the
    /// spot and never enter the decision table.
    pub fn propose_decision(&mut self, proposal: DecisionProposal) -> GovernanceResult {
        self.expire_emergency_if_due();
        if !self.registry.contains(&proposal.proposer_id) {
            return rejected(format!(
                "proposer {} is not a registered party",
                proposal.proposer_id
            ));
        }
        if let Err(err) = self.emergency.check_permanent_change_ban(&proposal) {
            return rejected(err.to_string());
        }

        if !proposal.decision_type.requires_votes() {
            if proposal.cs_diff.is_some() || proposal.cm_diff.is_some() {
                return rejected(
                    "constraint/capability changes require a governed (D1+) decision",
                );
            }
            let id = DecisionId::new();
            self.record(
                AuditEntry::event(AuditEventType::D0Preauthorized)
                    .data(json!({ "payload": proposal.payload, "rationale": proposal.rationale }))
                    .decision(&id)
                    .actor(proposal.proposer_id.as_str())
                    .summary(format!("D0 decision {id} pre-authorized")),
            );
            info!(decision_id = %id, proposer = %proposal.proposer_id, "D0 decision pre-authorized");
            return GovernanceResult::allow("D0 operational decision pre-authorized")
                .with_decision(id)
                .with_data("decision_type", DecisionType::D0);
        }

        let decision = Decision::open(proposal, self.clock.now());
        let id = decision.id.clone();
        self.record(
            AuditEntry::event(AuditEventType::DecisionProposed)
                .data(json!({
                    "decision_type": decision.decision_type,
                    "irreversible": decision.irreversible,
                    "voting_deadline": decision.voting_deadline,
                    "has_cs_diff": decision.cs_diff.is_some(),
                    "has_cm_diff": decision.cm_diff.is_some(),
                }))
                .decision(&id)
                .actor(decision.proposer_id.as_str())
                .summary(format!("{} decision proposed", decision.decision_type)),
        );
        info!(
            decision_id = %id,
            decision_type = %decision.decision_type,
            proposer = %decision.proposer_id,
            "Decision proposed"
        );
        let decision_type = decision.decision_type;
        self.decisions.insert(id.clone(), decision);
        GovernanceResult::allow("decision proposed; voting open")
            .with_decision(id)
            .with_data("decision_type", decision_type)
            .with_data("state", DecisionState::Voting)
    }

    pub fn cast_vote(
        &mut self,
        decision_id: &DecisionId,
        party_id: &PartyId,
        approve: bool,
    ) -> GovernanceResult {
        let now = self.clock.now();
        let Some(party_class) = self.registry.get(party_id).map(|p| p.class.clone()) else {
            return rejected(format!("party {party_id} is not registered"));
        };
        let Some(decision) = self.decisions.get_mut(decision_id) else {
            return unknown_decision(decision_id);
        };
        if decision.state == DecisionState::Voting && decision.is_expired(now) {
            return rejected(format!(
                "voting deadline for decision {decision_id} has passed"
            ))
            .with_decision(decision_id.clone());
        }

        let signature = self.signer.sign(party_id, &decision_id.to_string(), approve);
        let vote = VoteRecord {
            party_id: party_id.clone(),
            party_class: party_class.clone(),
            approve,
            signature,
            cast_at: now,
        };
        if let Err(err) = decision.record_vote(vote) {
            return rejected(err.to_string()).with_decision(decision_id.clone());
        }
        let vote_count = decision.votes.len();

        self.record(
            AuditEntry::event(AuditEventType::VoteCast)
                .data(json!({ "approve": approve, "party_class": party_class }))
                .decision(decision_id)
                .actor(party_id.as_str())
                .summary(format!(
                    "{party_id} voted {} on {decision_id}",
                    if approve { "approve" } else { "reject" }
                )),
        );
        debug!(decision_id = %decision_id, party_id = %party_id, approve, "Vote recorded");
        GovernanceResult::allow("vote recorded")
            .with_decision(decision_id.clone())
            .with_data("vote_count", vote_count)
    }

    /// Evaluate a decision in `VOTING`. The deadline is checked first; then
    /// quorum (a miss leaves the decision open); then threshold and
    /// class-wise assent, which settle it as `APPROVED` or `REJECTED`.
    pub fn evaluate_decision(&mut self, decision_id: &DecisionId) -> GovernanceResult {
        let now = self.clock.now();
        let registered_classes = self.registry.classes();
        let Some(decision) = self.decisions.get_mut(decision_id) else {
            return unknown_decision(decision_id);
        };
        if decision.state != DecisionState::Voting {
            return rejected(format!(
                "decision {decision_id} is {}; only VOTING decisions can be evaluated",
                decision.state
            ))
            .with_decision(decision_id.clone());
        }

        if decision.is_expired(now) {
            if let Err(err) = decision.transition(DecisionState::Expired, now) {
                return rejected(err.to_string());
            }
            let deadline = decision.voting_deadline;
            self.record(
                AuditEntry::event(AuditEventType::DecisionExpired)
                    .data(json!({ "voting_deadline": deadline }))
                    .decision(decision_id)
                    .summary(format!("decision {decision_id} expired")),
            );
            info!(decision_id = %decision_id, "Decision expired");
            return GovernanceResult::deny(format!(
                "decision {decision_id} expired: voting deadline passed"
            ))
            .with_decision(decision_id.clone())
            .with_data("state", DecisionState::Expired);
        }

        let quorum = self.evaluator.check_quorum(&decision.votes);
        if !quorum.satisfied {
            let reason = format!(
                "quorum not met: {} distinct voters (minimum {})",
                quorum.total_voters, self.config.quorum.min_total_voters
            );
            self.record(
                AuditEntry::event(AuditEventType::DecisionEvaluated)
                    .data(json!({ "outcome": "quorum_not_met", "quorum_proof": quorum }))
                    .decision(decision_id)
                    .summary(reason.clone()),
            );
            return rejected(reason)
                .with_decision(decision_id.clone())
                .with_data("state", DecisionState::Voting)
                .with_data("quorum_proof", &quorum);
        }

        let threshold = self.evaluator.check_threshold(
            &decision.votes,
            decision.decision_type,
            &registered_classes,
        );
        let (next, reason) = if threshold.satisfied {
            (DecisionState::Approved, "decision approved".to_string())
        } else {
            (DecisionState::Rejected, threshold_failure(&threshold))
        };
        if let Err(err) = decision.transition(next, now) {
            return rejected(err.to_string());
        }

        self.record(
            AuditEntry::event(AuditEventType::DecisionEvaluated)
                .data(json!({
                    "outcome": next,
                    "quorum_proof": quorum,
                    "threshold_proof": threshold,
                }))
                .decision(decision_id)
                .summary(reason.clone()),
        );
        info!(
            decision_id = %decision_id,
            state = %next,
            approval_ratio = threshold.approval_ratio,
            "Decision evaluated"
        );

        let result = if threshold.satisfied {
            GovernanceResult::allow(reason)
        } else {
            rejected(reason)
        };
        result
            .with_decision(decision_id.clone())
            .with_data("state", next)
            .with_data("quorum_proof", &quorum)
            .with_data("threshold_proof", &threshold)
    }

    /// Execute an approved decision: recompute proofs, anchor and validate
    /// an evidence package, apply constraint and capability diffs, then mark
    /// the decision `EXECUTED`. Any failure leaves it `APPROVED`.
    pub fn execute_decision(&mut self, decision_id: &DecisionId) -> GovernanceResult {
        self.expire_emergency_if_due();
        let now = self.clock.now();
        let Some(decision) = self.decisions.get(decision_id) else {
            return unknown_decision(decision_id);
        };
        if decision.state != DecisionState::Approved {
            return rejected(format!(
                "cannot execute decision {decision_id} in state {}; only APPROVED decisions execute",
                decision.state
            ))
            .with_decision(decision_id.clone());
        }
        if let Err(err) = self.emergency.check_irreversibility_ban(decision) {
            return rejected(err.to_string()).with_decision(decision_id.clone());
        }

        let quorum = self.evaluator.check_quorum(&decision.votes);
        let threshold = self.evaluator.check_threshold(
            &decision.votes,
            decision.decision_type,
            &self.registry.classes(),
        );
        let proposer_class = self
            .registry
            .get(&decision.proposer_id)
            .map(|p| p.class.clone());
        let decision = decision.clone();

        let anchor = self.record(
            AuditEntry::event(AuditEventType::EpAnchored)
                .data(json!({
                    "quorum_satisfied": quorum.satisfied,
                    "threshold_satisfied": threshold.satisfied,
                }))
                .decision(decision_id)
                .summary(format!("evidence anchor for {decision_id}")),
        );
        let package = EvidencePackage::assemble(
            &decision,
            proposer_class,
            quorum,
            threshold,
            anchor.entry_id,
            now,
        );

        if let Err(err) = package.validate(&decision) {
            let reason = format!("execution of {decision_id} aborted: {err}");
            self.record(
                AuditEntry::event(AuditEventType::ExecutionAborted)
                    .data(json!({ "ep_id": package.ep_id, "error": err.to_string() }))
                    .decision(decision_id)
                    .summary(reason.clone()),
            );
            return rejected(reason)
                .with_decision(decision_id.clone())
                .with_data("state", DecisionState::Approved);
        }

        self.apply_diffs(&decision);

        let ep_id = package.ep_id.clone();
        let content_hash = package.content_hash.clone();
        self.evidence.insert(decision_id.clone(), package);
        self.record(
            AuditEntry::event(AuditEventType::DecisionExecuted)
                .data(json!({ "ep_id": ep_id, "content_hash": content_hash }))
                .decision(decision_id)
                .summary(format!("decision {decision_id} executed")),
        );
        if let Some(stored) = self.decisions.get_mut(decision_id) {
            if let Err(err) = stored.transition(DecisionState::Executed, now) {
                return rejected(err.to_string());
            }
        }
        info!(decision_id = %decision_id, ep_id = %ep_id, "Decision executed");
        GovernanceResult::allow("decision executed")
            .with_decision(decision_id.clone())
            .with_data("state", DecisionState::Executed)
            .with_data("ep_id", &ep_id)
            .with_data("content_hash", &content_hash)
    }

    fn apply_diffs(&mut self, decision: &Decision) {
        if decision.cs_diff.is_none() && decision.cm_diff.is_none() {
            return;
        }
        if let Some(diff) = &decision.cs_diff {
            self.constraints.apply(diff);
        }
        if let Some(diff) = &decision.cm_diff {
            self.capabilities.apply(diff);
        }
        self.record(
            AuditEntry::event(AuditEventType::ConstraintsUpdated)
                .data(json!({ "cs_diff": decision.cs_diff, "cm_diff": decision.cm_diff }))
                .decision(&decision.id)
                .summary("constraint set and capability manifest updated"),
        );
    }

    // ---------------------------------------------------------------------
    // Objections & appeals
    // ---------------------------------------------------------------------

    pub fn file_objection(
        &mut self,
        decision_id: &DecisionId,
        filing: ObjectionFiling,
    ) -> GovernanceResult {
        let now = self.clock.now();
        let Some(filer) = self.registry.get(&filing.party_id).cloned() else {
            return rejected(format!("party {} is not registered", filing.party_id));
        };
        let Some(decision) = self.decisions.get_mut(decision_id) else {
            return unknown_decision(decision_id);
        };
        let objection = match self.disputes.file_objection(decision, &filer, filing, now) {
            Ok(objection) => objection,
            Err(err) => return rejected(err.to_string()).with_decision(decision_id.clone()),
        };

        self.record(
            AuditEntry::event(AuditEventType::ObjectionFiled)
                .data(json!({
                    "objection_id": objection.objection_id,
                    "basis": objection.basis,
                    "is_veto": objection.is_veto,
                    "veto_category": objection.veto_category,
                    "bond_amount": objection.bond_amount,
                }))
                .decision(decision_id)
                .actor(filer.id.as_str())
                .summary(format!("objection filed by {} on {decision_id}", filer.id)),
        );
        let reason = if objection.is_veto {
            "veto filed; decision held for external arbitration"
        } else {
            "objection filed; voting paused"
        };
        GovernanceResult::allow(reason)
            .with_decision(decision_id.clone())
            .with_data("objection_id", &objection.objection_id)
            .with_data("state", DecisionState::Objected)
    }

    /// Close every open objection and resume voting. Refused while a veto
    /// awaits arbitration.
    pub fn resolve_objection(&mut self, decision_id: &DecisionId) -> GovernanceResult {
        let now = self.clock.now();
        let Some(decision) = self.decisions.get_mut(decision_id) else {
            return unknown_decision(decision_id);
        };
        let closed = match self.disputes.resolve_objection(decision, now) {
            Ok(closed) => closed,
            Err(err) => return rejected(err.to_string()).with_decision(decision_id.clone()),
        };
        self.record(
            AuditEntry::event(AuditEventType::ObjectionResolved)
                .data(json!({ "closed": closed }))
                .decision(decision_id)
                .summary(format!("{closed} objection(s) resolved on {decision_id}")),
        );
        GovernanceResult::allow("objections resolved; voting resumed")
            .with_decision(decision_id.clone())
            .with_data("state", DecisionState::Voting)
            .with_data("closed", closed)
    }

    /// Record an external arbiter's ruling on a veto.
    pub fn record_arbitration(
        &mut self,
        decision_id: &DecisionId,
        objection_id: &ObjectionId,
        outcome: ArbitrationOutcome,
    ) -> GovernanceResult {
        let now = self.clock.now();
        let Some(decision) = self.decisions.get_mut(decision_id) else {
            return unknown_decision(decision_id);
        };
        let state = match self
            .disputes
            .record_arbitration(decision, objection_id, outcome, now)
        {
            Ok(state) => state,
            Err(err) => return rejected(err.to_string()).with_decision(decision_id.clone()),
        };
        self.record(
            AuditEntry::event(AuditEventType::VetoArbitrated)
                .data(json!({ "objection_id": objection_id, "outcome": outcome, "state": state }))
                .decision(decision_id)
                .summary(format!("veto {objection_id} arbitrated: {outcome:?}")),
        );
        GovernanceResult::allow(format!("arbitration recorded; decision is {state}"))
            .with_decision(decision_id.clone())
            .with_data("state", state)
    }

    pub fn file_appeal(&mut self, decision_id: &DecisionId, filing: AppealFiling) -> GovernanceResult {
        let now = self.clock.now();
        let Some(filer) = self.registry.get(&filing.party_id).cloned() else {
            return rejected(format!("party {} is not registered", filing.party_id));
        };
        let Some(decision) = self.decisions.get_mut(decision_id) else {
            return unknown_decision(decision_id);
        };
        let appeal = match self.disputes.file_appeal(decision, &filer, filing, now) {
            Ok(appeal) => appeal,
            Err(err) => return rejected(err.to_string()).with_decision(decision_id.clone()),
        };
        self.record(
            AuditEntry::event(AuditEventType::AppealFiled)
                .data(json!({
                    "appeal_id": appeal.appeal_id,
                    "grounds": appeal.grounds,
                    "bond_amount": appeal.bond_amount,
                }))
                .decision(decision_id)
                .actor(filer.id.as_str())
                .summary(format!("appeal filed by {} on {decision_id}", filer.id)),
        );
        GovernanceResult::allow("appeal filed")
            .with_decision(decision_id.clone())
            .with_data("appeal_id", &appeal.appeal_id)
            .with_data("state", DecisionState::Appealed)
    }

    // ---------------------------------------------------------------------
    // Emergency
    // ---------------------------------------------------------------------

    pub fn enter_emergency(
        &mut self,
        ballots: &[Ballot],
        decision_id: Option<DecisionId>,
        banned_invariants: Vec<String>,
    ) -> GovernanceResult {
        let now = self.clock.now();
        self.expire_emergency_if_due();
        if let Some(id) = &decision_id {
            if !self.decisions.contains_key(id) {
                return unknown_decision(id);
            }
        }
        let subject = format!("emergency:entry:{}", self.emergency.history().len());
        let votes = match self.sign_ballots(ballots, &subject) {
            Ok(votes) => votes,
            Err(reason) => return rejected(reason),
        };
        let state = match self.emergency.enter(&votes, decision_id, banned_invariants, now) {
            Ok(state) => state,
            Err(err) => return rejected(err.to_string()),
        };
        self.record_emergency(AuditEventType::EmergencyEntered, &state, "emergency entered");
        GovernanceResult::allow("emergency entered").with_data("emergency", &state)
    }

    /// Extend the live emergency. Each renewal needs a strictly higher
    /// approval ratio than the last.
    pub fn renew_emergency(&mut self, ballots: &[Ballot]) -> GovernanceResult {
        let now = self.clock.now();
        self.expire_emergency_if_due();
        let subject = format!(
            "emergency:renewal:{}",
            self.emergency.state().renewal_count + 1
        );
        let votes = match self.sign_ballots(ballots, &subject) {
            Ok(votes) => votes,
            Err(reason) => return rejected(reason),
        };
        let required = self.emergency.required_renewal_ratio();
        let state = match self.emergency.renew(&votes, now) {
            Ok(state) => state,
            Err(err) => return rejected(err.to_string()).with_data("required_ratio", required),
        };
        self.record_emergency(
            AuditEventType::EmergencyRenewed,
            &state,
            &format!("emergency renewed ({})", state.renewal_count),
        );
        GovernanceResult::allow(format!("emergency renewed ({})", state.renewal_count))
            .with_data("emergency", &state)
            .with_data("required_ratio", required)
    }

    pub fn exit_emergency(&mut self) -> GovernanceResult {
        self.expire_emergency_if_due();
        let previous = match self.emergency.exit() {
            Ok(previous) => previous,
            Err(err) => return rejected(err.to_string()),
        };
        self.record_emergency(AuditEventType::EmergencyExited, &previous, "emergency exited");
        GovernanceResult::allow("emergency exited").with_data("emergency", self.emergency.state())
    }

    fn expire_emergency_if_due(&mut self) {
        let now = self.clock.now();
        if let Some(expired) = self.emergency.check_auto_expiry(now) {
            self.record_emergency(AuditEventType::EmergencyExpired, &expired, "emergency expired");
        }
    }

    fn record_emergency(&mut self, event_type: AuditEventType, state: &EmergencyState, summary: &str) {
        let mut event = AuditEntry::event(event_type).data(state).summary(summary);
        if let Some(id) = &state.decision_id {
            event = event.decision(id);
        }
        self.record(event);
    }

    /// Turn ballots into signed votes. Every voter must be registered and
    /// vote once.
    fn sign_ballots(&self, ballots: &[Ballot], subject: &str) -> Result<Vec<VoteRecord>, String> {
        let now = self.clock.now();
        let mut votes: Vec<VoteRecord> = Vec::with_capacity(ballots.len());
        for ballot in ballots {
            let party = self
                .registry
                .get(&ballot.party_id)
                .ok_or_else(|| format!("party {} is not registered", ballot.party_id))?;
            if votes.iter().any(|v| v.party_id == ballot.party_id) {
                return Err(format!("party {} cast more than one ballot", ballot.party_id));
            }
            votes.push(VoteRecord {
                party_id: party.id.clone(),
                party_class: party.class.clone(),
                approve: ballot.approve,
                signature: self.signer.sign(&party.id, subject, ballot.approve),
                cast_at: now,
            });
        }
        Ok(votes)
    }

    // ---------------------------------------------------------------------
    // Enforcement
    // ---------------------------------------------------------------------

    /// Authorize an action against every enforcer, the forbidden-action
    /// patterns and, during an emergency, its banned invariants. Both
    /// outcomes are audited.
    pub fn check_action(&mut self, action: &str, context: Option<ActionContext>) -> GovernanceResult {
        self.expire_emergency_if_due();
        let context = context.unwrap_or_default();
        let mut verdict = self.gate.evaluate(action, &context, &self.constraints);
        if let Some(invariant) = self.emergency.banned_invariant_for(action) {
            verdict.deny(format!("emergency: banned invariant {invariant}"));
        }
        let reason = verdict.reason(action);
        let emergency_active = self.emergency.is_active();

        let event_type = if verdict.allowed {
            AuditEventType::ActionAllowed
        } else {
            AuditEventType::ActionDenied
        };
        let mut event = AuditEntry::event(event_type)
            .data(json!({
                "action": action,
                "denials": verdict.denials,
                "emergency_active": emergency_active,
            }))
            .summary(reason.clone());
        if let Some(actor) = &context.actor_id {
            event = event.actor(actor.clone());
        }
        self.record(event);

        let result = if verdict.allowed {
            debug!(action, actor = ?context.actor_id, "Action allowed");
            GovernanceResult::allow(reason)
        } else {
            rejected(reason)
        };
        result
            .with_data("denials", &verdict.denials)
            .with_data("emergency_active", emergency_active)
    }

    // ---------------------------------------------------------------------
    // Audit
    // ---------------------------------------------------------------------

    pub fn verify_audit_log(&self) -> GovernanceResult {
        let report: ChainVerification = self.audit.verify_chain();
        let result = if report.valid {
            GovernanceResult::allow(format!(
                "audit log intact: {} entries verified",
                report.verified_entries
            ))
        } else {
            GovernanceResult::deny(format!(
                "audit log integrity failure: {}",
                report.error_message.clone().unwrap_or_default()
            ))
        };
        result.with_data("verification", &report)
    }

    /// Verify every audit entry about a decision and, once executed, its
    /// evidence package hash and anchor.
    pub fn verify_decision_audit(&self, decision_id: &DecisionId) -> GovernanceResult {
        let entries = match self.audit.check_decision_entries(decision_id) {
            Ok(entries) => entries,
            Err(err) => {
                return GovernanceResult::deny(format!("audit trail for {decision_id} failed: {err}"))
                    .with_decision(decision_id.clone())
            }
        };
        if entries == 0 {
            return GovernanceResult::deny(format!("no audit entries for decision {decision_id}"))
                .with_decision(decision_id.clone());
        }
        if let Some(package) = self.evidence.get(decision_id) {
            if !package.verify_hash() {
                return GovernanceResult::deny(format!(
                    "evidence package for {decision_id} fails its content hash"
                ))
                .with_decision(decision_id.clone());
            }
            let anchored = package
                .audit_anchor_ref
                .as_ref()
                .is_some_and(|anchor| self.audit.verify_entry_inclusion(anchor));
            if !anchored {
                return GovernanceResult::deny(format!(
                    "evidence anchor for {decision_id} is not in the audit log"
                ))
                .with_decision(decision_id.clone());
            }
        }
        GovernanceResult::allow(format!("{entries} audit entries verified"))
            .with_decision(decision_id.clone())
            .with_data("entries", entries)
    }

    fn record(&mut self, event: AuditEvent) -> AuditEntry {
        self.audit.append(event.at(self.clock.now()))
    }

    // ---------------------------------------------------------------------
    // Read access
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn registry(&self) -> &PartyRegistry {
        &self.registry
    }

    pub fn get_decision(&self, decision_id: &DecisionId) -> Option<&Decision> {
        self.decisions.get(decision_id)
    }

    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.values()
    }

    pub fn evidence_package(&self, decision_id: &DecisionId) -> Option<&EvidencePackage> {
        self.evidence.get(decision_id)
    }

    pub fn emergency_state(&self) -> &EmergencyState {
        self.emergency.state()
    }

    pub fn emergency_history(&self) -> &[EmergencyState] {
        self.emergency.history()
    }

    pub fn constraint_set(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn capability_manifest(&self) -> &CapabilityManifest {
        &self.capabilities
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn enforcer_names(&self) -> Vec<String> {
        self.gate.enforcer_names()
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.clock.now(),
            config: self.config.clone(),
            parties: self.registry.clone(),
            decisions: self.decisions.values().cloned().collect(),
            evidence_packages: self.evidence.values().cloned().collect(),
            audit_log: self.audit.clone(),
            emergency: self.emergency.state().clone(),
            emergency_history: self.emergency.history().to_vec(),
            constraints: self.constraints.clone(),
            capabilities: self.capabilities.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        self.snapshot().to_json()
    }
}

fn rejected(reason: impl Into<String>) -> GovernanceResult {
    let reason = reason.into();
    warn!(reason = %reason, "Governance request rejected");
    GovernanceResult::deny(reason)
}

fn unknown_decision(decision_id: &DecisionId) -> GovernanceResult {
    rejected(format!("unknown decision {decision_id}"))
}

fn threshold_failure(proof: &ThresholdProof) -> String {
    let mut parts = Vec::new();
    if !proof.ratio_met() {
        parts.push(format!(
            "approval ratio {:.3} below required {:.3}",
            proof.approval_ratio, proof.threshold_required
        ));
    }
    let missing = proof.dissenting_classes();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
        parts.push(format!(
            "missing class-wise assent from: [{}]",
            names.join(", ")
        ));
    }
    parts.join("; ")
}

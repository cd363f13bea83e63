//! Evidence packages.
//!
//! An evidence package is assembled once, when an approved decision
//! executes. It freezes who took part, the proofs recomputed at execution
//! time, the approving signatures and the audit anchor. The content hash
//! covers all of it, so later tampering shows up in [`EvidencePackage::verify_hash`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use covenant_types::{
    CmDiff, CsDiff, Decision, DecisionId, DecisionState, DecisionType, EntryId, EpId, PartyClass,
    PartyId, QuorumProof, ThresholdProof,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("evidence package has no participants")]
    NoParticipants,

    #[error("evidence package has no signatures")]
    NoSignatures,

    #[error("signer {0} did not vote to approve")]
    SignerDidNotApprove(PartyId),

    #[error("signature for {0} does not match the recorded vote")]
    SignatureMismatch(PartyId),

    #[error("quorum not satisfied at execution")]
    QuorumNotSatisfied,

    #[error("threshold not satisfied at execution")]
    ThresholdNotSatisfied,

    #[error("evidence package has no audit anchor")]
    MissingAnchor,

    #[error("evidence package belongs to {found}, not {expected}")]
    WrongDecision { expected: DecisionId, found: DecisionId },

    #[error("evidence package content hash does not match its contents")]
    HashMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Proposer,
    Voter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub party_id: PartyId,
    /// Unknown when a proposer has since left the registry.
    pub party_class: Option<PartyClass>,
    pub role: ParticipantRole,
    /// The participant's vote, if any.
    pub approve: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpSignature {
    pub party_id: PartyId,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpTimestamps {
    pub proposed_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePackage {
    pub ep_id: EpId,
    pub decision_id: DecisionId,
    pub decision_type: DecisionType,
    pub participants: Vec<Participant>,
    pub quorum_proof: QuorumProof,
    pub threshold_proof: ThresholdProof,
    pub rationale: String,
    pub impact_statement: String,
    pub cs_diff: Option<CsDiff>,
    pub cm_diff: Option<CmDiff>,
    pub timestamps: EpTimestamps,
    pub signatures: Vec<EpSignature>,
    pub audit_anchor_ref: Option<EntryId>,
    /// BLAKE3 (hex) over every other field.
    pub content_hash: String,
}

/// Everything but the hash, in hashing order.
#[derive(Serialize)]
struct EpBody<'a> {
    ep_id: &'a EpId,
    decision_id: &'a DecisionId,
    decision_type: DecisionType,
    participants: &'a [Participant],
    quorum_proof: &'a QuorumProof,
    threshold_proof: &'a ThresholdProof,
    rationale: &'a str,
    impact_statement: &'a str,
    cs_diff: Option<&'a CsDiff>,
    cm_diff: Option<&'a CmDiff>,
    timestamps: &'a EpTimestamps,
    signatures: &'a [EpSignature],
    audit_anchor_ref: Option<&'a EntryId>,
}

impl EvidencePackage {
    /// Assemble a package for `decision` with proofs recomputed by the
    /// caller. `proposer_class` is the proposer's current class, if still
    /// registered.
    pub fn assemble(
        decision: &Decision,
        proposer_class: Option<PartyClass>,
        quorum_proof: QuorumProof,
        threshold_proof: ThresholdProof,
        audit_anchor_ref: EntryId,
        executed_at: DateTime<Utc>,
    ) -> Self {
        let mut participants = vec![Participant {
            party_id: decision.proposer_id.clone(),
            party_class: proposer_class,
            role: ParticipantRole::Proposer,
            approve: decision.vote_of(&decision.proposer_id).map(|v| v.approve),
        }];
        let mut voters: Vec<Participant> = decision
            .votes
            .iter()
            .filter(|v| v.party_id != decision.proposer_id)
            .map(|v| Participant {
                party_id: v.party_id.clone(),
                party_class: Some(v.party_class.clone()),
                role: ParticipantRole::Voter,
                approve: Some(v.approve),
            })
            .collect();
        voters.sort_by(|a, b| a.party_id.cmp(&b.party_id));
        participants.extend(voters);

        let mut signatures: Vec<EpSignature> = decision
            .approving_votes()
            .map(|v| EpSignature {
                party_id: v.party_id.clone(),
                signature: v.signature.clone(),
            })
            .collect();
        signatures.sort_by(|a, b| a.party_id.cmp(&b.party_id));

        let approved_at = decision
            .history
            .iter()
            .rev()
            .find(|t| t.to == DecisionState::Approved)
            .map(|t| t.at);

        let mut package = Self {
            ep_id: EpId::new(),
            decision_id: decision.id.clone(),
            decision_type: decision.decision_type,
            participants,
            quorum_proof,
            threshold_proof,
            rationale: decision.rationale.clone(),
            impact_statement: decision.impact_statement.clone(),
            cs_diff: decision.cs_diff.clone(),
            cm_diff: decision.cm_diff.clone(),
            timestamps: EpTimestamps {
                proposed_at: decision.created_at,
                approved_at,
                executed_at,
            },
            signatures,
            audit_anchor_ref: Some(audit_anchor_ref),
            content_hash: String::new(),
        };
        package.content_hash = package.compute_hash();
        package
    }

    fn compute_hash(&self) -> String {
        let body = EpBody {
            ep_id: &self.ep_id,
            decision_id: &self.decision_id,
            decision_type: self.decision_type,
            participants: &self.participants,
            quorum_proof: &self.quorum_proof,
            threshold_proof: &self.threshold_proof,
            rationale: &self.rationale,
            impact_statement: &self.impact_statement,
            cs_diff: self.cs_diff.as_ref(),
            cm_diff: self.cm_diff.as_ref(),
            timestamps: &self.timestamps,
            signatures: &self.signatures,
            audit_anchor_ref: self.audit_anchor_ref.as_ref(),
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// The stored content hash matches the package contents.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.content_hash
    }

    /// Check the package against the decision it claims to evidence.
    pub fn validate(&self, decision: &Decision) -> Result<(), EvidenceError> {
        if self.decision_id != decision.id {
            return Err(EvidenceError::WrongDecision {
                expected: decision.id.clone(),
                found: self.decision_id.clone(),
            });
        }
        if self.participants.is_empty() {
            return Err(EvidenceError::NoParticipants);
        }
        if self.signatures.is_empty() {
            return Err(EvidenceError::NoSignatures);
        }
        let votes: BTreeMap<&PartyId, (bool, &str)> = decision
            .votes
            .iter()
            .map(|v| (&v.party_id, (v.approve, v.signature.as_str())))
            .collect();
        for signature in &self.signatures {
            match votes.get(&signature.party_id) {
                Some((true, recorded)) if *recorded == signature.signature => {}
                Some((true, _)) => {
                    return Err(EvidenceError::SignatureMismatch(signature.party_id.clone()))
                }
                _ => return Err(EvidenceError::SignerDidNotApprove(signature.party_id.clone())),
            }
        }
        if !self.quorum_proof.satisfied {
            return Err(EvidenceError::QuorumNotSatisfied);
        }
        if !self.threshold_proof.satisfied {
            return Err(EvidenceError::ThresholdNotSatisfied);
        }
        if self.audit_anchor_ref.is_none() {
            return Err(EvidenceError::MissingAnchor);
        }
        if !self.verify_hash() {
            return Err(EvidenceError::HashMismatch);
        }
        Ok(())
    }

    pub fn signers(&self) -> impl Iterator<Item = &PartyId> {
        self.signatures.iter().map(|s| &s.party_id)
    }
}

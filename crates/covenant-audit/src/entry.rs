//! Audit entry types and chain hashing.

use chrono::{DateTime, SecondsFormat, Utc};
use covenant_types::{DecisionId, EntryId};
use serde::{Deserialize, Serialize};

/// Previous-hash value of the first entry in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audited event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Registry
    PartyRegistered,
    PartyRemoved,

    // Decision lifecycle
    DecisionProposed,
    D0Preauthorized,
    VoteCast,
    DecisionEvaluated,
    DecisionExpired,
    EpAnchored,
    DecisionExecuted,
    ExecutionAborted,

    // Disputes
    ObjectionFiled,
    ObjectionResolved,
    VetoArbitrated,
    AppealFiled,

    // Emergency
    EmergencyEntered,
    EmergencyRenewed,
    EmergencyExited,
    EmergencyExpired,

    // Enforcement
    ActionAllowed,
    ActionDenied,
    ConstraintsUpdated,

    Custom(String),
}

impl AuditEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PartyRegistered => "party_registered",
            Self::PartyRemoved => "party_removed",
            Self::DecisionProposed => "decision_proposed",
            Self::D0Preauthorized => "d0_preauthorized",
            Self::VoteCast => "vote_cast",
            Self::DecisionEvaluated => "decision_evaluated",
            Self::DecisionExpired => "decision_expired",
            Self::EpAnchored => "ep_anchored",
            Self::DecisionExecuted => "decision_executed",
            Self::ExecutionAborted => "execution_aborted",
            Self::ObjectionFiled => "objection_filed",
            Self::ObjectionResolved => "objection_resolved",
            Self::VetoArbitrated => "veto_arbitrated",
            Self::AppealFiled => "appeal_filed",
            Self::EmergencyEntered => "emergency_entered",
            Self::EmergencyRenewed => "emergency_renewed",
            Self::EmergencyExited => "emergency_exited",
            Self::EmergencyExpired => "emergency_expired",
            Self::ActionAllowed => "action_allowed",
            Self::ActionDenied => "action_denied",
            Self::ConstraintsUpdated => "constraints_updated",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hash-chained audit entry. Never mutated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: EntryId,
    pub event_type: AuditEventType,
    pub data: serde_json::Value,
    pub decision_id: Option<DecisionId>,
    pub actor_id: Option<String>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous entry, [`GENESIS_HASH`] for the first.
    pub prev_hash: String,
    /// BLAKE3 over `prev_hash` and the canonical entry body.
    pub hash: String,
}

impl AuditEntry {
    /// Builder for the next event to append.
    pub fn event(event_type: AuditEventType) -> AuditEvent {
        AuditEvent::new(event_type)
    }

    /// Recompute this entry's hash against a given previous hash.
    pub fn compute_hash(&self, prev_hash: &str) -> String {
        chain_hash(
            prev_hash,
            &self.entry_id,
            &self.event_type,
            &self.data,
            self.decision_id.as_ref(),
            self.actor_id.as_deref(),
            &self.summary,
            &self.timestamp,
        )
    }

    /// The stored hash matches the stored content and `prev_hash`.
    pub fn is_self_consistent(&self) -> bool {
        self.compute_hash(&self.prev_hash) == self.hash
    }
}

/// Canonical hash input. Field order is part of the chain format.
#[derive(Serialize)]
struct HashInput<'a> {
    prev_hash: &'a str,
    entry_id: &'a EntryId,
    event_type: &'a AuditEventType,
    data: &'a serde_json::Value,
    decision_id: Option<&'a DecisionId>,
    actor_id: Option<&'a str>,
    summary: &'a str,
    timestamp: String,
}

#[allow(clippy::too_many_arguments)]
fn chain_hash(
    prev_hash: &str,
    entry_id: &EntryId,
    event_type: &AuditEventType,
    data: &serde_json::Value,
    decision_id: Option<&DecisionId>,
    actor_id: Option<&str>,
    summary: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    let input = HashInput {
        prev_hash,
        entry_id,
        event_type,
        data,
        decision_id,
        actor_id,
        summary,
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
    };
    // serde_json maps are key-sorted, so `data` serializes deterministically.
    let bytes = serde_json::to_vec(&input).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

/// An event waiting to be appended (before hashing).
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub(crate) event_type: AuditEventType,
    pub(crate) data: serde_json::Value,
    pub(crate) decision_id: Option<DecisionId>,
    pub(crate) actor_id: Option<String>,
    pub(crate) summary: String,
    pub(crate) timestamp: Option<DateTime<Utc>>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            data: serde_json::Value::Null,
            decision_id: None,
            actor_id: None,
            summary: String::new(),
            timestamp: None,
        }
    }

    /// Set the event payload. Values that fail to serialize become `null`.
    pub fn data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
        self
    }

    pub fn decision(mut self, id: &DecisionId) -> Self {
        self.decision_id = Some(id.clone());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_id = Some(actor.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Timestamp the event. Defaults to `Utc::now()` at append time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Seal the event onto the chain after `prev_hash`.
    pub(crate) fn seal(self, prev_hash: String) -> AuditEntry {
        let entry_id = EntryId::new();
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let hash = chain_hash(
            &prev_hash,
            &entry_id,
            &self.event_type,
            &self.data,
            self.decision_id.as_ref(),
            self.actor_id.as_deref(),
            &self.summary,
            &timestamp,
        );
        AuditEntry {
            entry_id,
            event_type: self.event_type,
            data: self.data,
            decision_id: self.decision_id,
            actor_id: self.actor_id,
            summary: self.summary,
            timestamp,
            prev_hash,
            hash,
        }
    }
}

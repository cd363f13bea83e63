//! Serializable engine state.

use chrono::{DateTime, Utc};
use covenant_audit::AuditLog;
use covenant_types::{CapabilityManifest, ConstraintSet, Decision};
use serde::{Deserialize, Serialize};

use crate::config::GovernanceConfig;
use crate::emergency::EmergencyState;
use crate::error::EngineError;
use crate::evidence::EvidencePackage;
use crate::registry::PartyRegistry;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full engine state. Restoring one with
/// [`GovernanceEngine::from_snapshot`](crate::GovernanceEngine::from_snapshot)
/// reproduces the engine that produced it, minus pluggable collaborators
/// (clock, signer, bond policy, enforcers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub config: GovernanceConfig,
    pub parties: PartyRegistry,
    pub decisions: Vec<Decision>,
    pub evidence_packages: Vec<EvidencePackage>,
    pub audit_log: AuditLog,
    pub emergency: EmergencyState,
    pub emergency_history: Vec<EmergencyState>,
    pub constraints: ConstraintSet,
    pub capabilities: CapabilityManifest,
}

impl EngineSnapshot {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

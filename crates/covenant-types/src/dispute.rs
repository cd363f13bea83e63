//! Objections (including vetoes) and appeals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AppealId, DecisionId, ObjectionId, PartyId};

/// Categories a veto may be raised under. All vetoes go to external arbitration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoCategory {
    Safety,
    Rights,
    Constitutional,
    Custom(String),
}

/// Result of external arbitration on a veto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationOutcome {
    /// The veto stands; the decision is rejected.
    Sustained,
    /// The veto is overruled; normal resolution may continue.
    Dismissed,
}

/// An objection attached to a decision. Retained permanently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Objection {
    pub objection_id: ObjectionId,
    pub decision_id: DecisionId,
    pub party_id: PartyId,
    pub basis: String,
    pub detail: String,
    pub is_veto: bool,
    pub veto_category: Option<VetoCategory>,
    pub bond_amount: u64,
    pub filed_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arbitration: Option<ArbitrationOutcome>,
}

impl Objection {
    /// A veto flagged for arbitration that has not been ruled on yet.
    pub fn awaiting_arbitration(&self) -> bool {
        self.is_veto && self.arbitration.is_none() && self.resolved_at.is_none()
    }
}

/// An appeal against a decided outcome. Retained permanently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub appeal_id: AppealId,
    pub decision_id: DecisionId,
    pub party_id: PartyId,
    pub grounds: String,
    pub detail: String,
    pub bond_amount: u64,
    pub filed_at: DateTime<Utc>,
}

/// Caller-supplied objection details.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectionFiling {
    pub party_id: PartyId,
    pub basis: String,
    pub detail: String,
    pub is_veto: bool,
    pub veto_category: Option<VetoCategory>,
    /// Bond the filer puts up; must cover the policy amount.
    pub bond: u64,
}

impl ObjectionFiling {
    pub fn new(
        party_id: impl Into<PartyId>,
        basis: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            party_id: party_id.into(),
            basis: basis.into(),
            detail: detail.into(),
            is_veto: false,
            veto_category: None,
            bond: 0,
        }
    }

    pub fn veto(mut self, category: VetoCategory) -> Self {
        self.is_veto = true;
        self.veto_category = Some(category);
        self
    }

    pub fn bond(mut self, bond: u64) -> Self {
        self.bond = bond;
        self
    }
}

/// Caller-supplied appeal details.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppealFiling {
    pub party_id: PartyId,
    pub grounds: String,
    pub detail: String,
    pub bond: u64,
}

impl AppealFiling {
    pub fn new(
        party_id: impl Into<PartyId>,
        grounds: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            party_id: party_id.into(),
            grounds: grounds.into(),
            detail: detail.into(),
            bond: 0,
        }
    }

    pub fn bond(mut self, bond: u64) -> Self {
        self.bond = bond;
        self
    }
}

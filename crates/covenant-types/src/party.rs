//! Voting parties.

use serde::{Deserialize, Serialize};

use crate::ids::{PartyClass, PartyId};

/// A party eligible to propose, vote, object and appeal.
///
/// Every party belongs to exactly one class. Class membership drives quorum
/// counting and class-wise assent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub class: PartyClass,
    /// Trust score in `[0.0, 1.0]`.
    #[serde(default = "default_trust")]
    pub trust: f64,
    /// Stake held by the party, consulted by bond policies.
    #[serde(default)]
    pub stake: u64,
}

fn default_trust() -> f64 {
    1.0
}

impl Party {
    pub fn new(id: impl Into<PartyId>, class: impl Into<PartyClass>) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            trust: default_trust(),
            stake: 0,
        }
    }

    pub fn with_trust(mut self, trust: f64) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_stake(mut self, stake: u64) -> Self {
        self.stake = stake;
        self
    }

    /// Whether the trust score lies in `[0.0, 1.0]` (NaN is out of bounds).
    pub fn trust_in_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.trust)
    }
}

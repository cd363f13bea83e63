//! Quorum and threshold proofs. Derived values, recomputed from a vote set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PartyClass;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuorumProof {
    pub satisfied: bool,
    /// Distinct voters per class, regardless of vote direction.
    pub class_counts: BTreeMap<PartyClass, u32>,
    pub total_voters: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProof {
    pub satisfied: bool,
    pub approval_ratio: f64,
    pub threshold_required: f64,
    pub class_wise_assent: BTreeMap<PartyClass, bool>,
}

impl ThresholdProof {
    /// Classes whose assent is missing, in class order.
    pub fn dissenting_classes(&self) -> Vec<PartyClass> {
        self.class_wise_assent
            .iter()
            .filter(|(_, assented)| !**assented)
            .map(|(class, _)| class.clone())
            .collect()
    }

    pub fn ratio_met(&self) -> bool {
        self.approval_ratio >= self.threshold_required
    }
}

//! Registered parties.

use std::collections::{BTreeMap, BTreeSet};

use covenant_types::{Party, PartyClass, PartyId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("party {0} is already registered")]
    Duplicate(PartyId),

    #[error("party {0} is not registered")]
    NotFound(PartyId),

    #[error("invalid trust bounds for party {0}: trust must be within [0.0, 1.0]")]
    InvalidTrust(PartyId),
}

/// Party table keyed by id. Every party has exactly one class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyRegistry {
    parties: BTreeMap<PartyId, Party>,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, party: Party) -> Result<(), RegistryError> {
        if !party.trust_in_bounds() {
            return Err(RegistryError::InvalidTrust(party.id));
        }
        if self.parties.contains_key(&party.id) {
            return Err(RegistryError::Duplicate(party.id));
        }
        self.parties.insert(party.id.clone(), party);
        Ok(())
    }

    pub fn remove(&mut self, party_id: &PartyId) -> Result<Party, RegistryError> {
        self.parties
            .remove(party_id)
            .ok_or_else(|| RegistryError::NotFound(party_id.clone()))
    }

    pub fn get(&self, party_id: &PartyId) -> Option<&Party> {
        self.parties.get(party_id)
    }

    pub fn contains(&self, party_id: &PartyId) -> bool {
        self.parties.contains_key(party_id)
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    pub fn parties(&self) -> impl Iterator<Item = &Party> {
        self.parties.values()
    }

    /// Classes with at least one registered party.
    pub fn classes(&self) -> BTreeSet<PartyClass> {
        self.parties.values().map(|p| p.class.clone()).collect()
    }
}

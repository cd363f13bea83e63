//! The append-only audit log.

use covenant_types::{DecisionId, EntryId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::entry::{AuditEntry, AuditEvent, GENESIS_HASH};
use crate::error::AuditError;

/// Result of verifying the full chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Whether the chain is valid
    pub valid: bool,

    /// Total number of entries checked
    pub total_entries: usize,

    /// Number of entries verified before the first failure
    pub verified_entries: usize,

    /// Index of first invalid entry (if any)
    pub first_invalid_index: Option<usize>,

    /// Error message (if any)
    pub error_message: Option<String>,
}

/// Append-only, hash-chained event ledger.
///
/// There are no delete or modify operations. Each entry's hash covers the
/// previous entry's hash, so any historical mutation breaks verification
/// from that entry forward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted entries. Nothing is verified here; call
    /// [`AuditLog::verify_chain`] to check what was loaded.
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self { entries }
    }

    /// Append an event, linking it to the current head. Returns a copy of
    /// the sealed entry for use as an anchor reference.
    pub fn append(&mut self, event: AuditEvent) -> AuditEntry {
        let entry = event.seal(self.head_hash().to_string());
        debug!(
            entry_id = %entry.entry_id,
            event_type = %entry.event_type,
            index = self.entries.len(),
            "Audit entry appended"
        );
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the last entry, or the genesis hash for an empty log.
    pub fn head_hash(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    pub fn entry(&self, entry_id: &EntryId) -> Option<&AuditEntry> {
        self.entries.iter().find(|e| &e.entry_id == entry_id)
    }

    /// All entries about a decision, in append order.
    pub fn get_entries_by_decision(&self, decision_id: &DecisionId) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.decision_id.as_ref() == Some(decision_id))
            .cloned()
            .collect()
    }

    /// All entries recorded for an actor, in append order.
    pub fn get_entries_by_actor(&self, actor_id: &str) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.actor_id.as_deref() == Some(actor_id))
            .cloned()
            .collect()
    }

    /// Recompute the chain from genesis through `last` (inclusive).
    fn walk_to(&self, last: usize) -> Result<(), AuditError> {
        let mut expected_prev = GENESIS_HASH;
        for (index, entry) in self.entries.iter().enumerate().take(last + 1) {
            if entry.prev_hash != expected_prev {
                return Err(AuditError::BrokenLink {
                    entry_id: entry.entry_id.clone(),
                    index,
                });
            }
            if entry.compute_hash(expected_prev) != entry.hash {
                return Err(AuditError::HashMismatch {
                    entry_id: entry.entry_id.clone(),
                    index,
                });
            }
            expected_prev = entry.hash.as_str();
        }
        Ok(())
    }

    /// Verify every entry from genesis to head.
    pub fn verify_chain(&self) -> ChainVerification {
        let total_entries = self.entries.len();
        if total_entries == 0 {
            return ChainVerification {
                valid: true,
                total_entries,
                verified_entries: 0,
                first_invalid_index: None,
                error_message: None,
            };
        }

        match self.walk_to(total_entries - 1) {
            Ok(()) => ChainVerification {
                valid: true,
                total_entries,
                verified_entries: total_entries,
                first_invalid_index: None,
                error_message: None,
            },
            Err(err) => {
                let index = err.index();
                error!(error = %err, "Audit chain integrity breach");
                ChainVerification {
                    valid: false,
                    total_entries,
                    verified_entries: index.unwrap_or(0),
                    first_invalid_index: index,
                    error_message: Some(err.to_string()),
                }
            }
        }
    }

    pub fn verify_log_integrity(&self) -> bool {
        self.verify_chain().valid
    }

    /// Confirm an entry is unaltered and in place by recomputing the chain
    /// from genesis through it. Returns the entry's index.
    pub fn check_inclusion(&self, entry_id: &EntryId) -> Result<usize, AuditError> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.entry_id == entry_id)
            .ok_or_else(|| AuditError::EntryNotFound(entry_id.clone()))?;
        self.walk_to(index)?;
        Ok(index)
    }

    pub fn verify_entry_inclusion(&self, entry_id: &EntryId) -> bool {
        match self.check_inclusion(entry_id) {
            Ok(_) => true,
            Err(err) => {
                error!(entry_id = %entry_id, error = %err, "Audit entry failed inclusion check");
                false
            }
        }
    }

    /// Verify every entry about a decision. Returns how many entries the
    /// decision has.
    pub fn check_decision_entries(&self, decision_id: &DecisionId) -> Result<usize, AuditError> {
        let positions: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.decision_id.as_ref() == Some(decision_id))
            .map(|(i, _)| i)
            .collect();
        if let Some(&last) = positions.last() {
            self.walk_to(last)?;
        }
        Ok(positions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditEventType;

    fn log_with(n: usize, decision: &DecisionId) -> AuditLog {
        let mut log = AuditLog::new();
        for i in 0..n {
            let mut event = AuditEntry::event(AuditEventType::VoteCast)
                .data(serde_json::json!({ "seq": i }))
                .actor(format!("party-{i}"));
            if i % 2 == 0 {
                event = event.decision(decision);
            }
            log.append(event);
        }
        log
    }

    #[test]
    fn empty_log_is_valid() {
        let log = AuditLog::new();
        assert!(log.verify_log_integrity());
        assert_eq!(log.head_hash(), GENESIS_HASH);
    }

    #[test]
    fn append_links_entries() {
        let log = log_with(3, &DecisionId::new());
        let entries = log.entries();
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[2].prev_hash, entries[1].hash);
        assert_eq!(log.head_hash(), entries[2].hash);

        let report = log.verify_chain();
        assert!(report.valid);
        assert_eq!(report.verified_entries, 3);
    }

    #[test]
    fn tampering_breaks_integrity_from_that_entry_on() {
        let mut log = log_with(5, &DecisionId::new());
        log.entries[2].data = serde_json::json!({ "seq": 99 });

        let report = log.verify_chain();
        assert!(!report.valid);
        assert_eq!(report.first_invalid_index, Some(2));
        assert_eq!(report.verified_entries, 2);

        let ids: Vec<EntryId> = log.entries().iter().map(|e| e.entry_id.clone()).collect();
        assert!(log.verify_entry_inclusion(&ids[0]));
        assert!(log.verify_entry_inclusion(&ids[1]));
        for id in &ids[2..] {
            assert!(!log.verify_entry_inclusion(id));
        }
    }

    #[test]
    fn reordering_is_detected() {
        let mut log = log_with(4, &DecisionId::new());
        log.entries.swap(1, 2);
        assert!(!log.verify_log_integrity());
        assert!(matches!(
            log.check_inclusion(&log.entries()[1].entry_id.clone()),
            Err(AuditError::BrokenLink { index: 1, .. })
        ));
    }

    #[test]
    fn rehashed_forgery_still_breaks_the_next_link() {
        let mut log = log_with(3, &DecisionId::new());
        log.entries[0].summary = "forged".into();
        log.entries[0].hash = log.entries[0].compute_hash(GENESIS_HASH);
        assert!(log.verify_entry_inclusion(&log.entries()[0].entry_id.clone()));
        assert!(!log.verify_entry_inclusion(&log.entries()[1].entry_id.clone()));
    }

    #[test]
    fn unknown_entry_fails_inclusion() {
        let log = log_with(2, &DecisionId::new());
        assert!(!log.verify_entry_inclusion(&EntryId::new()));
    }

    #[test]
    fn filters_by_decision_and_actor() {
        let decision = DecisionId::new();
        let log = log_with(5, &decision);
        assert_eq!(log.get_entries_by_decision(&decision).len(), 3);
        assert_eq!(log.get_entries_by_actor("party-1").len(), 1);
        assert_eq!(log.check_decision_entries(&decision), Ok(3));
        assert_eq!(log.check_decision_entries(&DecisionId::new()), Ok(0));
    }

    #[test]
    fn serde_roundtrip_preserves_chain() {
        let log = log_with(4, &DecisionId::new());
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.starts_with('['));
        let restored: AuditLog = serde_json::from_str(&json).unwrap();
        assert!(restored.verify_log_integrity());
        assert_eq!(restored.len(), 4);
    }
}

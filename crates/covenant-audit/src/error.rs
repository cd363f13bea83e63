use covenant_types::EntryId;
use thiserror::Error;

/// Integrity findings from the audit log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("audit entry {entry_id} at index {index} has an invalid hash")]
    HashMismatch { entry_id: EntryId, index: usize },

    #[error("audit entry {entry_id} at index {index} does not link to its predecessor")]
    BrokenLink { entry_id: EntryId, index: usize },
}

impl AuditError {
    /// Index of the offending entry, when known.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::EntryNotFound(_) => None,
            Self::HashMismatch { index, .. } | Self::BrokenLink { index, .. } => Some(*index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = AuditError::HashMismatch {
            entry_id: EntryId::new(),
            index: 3,
        };
        assert!(e.to_string().contains("index 3"));
        assert_eq!(e.index(), Some(3));
        assert_eq!(AuditError::EntryNotFound(EntryId::new()).index(), None);
    }
}

//! # covenant-audit
//!
//! Append-only, tamper-evident audit trail for the Covenant governance engine.
//!
//! Every entry carries `hash = BLAKE3(canonical(prev_hash, entry))`, forming a
//! chain rooted at [`GENESIS_HASH`]. Mutating, dropping or reordering any
//! historical entry is detected by [`AuditLog::verify_chain`] and by
//! [`AuditLog::verify_entry_inclusion`] for that entry and every later one.
//!
//! Verification failures are reported, never fatal: the log keeps accepting
//! appends and callers decide how to react.

pub mod entry;
pub mod error;
pub mod log;

pub use entry::{AuditEntry, AuditEvent, AuditEventType, GENESIS_HASH};
pub use error::AuditError;
pub use log::{AuditLog, ChainVerification};

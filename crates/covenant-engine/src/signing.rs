//! Vote signature attachment.
//!
//! Signatures are opaque strings bound to the vote they accompany. Key
//! management belongs to the host; plug a real signer in through
//! [`VoteSigner`].

use std::fmt;

use covenant_types::PartyId;

/// Produces the signature stored on a [`VoteRecord`](covenant_types::VoteRecord).
pub trait VoteSigner: Send + Sync + fmt::Debug {
    /// Sign `party_id`'s `approve` ballot on `subject` (a decision id or an
    /// emergency ballot round).
    fn sign(&self, party_id: &PartyId, subject: &str, approve: bool) -> String;
}

/// Keyless signer: a domain-separated BLAKE3 digest of the ballot.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSigner;

const VOTE_DOMAIN: &[u8] = b"covenant.vote.v1";

impl VoteSigner for DigestSigner {
    fn sign(&self, party_id: &PartyId, subject: &str, approve: bool) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(VOTE_DOMAIN);
        for part in [subject.as_bytes(), party_id.as_str().as_bytes()] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        hasher.update(&[u8::from(approve)]);
        hasher.finalize().to_hex().to_string()
    }
}

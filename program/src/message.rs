//! Canonical message encodings.
//!
//! These exact byte strings are what guardians sign and what the validator
//! recomputes; both sides must produce them identically, so any change here
//! breaks every previously issued assertion.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::state::{PublicKey, LAMPORTS_PER_SOL};

/// The only action tag the program currently executes.
pub const ACTION_TRANSFER: &str = "transfer";

/// Short hex fingerprint of a public key: the first 6 bytes of its SHA-256.
pub fn pubkey_fingerprint(public_key: &PublicKey) -> String {
    let digest = Sha256::digest(public_key.0);
    hex::encode(&digest[..6])
}

/// Canonical message for a direct transfer execution.
///
/// The amount is rendered in whole native tokens, not lamports.
pub fn transfer_message(
    amount: u64,
    destination: &Address,
    nonce: u64,
    timestamp: i64,
    public_key: &PublicKey,
) -> String {
    format!(
        "transfer:{}_SOL_to_{},nonce:{},timestamp:{},pubkey:{}",
        amount as f64 / LAMPORTS_PER_SOL as f64,
        destination,
        nonce,
        timestamp,
        pubkey_fingerprint(public_key)
    )
}

/// Canonical challenge for approving a proposal.
pub fn approve_message(proposal_id: u64, timestamp: i64) -> String {
    format!("approve:proposal_{proposal_id},timestamp:{timestamp}")
}

/// Canonical challenge for rejecting a proposal.
pub fn reject_message(proposal_id: u64, timestamp: i64) -> String {
    format!("reject:proposal_{proposal_id},timestamp:{timestamp}")
}

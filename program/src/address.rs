//! Deterministic account addresses.
//!
//! Every account the program owns lives at an address derived from a fixed
//! seed tag plus scoping values, never at an arbitrarily assigned key. The
//! derivation hashes the seeds together with a disambiguation byte (the
//! "bump") and rejects candidates that decompress as ed25519 curve points,
//! so derived addresses can never collide with a signing keypair.

use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CustodyError, Result};

/// Seed tag for wallet accounts.
pub const WALLET_SEED: &[u8] = b"multisig";
/// Seed tag for guardian accounts.
pub const GUARDIAN_SEED: &[u8] = b"guardian";
/// Seed tag for proposal accounts.
pub const PROPOSAL_SEED: &[u8] = b"proposal";
/// Seed tag for proposal-signature accounts.
pub const SIGNATURE_SEED: &[u8] = b"signature";

/// Domain separator appended to every derivation preimage.
const DERIVE_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Width of the processed credential seed: what remains of the derivation
/// preimage after the wallet seed tag.
const CREDENTIAL_SEED_LEN: usize = 24;

/// A 32-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Parse an address from its lowercase hex display form.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| CustodyError::AccountNotFound)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CustodyError::AccountNotFound)?;
        Ok(Address(arr))
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &hex::encode(self.0)[..8])
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(|_| D::Error::custom("invalid address"))
    }
}

/// Derive the account address for `seeds` under `program_id`.
///
/// Searches the bump byte from 255 downward and returns the first candidate
/// that is not a valid ed25519 curve point, together with the bump that
/// produced it. Callers must never retry a failed derivation with mutated
/// business data; the bump is the only disambiguation input.
///
/// # Errors
/// [`CustodyError::NoViableAddress`] when all 256 bump values yield curve
/// points.
pub fn derive_address(program_id: &Address, seeds: &[&[u8]]) -> Result<(Address, u8)> {
    for bump in (0..=255u8).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.0);
        hasher.update(DERIVE_MARKER);
        let candidate: [u8; 32] = hasher.finalize().into();

        if !is_on_curve(&candidate) {
            return Ok((Address(candidate), bump));
        }
    }
    Err(CustodyError::NoViableAddress)
}

/// Whether the bytes decompress as an ed25519 curve point.
fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

/// Reduce a credential id to the fixed-width wallet-scoping seed.
///
/// Ids short enough are copied and zero-padded; longer ids are XOR-folded
/// into the fixed width so equal ids always produce equal seeds.
pub fn credential_seed(credential_id: &[u8]) -> [u8; CREDENTIAL_SEED_LEN] {
    let mut seed = [0u8; CREDENTIAL_SEED_LEN];
    if credential_id.len() <= CREDENTIAL_SEED_LEN {
        seed[..credential_id.len()].copy_from_slice(credential_id);
    } else {
        for (i, byte) in credential_id.iter().enumerate() {
            seed[i % CREDENTIAL_SEED_LEN] ^= *byte;
        }
    }
    seed
}

/// Address of the wallet account scoped by `credential_id`.
pub fn wallet_address(program_id: &Address, credential_id: &[u8]) -> Result<(Address, u8)> {
    derive_address(program_id, &[WALLET_SEED, &credential_seed(credential_id)])
}

/// Address of guardian `guardian_id` under `wallet`.
pub fn guardian_address(
    program_id: &Address,
    wallet: &Address,
    guardian_id: u64,
) -> Result<(Address, u8)> {
    derive_address(
        program_id,
        &[GUARDIAN_SEED, wallet.as_bytes(), &guardian_id.to_le_bytes()],
    )
}

/// Address of proposal `proposal_id` under `wallet`.
pub fn proposal_address(
    program_id: &Address,
    wallet: &Address,
    proposal_id: u64,
) -> Result<(Address, u8)> {
    derive_address(
        program_id,
        &[PROPOSAL_SEED, wallet.as_bytes(), &proposal_id.to_le_bytes()],
    )
}

/// Address of the signature record binding (`proposal`, `guardian_id`).
///
/// Deriving from the pair is what makes a second signature from the same
/// guardian a detectable duplicate: the create at this address fails.
pub fn signature_address(
    program_id: &Address,
    proposal: &Address,
    guardian_id: u64,
) -> Result<(Address, u8)> {
    derive_address(
        program_id,
        &[
            SIGNATURE_SEED,
            proposal.as_bytes(),
            &guardian_id.to_le_bytes(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROGRAM_ID;

    #[test]
    fn test_derivation_is_deterministic() {
        let wallet = Address([7u8; 32]);
        let (a1, b1) = guardian_address(&PROGRAM_ID, &wallet, 1).unwrap();
        let (a2, b2) = guardian_address(&PROGRAM_ID, &wallet, 1).unwrap();
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_distinct_ids_derive_distinct_addresses() {
        let wallet = Address([7u8; 32]);
        let (a1, _) = guardian_address(&PROGRAM_ID, &wallet, 1).unwrap();
        let (a2, _) = guardian_address(&PROGRAM_ID, &wallet, 2).unwrap();
        assert_ne!(a1, a2);
    }

    #[test]
    fn test_seed_tags_scope_addresses() {
        let wallet = Address([7u8; 32]);
        let (g, _) = guardian_address(&PROGRAM_ID, &wallet, 1).unwrap();
        let (p, _) = proposal_address(&PROGRAM_ID, &wallet, 1).unwrap();
        assert_ne!(g, p);
    }

    #[test]
    fn test_numeric_ids_use_little_endian_encoding() {
        let wallet = Address([7u8; 32]);
        let (expected, _) = derive_address(
            &PROGRAM_ID,
            &[
                PROPOSAL_SEED,
                wallet.as_bytes(),
                &[0x01, 0x02, 0, 0, 0, 0, 0, 0],
            ],
        )
        .unwrap();
        let (derived, _) = proposal_address(&PROGRAM_ID, &wallet, 0x0201).unwrap();
        assert_eq!(derived, expected);
    }

    #[test]
    fn test_credential_seed_pads_short_ids() {
        let seed = credential_seed(b"abc");
        assert_eq!(&seed[..3], b"abc");
        assert!(seed[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_credential_seed_folds_long_ids() {
        let long = [0xAAu8; 48];
        let seed = credential_seed(&long);
        // Every lane sees the byte twice, so the fold cancels out.
        assert_eq!(seed, [0u8; 24]);

        let long2: Vec<u8> = (0u8..48).collect();
        let seed2 = credential_seed(&long2);
        assert_eq!(seed2[0], 0 ^ 24);
    }

    #[test]
    fn test_address_hex_round_trip() {
        let addr = Address([0x5a; 32]);
        let parsed = Address::from_hex(&addr.to_string()).unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn test_address_from_bad_hex_fails() {
        assert!(Address::from_hex("zz").is_err());
        assert!(Address::from_hex("ab").is_err()); // too short
    }
}

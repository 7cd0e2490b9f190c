//! Transactions and instructions.
//!
//! A transaction is an ordered instruction list executed atomically. The
//! expensive public-key cryptography is externalized to a native
//! verification entry that the runtime executes directly; custody
//! instructions then only have to check, via introspection over the same
//! list, that a verification entry *preceding* them carries the expected
//! public key and the expected canonical message. The ordering requirement
//! is load-bearing: a verification entry placed after the custody
//! instruction proves nothing at the time the custody logic runs.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::address::Address;
use crate::error::{CustodyError, Result};
use crate::state::{ActionParams, PublicKey};

/// A raw 64-byte ECDSA signature (r then s).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; 64]);

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}..)", &hex::encode(self.0)[..8])
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("signature must be 64 bytes"))?;
        Ok(SignatureBytes(arr))
    }
}

/// Arguments to the native secp256r1 verification entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secp256r1VerifyArgs {
    /// Compressed public key the signature must verify under
    pub public_key: PublicKey,
    /// Message the signature covers
    #[serde(with = "serde_hex_bytes")]
    pub message: Vec<u8>,
    /// Raw 64-byte signature
    pub signature: SignatureBytes,
}

/// One entry in a transaction's instruction list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// Native signature verification, executed by the runtime itself.
    /// Failure aborts the whole transaction.
    Secp256r1Verify(Secp256r1VerifyArgs),
    /// A custody program instruction.
    Custody(CustodyInstruction),
}

/// The custody program's instruction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CustodyInstruction {
    /// Create the wallet account scoped by `credential_id`.
    InitializeWallet {
        /// Distinct approvals required to execute a proposal
        threshold: u8,
        /// Credential id the wallet address is scoped by
        #[serde(with = "serde_hex_bytes")]
        credential_id: Vec<u8>,
    },
    /// Register a guardian. The first guardian of a fresh wallet needs no
    /// authorizer and must be an owner; afterwards an active owner guardian
    /// must authorize.
    AddGuardian {
        /// Target wallet
        wallet: Address,
        /// Display name
        name: String,
        /// Intermediate recovery hash; the program stores its SHA-256
        recovery_hash_intermediate: [u8; 32],
        /// Whether the new guardian administers the guardian set
        is_owner: bool,
        /// Assertion key; mandatory for owners
        public_key: Option<PublicKey>,
        /// Authorizing owner guardian, absent only at bootstrap
        acting_owner_id: Option<u64>,
    },
    /// Remove a guardian account.
    RemoveGuardian {
        /// Target wallet
        wallet: Address,
        /// Guardian to remove
        guardian_id: u64,
        /// Authorizing owner guardian
        acting_owner_id: u64,
    },
    /// Toggle a guardian's active flag.
    UpdateGuardianStatus {
        /// Target wallet
        wallet: Address,
        /// Guardian to update
        guardian_id: u64,
        /// New active flag
        is_active: bool,
        /// Authorizing owner guardian
        acting_owner_id: u64,
    },
    /// Rotate ownership to a replacement guardian after device loss.
    RecoverAccess {
        /// Target wallet
        wallet: Address,
        /// Owner guardian being recovered away from
        old_guardian_id: u64,
        /// Guardian being promoted
        new_guardian_id: u64,
        /// Intermediate recovery hash presented by the user
        recovery_hash_intermediate: [u8; 32],
        /// Assertion key registered for the promoted guardian
        new_public_key: PublicKey,
    },
    /// Single-signer authenticated direct execution.
    VerifyAndExecute {
        /// Target wallet
        wallet: Address,
        /// Acting owner guardian
        guardian_id: u64,
        /// Action tag
        action: String,
        /// Action parameters
        params: ActionParams,
        /// Must equal the wallet's expected nonce exactly
        nonce: u64,
        /// Client-side signing timestamp
        timestamp: i64,
    },
    /// Open a proposal for quorum approval.
    CreateProposal {
        /// Target wallet
        wallet: Address,
        /// Proposal id; creating an existing id fails
        proposal_id: u64,
        /// Proposing guardian
        proposer_guardian_id: u64,
        /// Free-text description
        description: String,
        /// Action tag
        action: String,
        /// Action parameters
        params: ActionParams,
    },
    /// Record one guardian's approval.
    ApproveProposal {
        /// Target wallet
        wallet: Address,
        /// Proposal being approved
        proposal_id: u64,
        /// Approving guardian
        guardian_id: u64,
        /// Client-side signing timestamp
        timestamp: i64,
    },
    /// Veto a proposal.
    RejectProposal {
        /// Target wallet
        wallet: Address,
        /// Proposal being rejected
        proposal_id: u64,
        /// Rejecting guardian
        guardian_id: u64,
        /// Client-side signing timestamp
        timestamp: i64,
    },
    /// Execute a proposal that has collected its required approvals.
    ExecuteProposal {
        /// Target wallet
        wallet: Address,
        /// Proposal to execute
        proposal_id: u64,
    },
}

/// A transaction: an ordered instruction list plus the fee payer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account paying for and signing the submission
    pub payer: Address,
    /// Instructions, executed in order
    pub instructions: Vec<Instruction>,
}

/// View of the enclosing transaction handed to custody handlers for
/// introspection.
pub struct InstructionContext<'a> {
    instructions: &'a [Instruction],
    index: usize,
}

impl<'a> InstructionContext<'a> {
    /// Context for the instruction at `index` within `instructions`.
    pub fn new(instructions: &'a [Instruction], index: usize) -> Self {
        Self {
            instructions,
            index,
        }
    }

    /// Require a native verification entry preceding the current
    /// instruction whose embedded public key and message match exactly.
    ///
    /// # Errors
    /// - [`CustodyError::VerificationMissing`] when no verification entry
    ///   precedes the current instruction;
    /// - [`CustodyError::PublicKeyMismatch`] when entries exist but none
    ///   carries `public_key`;
    /// - [`CustodyError::MessageMismatch`] when the key matches but the
    ///   message differs from `expected_message`.
    pub fn expect_verification(
        &self,
        public_key: &PublicKey,
        expected_message: &[u8],
    ) -> Result<()> {
        let mut saw_entry = false;
        let mut saw_key = false;

        for instruction in &self.instructions[..self.index] {
            if let Instruction::Secp256r1Verify(args) = instruction {
                saw_entry = true;
                if args.public_key == *public_key {
                    saw_key = true;
                    if args.message == expected_message {
                        return Ok(());
                    }
                }
            }
        }

        if saw_key {
            Err(CustodyError::MessageMismatch)
        } else if saw_entry {
            Err(CustodyError::PublicKeyMismatch)
        } else {
            Err(CustodyError::VerificationMissing)
        }
    }
}

/// Hex-string serde for opaque byte fields.
mod serde_hex_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_entry(key_byte: u8, message: &[u8]) -> Instruction {
        Instruction::Secp256r1Verify(Secp256r1VerifyArgs {
            public_key: PublicKey([key_byte; 33]),
            message: message.to_vec(),
            signature: SignatureBytes([0; 64]),
        })
    }

    fn custody_entry() -> Instruction {
        Instruction::Custody(CustodyInstruction::ExecuteProposal {
            wallet: Address([1; 32]),
            proposal_id: 1,
        })
    }

    #[test]
    fn test_expect_verification_matches_preceding_entry() {
        let instructions = vec![verify_entry(2, b"msg"), custody_entry()];
        let ctx = InstructionContext::new(&instructions, 1);
        assert!(ctx
            .expect_verification(&PublicKey([2; 33]), b"msg")
            .is_ok());
    }

    #[test]
    fn test_expect_verification_ignores_following_entries() {
        // Verification placed after the custody instruction must not count.
        let instructions = vec![custody_entry(), verify_entry(2, b"msg")];
        let ctx = InstructionContext::new(&instructions, 0);
        assert_eq!(
            ctx.expect_verification(&PublicKey([2; 33]), b"msg"),
            Err(CustodyError::VerificationMissing)
        );
    }

    #[test]
    fn test_expect_verification_key_mismatch() {
        let instructions = vec![verify_entry(9, b"msg"), custody_entry()];
        let ctx = InstructionContext::new(&instructions, 1);
        assert_eq!(
            ctx.expect_verification(&PublicKey([2; 33]), b"msg"),
            Err(CustodyError::PublicKeyMismatch)
        );
    }

    #[test]
    fn test_expect_verification_message_mismatch() {
        let instructions = vec![verify_entry(2, b"other"), custody_entry()];
        let ctx = InstructionContext::new(&instructions, 1);
        assert_eq!(
            ctx.expect_verification(&PublicKey([2; 33]), b"msg"),
            Err(CustodyError::MessageMismatch)
        );
    }

    #[test]
    fn test_transaction_serde_round_trip() {
        let tx = Transaction {
            payer: Address([5; 32]),
            instructions: vec![verify_entry(2, b"msg"), custody_entry()],
        };
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
    }
}

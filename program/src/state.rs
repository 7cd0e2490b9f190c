//! Account state for the custody program.
//!
//! Four account kinds live under the program: the wallet itself, its
//! guardians, transfer proposals, and per-(proposal, guardian) signature
//! records. All are keyed by derived addresses (see [`crate::address`]).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::address::Address;

/// Maximum guardians per wallet.
pub const MAX_GUARDIANS: u8 = 8;
/// Maximum guardian display-name length in bytes.
pub const MAX_NAME_LEN: usize = 32;
/// Maximum proposal description length in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 100;
/// Maximum credential id length in bytes.
pub const MAX_CREDENTIAL_LEN: usize = 64;

/// How far ahead of ledger time a request timestamp may sit.
pub const TIMESTAMP_FUTURE_TOLERANCE_SECS: i64 = 60;
/// How far behind ledger time a request timestamp may sit.
pub const TIMESTAMP_MAX_AGE_SECS: i64 = 300;
/// Pending proposals older than this expire lazily.
pub const PROPOSAL_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// Lamports per whole native token.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// A compressed secp256r1 (P-256) public key in SEC1 form.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 33]);

impl PublicKey {
    /// Parse a key from its lowercase hex form.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 33] = bytes.try_into().ok()?;
        Some(PublicKey(arr))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &hex::encode(self.0)[..8])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).ok_or_else(|| D::Error::custom("invalid public key"))
    }
}

/// The wallet account, one per custody domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Address that created the wallet
    pub owner: Address,
    /// Distinct guardian approvals required to execute a proposal
    pub threshold: u8,
    /// Number of registered guardians
    pub guardian_count: u8,
    /// Credential id the wallet address is scoped by
    pub credential_id: Vec<u8>,
    /// Monotonic counter incremented on each recovery event
    pub recovery_nonce: u64,
    /// Count of executed direct transactions; a request must carry exactly
    /// this value plus one
    pub transaction_nonce: u64,
    /// Timestamp of the last executed transaction
    pub last_transaction_timestamp: i64,
    /// Derivation bump for the wallet address
    pub bump: u8,
}

impl Wallet {
    /// The only nonce the next direct-execution request will be accepted
    /// with.
    pub fn expected_nonce(&self) -> u64 {
        self.transaction_nonce + 1
    }
}

/// A guardian account, scoped to one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    /// Owning wallet address
    pub wallet: Address,
    /// Guardian id, unique within the wallet
    pub guardian_id: u64,
    /// Display name, bounded by [`MAX_NAME_LEN`]
    pub name: String,
    /// Inactive guardians cannot sign or approve
    pub is_active: bool,
    /// SHA-256 of the intermediate recovery hash; never the secret itself
    pub recovery_hash: [u8; 32],
    /// Owner guardians administer the guardian set
    pub is_owner: bool,
    /// Registered assertion key; absent for quorum-only guardians
    pub public_key: Option<PublicKey>,
    /// Derivation bump for the guardian address
    pub bump: u8,
}

/// Proposal lifecycle states. Transitions are one-directional: `Pending`
/// is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Accepting approvals
    Pending,
    /// Executed successfully
    Executed,
    /// Vetoed by a guardian
    Rejected,
    /// Exceeded its lifetime before execution
    Expired,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "pending"),
            ProposalStatus::Executed => write!(f, "executed"),
            ProposalStatus::Rejected => write!(f, "rejected"),
            ProposalStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Parameters of a proposed action; each field is independently optional
/// and validated by the action that consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Transfer amount in lamports
    pub amount: Option<u64>,
    /// Transfer destination
    pub destination: Option<Address>,
    /// Token mint for non-native transfers
    pub token_mint: Option<Address>,
}

/// A transfer proposal awaiting quorum approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Owning wallet address
    pub wallet: Address,
    /// Proposal id, unique within the wallet
    pub proposal_id: u64,
    /// Address that submitted the create request
    pub proposer: Address,
    /// Free-text description, bounded by [`MAX_DESCRIPTION_LEN`]
    pub description: String,
    /// Action tag, e.g. `transfer`
    pub action: String,
    /// Action parameters
    pub params: ActionParams,
    /// Current lifecycle state
    pub status: ProposalStatus,
    /// Creation timestamp
    pub created_at: i64,
    /// Execution timestamp, set only on success
    pub executed_at: Option<i64>,
    /// Distinct guardian approvals collected so far
    pub signatures_count: u8,
    /// Wallet threshold snapshot taken at creation; later threshold
    /// changes do not affect this proposal
    pub required_signatures: u8,
    /// Derivation bump for the proposal address
    pub bump: u8,
}

impl Proposal {
    /// Whether a pending proposal has outlived [`PROPOSAL_LIFETIME_SECS`]
    /// at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.status == ProposalStatus::Pending
            && now.saturating_sub(self.created_at) > PROPOSAL_LIFETIME_SECS
    }
}

/// Proof that a guardian approved a proposal. Its address is derived from
/// the (proposal, guardian) pair, so creating it twice fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSignature {
    /// The approved proposal's address
    pub proposal: Address,
    /// The approving guardian's id
    pub guardian_id: u64,
    /// When the approval landed
    pub signature_time: i64,
    /// Derivation bump for the signature address
    pub bump: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_nonce_is_stored_plus_one() {
        let wallet = Wallet {
            owner: Address([1; 32]),
            threshold: 2,
            guardian_count: 3,
            credential_id: b"cred".to_vec(),
            recovery_nonce: 0,
            transaction_nonce: 7,
            last_transaction_timestamp: 0,
            bump: 255,
        };
        assert_eq!(wallet.expected_nonce(), 8);
    }

    #[test]
    fn test_proposal_expiry_window() {
        let mut proposal = Proposal {
            wallet: Address([1; 32]),
            proposal_id: 1,
            proposer: Address([2; 32]),
            description: "d".to_string(),
            action: "transfer".to_string(),
            params: ActionParams::default(),
            status: ProposalStatus::Pending,
            created_at: 1_000,
            executed_at: None,
            signatures_count: 0,
            required_signatures: 2,
            bump: 255,
        };
        assert!(!proposal.is_expired_at(1_000 + PROPOSAL_LIFETIME_SECS));
        assert!(proposal.is_expired_at(1_001 + PROPOSAL_LIFETIME_SECS));

        // Terminal states never report expired.
        proposal.status = ProposalStatus::Executed;
        assert!(!proposal.is_expired_at(1_001 + PROPOSAL_LIFETIME_SECS));
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&ProposalStatus::Executed).unwrap();
        assert_eq!(json, "\"executed\"");
    }

    #[test]
    fn test_public_key_hex_round_trip() {
        let pk = PublicKey([0x02; 33]);
        let parsed = PublicKey::from_hex(&pk.to_string()).unwrap();
        assert_eq!(pk, parsed);
        assert!(PublicKey::from_hex("02ab").is_none());
    }
}

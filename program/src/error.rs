//! Error types for the custody program.
//!
//! Every invariant the program enforces maps to its own variant so callers
//! (and the integration client) can react to the specific failure rather
//! than a generic code.

use thiserror::Error;

/// Broad failure classes, used by callers to pick a recovery strategy.
///
/// Validation failures are permanent for the given input. Authentication
/// failures need a fresh user interaction. Replay failures need a fresh
/// nonce/timestamp and a new assertion. State conflicts are permanent for
/// the current ledger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or out-of-bounds input
    Validation,
    /// Signature, key or message did not check out
    Authentication,
    /// Nonce or timestamp outside the accepted window
    Replay,
    /// The requested transition conflicts with current state
    StateConflict,
}

/// Errors raised by the custody program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// Threshold is zero or cannot be satisfied by the guardian set
    #[error("invalid approval threshold")]
    InvalidThreshold,

    /// Guardian name exceeds the stored bound
    #[error("guardian name exceeds {0} bytes")]
    NameTooLong(usize),

    /// Proposal description exceeds the stored bound
    #[error("proposal description exceeds {0} bytes")]
    DescriptionTooLong(usize),

    /// Credential id is empty or exceeds the stored bound
    #[error("credential id must be between 1 and {0} bytes")]
    InvalidCredentialId(usize),

    /// Wallet already holds the maximum number of guardians
    #[error("guardian limit reached")]
    GuardianLimitReached,

    /// Action tag is not one the program knows how to execute
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// A parameter required by the action is absent
    #[error("missing action parameter: {0}")]
    MissingParam(&'static str),

    /// Lamport arithmetic overflowed
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Source account balance cannot cover the transfer
    #[error("insufficient funds")]
    InsufficientFunds,

    /// No valid derived address exists for the given seeds
    #[error("derived address search space exhausted")]
    NoViableAddress,

    /// Caller is not an owner guardian of the wallet
    #[error("caller is not an owner guardian")]
    NotOwner,

    /// An owner guardian is required for this operation
    #[error("an active owner guardian is required")]
    OwnerRequired,

    /// Guardian has no registered public key
    #[error("guardian has no registered public key")]
    MissingPublicKey,

    /// Public key embedded in the verification instruction does not match
    /// the guardian's registered key
    #[error("public key mismatch")]
    PublicKeyMismatch,

    /// Message embedded in the verification instruction does not match the
    /// canonical encoding of the request
    #[error("message mismatch")]
    MessageMismatch,

    /// No native verification instruction precedes the custody instruction
    #[error("signature verification instruction missing")]
    VerificationMissing,

    /// The native verifier rejected the signature
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Presented recovery secret does not hash to the stored value
    #[error("invalid recovery secret")]
    InvalidRecoverySecret,

    /// Request nonce is not the single expected next value
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch {
        /// The only nonce the wallet will accept
        expected: u64,
        /// The nonce the request carried
        got: u64,
    },

    /// Request timestamp is ahead of ledger time beyond tolerance
    #[error("timestamp is in the future")]
    FutureTimestamp,

    /// Request timestamp is older than the acceptance window
    #[error("timestamp has expired")]
    ExpiredTimestamp,

    /// Request timestamp precedes the last executed transaction
    #[error("timestamp predates last transaction")]
    OutdatedTimestamp,

    /// An account already exists at the derived address
    #[error("account already exists")]
    AccountExists,

    /// No account exists at the derived address
    #[error("account not found")]
    AccountNotFound,

    /// Account data is not of the expected kind
    #[error("account type mismatch")]
    AccountTypeMismatch,

    /// Guardian has already signed this proposal
    #[error("guardian already signed this proposal")]
    DuplicateSignature,

    /// Proposal is not in the pending state
    #[error("proposal is not pending")]
    ProposalNotPending,

    /// Proposal exceeded its lifetime before the attempted action
    #[error("proposal has expired")]
    ProposalExpired,

    /// Collected signatures are below the required count
    #[error("approval threshold not met")]
    ThresholdNotMet,

    /// Guardian is deactivated
    #[error("guardian is inactive")]
    InactiveGuardian,

    /// Removing or deactivating this guardian would leave the wallet with
    /// no active owner
    #[error("would remove the last active owner guardian")]
    LastActiveOwner,
}

impl CustodyError {
    /// The broad class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        use CustodyError::*;
        match self {
            InvalidThreshold | NameTooLong(_) | DescriptionTooLong(_) | InvalidCredentialId(_)
            | GuardianLimitReached | UnsupportedAction(_) | MissingParam(_)
            | ArithmeticOverflow | InsufficientFunds | NoViableAddress => ErrorClass::Validation,
            NotOwner | OwnerRequired | MissingPublicKey | PublicKeyMismatch | MessageMismatch
            | VerificationMissing | SignatureInvalid | InvalidRecoverySecret => {
                ErrorClass::Authentication
            }
            NonceMismatch { .. } | FutureTimestamp | ExpiredTimestamp | OutdatedTimestamp => {
                ErrorClass::Replay
            }
            AccountExists | AccountNotFound | AccountTypeMismatch | DuplicateSignature
            | ProposalNotPending | ProposalExpired | ThresholdNotMet | InactiveGuardian
            | LastActiveOwner => ErrorClass::StateConflict,
        }
    }
}

/// Result type alias for custody program operations.
pub type Result<T> = std::result::Result<T, CustodyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CustodyError::NonceMismatch {
            expected: 3,
            got: 1,
        };
        assert_eq!(err.to_string(), "nonce mismatch: expected 3, got 1");
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(
            CustodyError::InvalidThreshold.class(),
            ErrorClass::Validation
        );
        assert_eq!(
            CustodyError::PublicKeyMismatch.class(),
            ErrorClass::Authentication
        );
        assert_eq!(CustodyError::FutureTimestamp.class(), ErrorClass::Replay);
        assert_eq!(
            CustodyError::DuplicateSignature.class(),
            ErrorClass::StateConflict
        );
    }
}

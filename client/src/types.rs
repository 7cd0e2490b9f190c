//! Common types used across the ledger integration layer.

use moonvault_program::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction status as reported by the ledger RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Transaction is pending
    Pending,
    /// Transaction was successful
    Success,
    /// Transaction failed
    Failed,
    /// Transaction not found
    NotFound,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Success => write!(f, "success"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::NotFound => write!(f, "not_found"),
        }
    }
}

/// Outcome of waiting for a transaction confirmation.
///
/// `Indeterminate` means the confirmation window elapsed with the
/// transaction still unobserved: the request may yet land, so it is not a
/// failure and callers must re-check ledger state before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// The transaction landed successfully
    Confirmed,
    /// The transaction landed and failed
    Failed,
    /// The confirmation window elapsed; outcome unknown
    Indeterminate,
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationStatus::Confirmed => write!(f, "confirmed"),
            ConfirmationStatus::Failed => write!(f, "failed"),
            ConfirmationStatus::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Transaction hash type
pub type TransactionHash = String;

/// Snapshot of a wallet account read from the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccountInfo {
    /// Wallet address
    pub address: Address,
    /// Balance in lamports
    pub balance: u64,
    /// Executed direct-transaction count
    pub transaction_nonce: u64,
    /// Timestamp of the last executed transaction
    pub last_transaction_timestamp: i64,
    /// Approval threshold
    pub threshold: u8,
    /// Registered guardian count
    pub guardian_count: u8,
}

/// A guardian record as stored by the directory service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianInfo {
    /// Address of the guardian's own fee-paying wallet
    pub wallet_address: String,
    /// On-ledger guardian id
    pub guardian_id: u64,
    /// Credential id in hex form
    pub credential_id: String,
    /// Credential id in base64 form
    #[serde(default)]
    pub credential_id_base64: Option<String>,
    /// Registered public key in hex form
    #[serde(default)]
    pub guardian_public_key: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of a proposal-scoped orchestration (sign / execute)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalActionOutcome {
    /// Hash of the submitted transaction
    pub tx_hash: TransactionHash,
    /// Confirmation status observed before returning
    pub confirmation: ConfirmationStatus,
    /// Whether the directory mirror succeeded; the ledger is the source
    /// of truth, so `false` still reports overall success
    pub directory_updated: bool,
}

/// Result of a direct-execution transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Hash of the submitted transaction
    pub tx_hash: TransactionHash,
    /// Confirmation status observed before returning
    pub confirmation: ConfirmationStatus,
}

//! Structured events for every state-changing action.
//!
//! Each committed transaction appends its events to the ledger's event log,
//! which off-chain indexers (the directory service among them) consume.
//! Fields carry only publicly observable state, never secrets.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::state::ProposalStatus;

/// An event plus the ledger time it was recorded at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Ledger timestamp at commit time
    pub timestamp: i64,
    /// The event payload
    pub event: Event,
}

/// Events emitted by the custody program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A wallet account was created.
    WalletInitialized {
        /// The new wallet's address
        wallet: Address,
        /// The creating account
        owner: Address,
        /// Configured approval threshold
        threshold: u8,
    },
    /// A guardian was registered.
    GuardianAdded {
        /// Owning wallet
        wallet: Address,
        /// Assigned guardian id
        guardian_id: u64,
        /// Whether the guardian is owner-flagged
        is_owner: bool,
    },
    /// A guardian account was removed.
    GuardianRemoved {
        /// Owning wallet
        wallet: Address,
        /// Removed guardian id
        guardian_id: u64,
    },
    /// A guardian's active flag changed.
    GuardianStatusUpdated {
        /// Owning wallet
        wallet: Address,
        /// Updated guardian id
        guardian_id: u64,
        /// New active flag
        is_active: bool,
    },
    /// Ownership rotated through the recovery path.
    AccessRecovered {
        /// Owning wallet
        wallet: Address,
        /// Demoted guardian
        old_guardian_id: u64,
        /// Promoted guardian
        new_guardian_id: u64,
    },
    /// A direct or proposal-driven transfer moved lamports.
    TransferExecuted {
        /// Source wallet
        wallet: Address,
        /// Destination account
        destination: Address,
        /// Amount in lamports
        amount: u64,
    },
    /// A proposal was opened.
    ProposalCreated {
        /// Owning wallet
        wallet: Address,
        /// Proposal id
        proposal_id: u64,
        /// Approvals required for execution
        required_signatures: u8,
    },
    /// A guardian approved a proposal.
    ProposalApproved {
        /// Owning wallet
        wallet: Address,
        /// Proposal id
        proposal_id: u64,
        /// Approving guardian
        guardian_id: u64,
        /// Approvals collected after this one
        signatures_count: u8,
    },
    /// A guardian vetoed a proposal.
    ProposalRejected {
        /// Owning wallet
        wallet: Address,
        /// Proposal id
        proposal_id: u64,
        /// Rejecting guardian
        guardian_id: u64,
    },
    /// A proposal reached a terminal status.
    ProposalStatusChanged {
        /// Owning wallet
        wallet: Address,
        /// Proposal id
        proposal_id: u64,
        /// The terminal status entered
        status: ProposalStatus,
    },
}

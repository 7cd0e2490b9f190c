//! MoonVault custody program
//!
//! The on-ledger half of a guardian-based threshold-custody wallet: a set
//! of registered guardians jointly controls a wallet account. A single
//! owner guardian can execute directly by producing a verifiable assertion
//! checked against a native secp256r1 verification entry, or a quorum of
//! guardians can approve a multi-step proposal before it executes.
//!
//! The crate is organised the way the state is:
//!
//! - [`address`]: deterministic account derivation (seed tags, bump
//!   search, credential scoping)
//! - [`state`]: wallet, guardian, proposal and signature-record accounts
//! - [`instruction`]: the transaction model, including the native
//!   verification entry and instruction-list introspection
//! - [`message`]: canonical signing messages, byte-for-byte stable
//! - [`ledger`]: the runtime with atomic transaction processing, native
//!   verification, account storage and events
//! - handler modules `wallet`, `guardian`, `proposal`: the instruction
//!   implementations
//!
//! All state-changing requests against one wallet are serialized by the
//! ledger itself; handlers assume single-threaded, atomic execution per
//! request and never lock.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod address;
pub mod error;
pub mod events;
pub mod instruction;
pub mod ledger;
pub mod message;
pub mod state;

mod guardian;
mod proposal;
mod wallet;

pub use address::{
    credential_seed, derive_address, guardian_address, proposal_address, signature_address,
    wallet_address, Address,
};
pub use error::{CustodyError, ErrorClass, Result};
pub use events::{Event, EventRecord};
pub use instruction::{
    CustodyInstruction, Instruction, InstructionContext, Secp256r1VerifyArgs, SignatureBytes,
    Transaction,
};
pub use ledger::{Account, AccountData, Ledger};
pub use message::{
    approve_message, pubkey_fingerprint, reject_message, transfer_message, ACTION_TRANSFER,
};
pub use state::{
    ActionParams, Guardian, Proposal, ProposalSignature, ProposalStatus, PublicKey, Wallet,
    LAMPORTS_PER_SOL, MAX_CREDENTIAL_LEN, MAX_DESCRIPTION_LEN, MAX_GUARDIANS, MAX_NAME_LEN,
    PROPOSAL_LIFETIME_SECS, TIMESTAMP_FUTURE_TOLERANCE_SECS, TIMESTAMP_MAX_AGE_SECS,
};

/// The custody program's id; derived addresses are scoped by it.
pub const PROGRAM_ID: Address = Address([
    0x88, 0x37, 0x6e, 0x71, 0x8c, 0x7a, 0x5e, 0x61, 0x94, 0xf3, 0x4f, 0xd8, 0x9a, 0xc4, 0x87,
    0x63, 0x65, 0x4a, 0xde, 0xe5, 0xd5, 0x61, 0x22, 0x73, 0xc9, 0xf1, 0x99, 0x01, 0xd6, 0x6f,
    0x29, 0xfe,
]);

#[cfg(test)]
mod tests;

//! MoonVault ledger integration layer
//!
//! The off-ledger half of the MoonVault guardian custody wallet. It
//! resolves local authentication assertions to on-chain guardian
//! identities, derives the accounts a request touches, submits custody
//! transactions over JSON-RPC, and mirrors signing activity into the
//! off-chain directory service.
//!
//! # Features
//!
//! - **Transaction Orchestration**: end-to-end sign / execute / transfer
//!   flows with a strict partial-failure contract (the ledger is the
//!   source of truth; the directory is a best-effort projection)
//! - **Credential Resolution**: encoding-variant lookup (raw / hex /
//!   base64) against the directory, with a sole-guardian fallback
//! - **Ledger RPC**: JSON-RPC transport with confirmation polling that
//!   reports timeouts as indeterminate, never as failure
//! - **Retry Logic**: exponential backoff for transient transport errors
//! - **Error Handling**: the custody error taxonomy (validation /
//!   authentication / replay / state-conflict / transport / directory)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use moonvault_client::{ClientConfig, CustodyClient, SoftwareAuthenticator};
//! use moonvault_program::Address;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = Arc::new(ClientConfig::devnet());
//!     let authenticator = Arc::new(SoftwareAuthenticator::new([7; 32], "my-credential")?);
//!     let client = CustodyClient::new(config, authenticator)?;
//!
//!     let wallet = Address::from_hex(&"11".repeat(32))?;
//!     let outcome = client.sign_proposal(1, &wallet).await?;
//!     println!(
//!         "approved in {} (directory updated: {})",
//!         outcome.tx_hash, outcome.directory_updated
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod retry;
pub mod rpc;
pub mod types;
pub mod webauthn;

// Re-export commonly used types
pub use config::{ClientConfig, Network};
pub use directory::{DirectoryApi, DirectoryClient};
pub use error::{ClientError, Result};
pub use orchestrator::CustodyClient;
pub use resolver::{credential_id_variations, CredentialResolver};
pub use retry::RetryStrategy;
pub use rpc::{wait_for_confirmation, LedgerRpc, LedgerRpcClient};
pub use types::{
    ConfirmationStatus, GuardianInfo, ProposalActionOutcome, TransactionHash, TransactionStatus,
    TransferOutcome, WalletAccountInfo,
};
pub use webauthn::{Assertion, Authenticator, SoftwareAuthenticator};

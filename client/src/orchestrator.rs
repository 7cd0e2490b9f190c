//! Transaction orchestration.
//!
//! Composes the authenticator, the credential resolver, the address
//! deriver and the ledger transport into end-to-end custody flows. The
//! partial-failure contract is strict: a ledger submission failure fails
//! the whole operation and leaves the directory untouched, while a
//! directory failure after a successful submission only downgrades the
//! result with a "directory not updated" flag. The ledger is the source
//! of truth and the directory a best-effort projection.

use chrono::Utc;
use moonvault_program::{
    approve_message, guardian_address, proposal_address, transfer_message, Address,
    CustodyInstruction, Instruction, PublicKey, Secp256r1VerifyArgs, Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::directory::{DirectoryApi, DirectoryClient};
use crate::error::{ClientError, Result};
use crate::resolver::CredentialResolver;
use crate::rpc::{wait_for_confirmation, LedgerRpc, LedgerRpcClient};
use crate::types::{
    ConfirmationStatus, GuardianInfo, ProposalActionOutcome, TransferOutcome,
};
use crate::webauthn::Authenticator;

/// High-level custody client combining transport, directory, credential
/// resolution and local authentication.
pub struct CustodyClient {
    config: Arc<ClientConfig>,
    rpc: Arc<dyn LedgerRpc>,
    directory: Arc<dyn DirectoryApi>,
    authenticator: Arc<dyn Authenticator>,
    resolver: CredentialResolver,
}

impl CustodyClient {
    /// Create a client with HTTP transport and directory implementations.
    pub fn new(config: Arc<ClientConfig>, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        config.validate()?;
        info!("Initializing custody client for {:?}", config.network);

        let rpc: Arc<dyn LedgerRpc> = Arc::new(LedgerRpcClient::new(config.clone())?);
        let directory: Arc<dyn DirectoryApi> = Arc::new(DirectoryClient::new(config.clone())?);
        Self::with_components(config, rpc, directory, authenticator)
    }

    /// Create a client over explicit collaborator implementations.
    pub fn with_components(
        config: Arc<ClientConfig>,
        rpc: Arc<dyn LedgerRpc>,
        directory: Arc<dyn DirectoryApi>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        config.validate()?;
        let resolver = CredentialResolver::new(directory.clone());
        Ok(Self {
            config,
            rpc,
            directory,
            authenticator,
            resolver,
        })
    }

    /// The credential resolver (exposed for session cache inspection).
    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// Sign (approve) a proposal as the locally authenticated guardian.
    pub async fn sign_proposal(
        &self,
        proposal_id: u64,
        wallet_address: &Address,
    ) -> Result<ProposalActionOutcome> {
        info!("Signing proposal {} for wallet {}", proposal_id, wallet_address);

        let timestamp = Utc::now().timestamp();
        let challenge = approve_message(proposal_id, timestamp);

        // Discovery mode: the user picks from their registered credentials.
        let assertion = self
            .authenticator
            .get_assertion(None, challenge.as_bytes(), true)
            .await?
            .ok_or(ClientError::AuthenticationCancelled)?;

        let guardian = self
            .resolver
            .resolve(assertion.credential_id.as_deref(), &wallet_address.to_string())
            .await?;
        let public_key = guardian_public_key(&guardian)?;
        let payer = guardian_payer(&guardian)?;
        let signature = assertion.signature_bytes()?;

        self.log_derived_addresses(wallet_address, guardian.guardian_id, proposal_id)?;

        let tx = Transaction {
            payer,
            instructions: vec![
                Instruction::Secp256r1Verify(Secp256r1VerifyArgs {
                    public_key,
                    message: challenge.into_bytes(),
                    signature,
                }),
                Instruction::Custody(CustodyInstruction::ApproveProposal {
                    wallet: *wallet_address,
                    proposal_id,
                    guardian_id: guardian.guardian_id,
                    timestamp,
                }),
            ],
        };

        // A submission failure fails the whole operation; the directory
        // is not touched.
        let tx_hash = self.rpc.submit_transaction(&tx).await?;
        let confirmation = self.confirm_transaction(&tx_hash).await;
        if confirmation == ConfirmationStatus::Failed {
            return Err(ClientError::TransactionFailed {
                code: "approve_proposal".to_string(),
                message: format!("transaction {tx_hash} failed on the ledger"),
            });
        }

        let directory_updated = match self
            .directory
            .add_signer_to_proposal(
                &wallet_address.to_string(),
                proposal_id,
                &guardian.wallet_address,
            )
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "Approval landed on the ledger but the directory mirror failed: {err}"
                );
                false
            }
        };

        Ok(ProposalActionOutcome {
            tx_hash,
            confirmation,
            directory_updated,
        })
    }

    /// Execute a proposal that has collected its required approvals.
    ///
    /// The directory status is updated optimistically after submission;
    /// callers needing on-ledger certainty should follow up with
    /// [`CustodyClient::confirm_transaction`].
    pub async fn execute_proposal(
        &self,
        proposal_id: u64,
        wallet_address: &Address,
        payer: &Address,
    ) -> Result<ProposalActionOutcome> {
        info!(
            "Executing proposal {} for wallet {}",
            proposal_id, wallet_address
        );

        let tx = Transaction {
            payer: *payer,
            instructions: vec![Instruction::Custody(CustodyInstruction::ExecuteProposal {
                wallet: *wallet_address,
                proposal_id,
            })],
        };

        let tx_hash = self.rpc.submit_transaction(&tx).await?;

        let directory_updated = match self
            .directory
            .update_proposal_status(&wallet_address.to_string(), proposal_id, "executed")
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!("Optimistic directory status update failed: {err}");
                false
            }
        };

        Ok(ProposalActionOutcome {
            tx_hash,
            // Not awaited here; the directory update is optimistic.
            confirmation: ConfirmationStatus::Indeterminate,
            directory_updated,
        })
    }

    /// Direct single-signer transfer out of the wallet.
    ///
    /// Reads the wallet's expected nonce, authenticates over the canonical
    /// transfer message and submits the verify-and-execute pair. On an
    /// indeterminate outcome callers must re-read the on-ledger nonce
    /// before retrying; resubmitting blindly could double-execute.
    pub async fn transfer(
        &self,
        wallet_address: &Address,
        amount: u64,
        destination: &Address,
    ) -> Result<TransferOutcome> {
        info!(
            "Direct transfer of {} lamports from wallet {}",
            amount, wallet_address
        );

        let guardian = self
            .resolver
            .resolve(None, &wallet_address.to_string())
            .await?;
        let public_key = guardian_public_key(&guardian)?;
        let payer = guardian_payer(&guardian)?;

        let account = self.rpc.get_wallet_account(wallet_address).await?;
        let nonce = account.transaction_nonce + 1;
        let timestamp = Utc::now().timestamp();

        let message = transfer_message(amount, destination, nonce, timestamp, &public_key);
        let assertion = self
            .authenticator
            .get_assertion(Some(&guardian.credential_id), message.as_bytes(), false)
            .await?
            .ok_or(ClientError::AuthenticationCancelled)?;
        let signature = assertion.signature_bytes()?;

        let tx = Transaction {
            payer,
            instructions: vec![
                Instruction::Secp256r1Verify(Secp256r1VerifyArgs {
                    public_key,
                    message: message.into_bytes(),
                    signature,
                }),
                Instruction::Custody(CustodyInstruction::VerifyAndExecute {
                    wallet: *wallet_address,
                    guardian_id: guardian.guardian_id,
                    action: "transfer".to_string(),
                    params: moonvault_program::ActionParams {
                        amount: Some(amount),
                        destination: Some(*destination),
                        token_mint: None,
                    },
                    nonce,
                    timestamp,
                }),
            ],
        };

        let tx_hash = self.rpc.submit_transaction(&tx).await?;
        let confirmation = self.confirm_transaction(&tx_hash).await;
        if confirmation == ConfirmationStatus::Failed {
            return Err(ClientError::TransactionFailed {
                code: "verify_and_execute".to_string(),
                message: format!("transaction {tx_hash} failed on the ledger"),
            });
        }

        Ok(TransferOutcome {
            tx_hash,
            confirmation,
        })
    }

    /// Wait for a transaction's confirmation within the configured window.
    pub async fn confirm_transaction(&self, tx_hash: &str) -> ConfirmationStatus {
        wait_for_confirmation(
            self.rpc.as_ref(),
            tx_hash,
            Duration::from_millis(self.config.confirm_poll_interval_ms),
            Duration::from_secs(self.config.confirm_timeout_secs),
        )
        .await
    }

    fn log_derived_addresses(
        &self,
        wallet_address: &Address,
        guardian_id: u64,
        proposal_id: u64,
    ) -> Result<()> {
        let (guardian_addr, _) =
            guardian_address(&self.config.program_id, wallet_address, guardian_id)
                .map_err(|e| ClientError::Validation(e.to_string()))?;
        let (proposal_addr, _) =
            proposal_address(&self.config.program_id, wallet_address, proposal_id)
                .map_err(|e| ClientError::Validation(e.to_string()))?;
        debug!(
            "Derived guardian address {} and proposal address {}",
            guardian_addr, proposal_addr
        );
        Ok(())
    }
}

/// Parse the registered public key out of a directory record.
fn guardian_public_key(guardian: &GuardianInfo) -> Result<PublicKey> {
    guardian
        .guardian_public_key
        .as_deref()
        .and_then(PublicKey::from_hex)
        .ok_or_else(|| {
            ClientError::Validation(format!(
                "guardian {} has no usable public key on record",
                guardian.guardian_id
            ))
        })
}

/// Parse the guardian's fee-paying address out of a directory record.
fn guardian_payer(guardian: &GuardianInfo) -> Result<Address> {
    Address::from_hex(&guardian.wallet_address).map_err(|_| {
        ClientError::Validation(format!(
            "guardian {} has an invalid wallet address on record",
            guardian.guardian_id
        ))
    })
}

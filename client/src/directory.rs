//! Directory service client.
//!
//! The directory is off-chain bookkeeping: it maps credential ids to
//! registered guardians and mirrors proposal signing activity for display.
//! It is consumed, never owned, and it is a best-effort projection; the
//! ledger remains the source of truth.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryStrategy;
use crate::types::GuardianInfo;

/// The directory interface consumed by the resolver and orchestrator.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Look up the guardian registered under a credential id, if any.
    async fn get_wallet_by_credential_id(&self, credential_id: &str)
        -> Result<Option<GuardianInfo>>;

    /// All guardians registered under a wallet address.
    async fn get_credentials_by_wallet(&self, wallet_address: &str) -> Result<Vec<GuardianInfo>>;

    /// Record a signer on a proposal.
    async fn add_signer_to_proposal(
        &self,
        wallet_address: &str,
        proposal_id: u64,
        signer_address: &str,
    ) -> Result<()>;

    /// Update a proposal's display status.
    async fn update_proposal_status(
        &self,
        wallet_address: &str,
        proposal_id: u64,
        status: &str,
    ) -> Result<()>;
}

/// HTTP directory client
#[derive(Clone)]
pub struct DirectoryClient {
    /// HTTP client
    client: Client,
    /// Base URL for the directory service
    base_url: String,
    /// Retry strategy
    retry_strategy: RetryStrategy,
}

impl DirectoryClient {
    /// Create a new directory client
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Network)?;

        let retry_strategy = RetryStrategy::from_config(&config);

        Ok(Self {
            client,
            base_url: config.directory_url.clone(),
            retry_strategy,
        })
    }

    /// Health check - verify connectivity to the directory service
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Performing directory health check");
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::Network)?;
        if response.status().is_success() {
            info!("Directory health check passed");
            Ok(true)
        } else {
            error!("Directory health check failed: {}", response.status());
            Err(ClientError::Directory(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl DirectoryApi for DirectoryClient {
    async fn get_wallet_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<GuardianInfo>> {
        debug!("Directory lookup for credential: {}", credential_id);

        let url = format!("{}/credentials", self.base_url);

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .get(&url)
                    .query(&[("credentialId", credential_id)])
                    .send()
                    .await
                    .map_err(ClientError::Network)?;

                if response.status() == 404 {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    let status = response.status();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(ClientError::Directory(format!(
                        "Status {status}: {error_text}"
                    )));
                }

                let info: GuardianInfo = response
                    .json()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
                debug!("Credential resolved to guardian {}", info.guardian_id);
                Ok(Some(info))
            })
            .await
    }

    async fn get_credentials_by_wallet(&self, wallet_address: &str) -> Result<Vec<GuardianInfo>> {
        debug!("Fetching guardians for wallet: {}", wallet_address);

        let url = format!("{}/wallets/{}/credentials", self.base_url, wallet_address);

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(ClientError::Network)?;

                if response.status() == 404 {
                    return Ok(Vec::new());
                }
                if !response.status().is_success() {
                    let status = response.status();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(ClientError::Directory(format!(
                        "Status {status}: {error_text}"
                    )));
                }

                response
                    .json()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))
            })
            .await
    }

    async fn add_signer_to_proposal(
        &self,
        wallet_address: &str,
        proposal_id: u64,
        signer_address: &str,
    ) -> Result<()> {
        info!(
            "Recording signer {} on proposal {} in directory",
            signer_address, proposal_id
        );

        let url = format!(
            "{}/wallets/{}/proposals/{}/signers",
            self.base_url, wallet_address, proposal_id
        );

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .post(&url)
                    .json(&json!({ "signer": signer_address }))
                    .send()
                    .await
                    .map_err(ClientError::Network)?;

                if response.status().is_success() {
                    Ok(())
                } else {
                    let status = response.status();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    Err(ClientError::Directory(format!(
                        "Status {status}: {error_text}"
                    )))
                }
            })
            .await
    }

    async fn update_proposal_status(
        &self,
        wallet_address: &str,
        proposal_id: u64,
        status: &str,
    ) -> Result<()> {
        info!(
            "Updating proposal {} status to '{}' in directory",
            proposal_id, status
        );

        let url = format!(
            "{}/wallets/{}/proposals/{}/status",
            self.base_url, wallet_address, proposal_id
        );

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .post(&url)
                    .json(&json!({ "status": status }))
                    .send()
                    .await
                    .map_err(ClientError::Network)?;

                if response.status().is_success() {
                    Ok(())
                } else {
                    let http_status = response.status();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    Err(ClientError::Directory(format!(
                        "Status {http_status}: {error_text}"
                    )))
                }
            })
            .await
    }
}

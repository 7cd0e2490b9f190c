//! Ledger RPC transport.
//!
//! A JSON-RPC 2.0 client for submitting custody transactions and reading
//! wallet/transaction state, plus a polling helper that maps confirmation
//! timeouts to an indeterminate outcome rather than a failure.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use moonvault_program::{Address, Transaction};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryStrategy;
use crate::types::{ConfirmationStatus, TransactionHash, TransactionStatus, WalletAccountInfo};

/// JSON-RPC request ID type
type RequestId = u64;

/// The ledger transport consumed by the orchestrator.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Submit a transaction and return its hash.
    async fn submit_transaction(&self, tx: &Transaction) -> Result<TransactionHash>;

    /// Current status of a submitted transaction.
    async fn get_transaction_status(&self, tx_hash: &str) -> Result<TransactionStatus>;

    /// Snapshot of a wallet account (nonce, balance, configuration).
    async fn get_wallet_account(&self, address: &Address) -> Result<WalletAccountInfo>;
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: RequestId,
    method: String,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: RequestId,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// JSON-RPC ledger client
#[derive(Clone)]
pub struct LedgerRpcClient {
    /// HTTP client
    client: Client,
    /// Base URL for the RPC endpoint
    base_url: String,
    /// Retry strategy
    retry_strategy: RetryStrategy,
    /// Request ID counter
    request_id: Arc<std::sync::atomic::AtomicU64>,
}

impl LedgerRpcClient {
    /// Create a new ledger RPC client
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Network)?;

        let retry_strategy = RetryStrategy::from_config(&config);

        Ok(Self {
            client,
            base_url: config.rpc_url.clone(),
            retry_strategy,
            request_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
        })
    }

    /// Get next request ID
    fn next_request_id(&self) -> RequestId {
        self.request_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    /// Make a JSON-RPC call
    async fn call_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request_id = self.next_request_id();

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: request_id,
            method: method.to_string(),
            params,
        };

        debug!("Ledger RPC request: {} (id: {})", method, request_id);

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .post(&self.base_url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(ClientError::Network)?;

                let status = response.status();
                if !status.is_success() {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(ClientError::Rpc(format!("HTTP {status}: {error_text}")));
                }

                let rpc_response: JsonRpcResponse = response
                    .json()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

                if let Some(rpc_error) = rpc_response.error {
                    error!(
                        "Ledger RPC error: {} (code: {})",
                        rpc_error.message, rpc_error.code
                    );
                    return Err(map_rpc_error(&rpc_error));
                }

                rpc_response
                    .result
                    .ok_or_else(|| ClientError::Rpc("Missing result in response".to_string()))
            })
            .await
    }
}

/// Map a JSON-RPC error onto the custody error taxonomy.
///
/// The RPC surfaces the on-ledger failure class in `error.data.class`;
/// anything unclassified stays a transport-level RPC error.
fn map_rpc_error(rpc_error: &JsonRpcError) -> ClientError {
    let class = rpc_error
        .data
        .as_ref()
        .and_then(|data| data["class"].as_str())
        .unwrap_or("");
    let message = rpc_error.message.clone();

    match class {
        "replay" => ClientError::Replay(message),
        "state_conflict" => ClientError::StateConflict(message),
        "validation" => ClientError::Validation(message),
        "authentication" => ClientError::AuthenticationFailed(message),
        _ => ClientError::Rpc(format!("{} (code: {})", message, rpc_error.code)),
    }
}

#[async_trait]
impl LedgerRpc for LedgerRpcClient {
    async fn submit_transaction(&self, tx: &Transaction) -> Result<TransactionHash> {
        info!("Submitting transaction to ledger RPC");

        let encoded = BASE64.encode(serde_json::to_vec(tx)?);
        let result = self
            .call_rpc("sendTransaction", json!({ "transaction": encoded }))
            .await?;

        let hash = result["signature"]
            .as_str()
            .ok_or_else(|| ClientError::InvalidResponse("Missing signature field".to_string()))?
            .to_string();

        info!("Transaction submitted: {}", hash);
        Ok(hash)
    }

    async fn get_transaction_status(&self, tx_hash: &str) -> Result<TransactionStatus> {
        debug!("Fetching transaction status for: {}", tx_hash);

        let result = self
            .call_rpc("getTransaction", json!({ "signature": tx_hash }))
            .await?;

        if result.is_null() {
            return Ok(TransactionStatus::NotFound);
        }
        match result["status"].as_str() {
            Some("pending") => Ok(TransactionStatus::Pending),
            Some("success") => Ok(TransactionStatus::Success),
            Some("failed") => Ok(TransactionStatus::Failed),
            Some("not_found") => Ok(TransactionStatus::NotFound),
            other => Err(ClientError::InvalidResponse(format!(
                "unknown transaction status: {other:?}"
            ))),
        }
    }

    async fn get_wallet_account(&self, address: &Address) -> Result<WalletAccountInfo> {
        debug!("Fetching wallet account: {}", address);

        let result = self
            .call_rpc("getAccountInfo", json!({ "address": address.to_string() }))
            .await?;

        if result.is_null() {
            return Err(ClientError::AccountNotFound(address.to_string()));
        }

        let info: WalletAccountInfo = serde_json::from_value(result["value"].clone())
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(info)
    }
}

/// Poll the RPC until the transaction reaches a terminal status or the
/// window elapses.
///
/// A timeout yields [`ConfirmationStatus::Indeterminate`]: the request may
/// still land, so callers must re-check ledger state rather than blindly
/// resubmit.
pub async fn wait_for_confirmation(
    rpc: &dyn LedgerRpc,
    tx_hash: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> ConfirmationStatus {
    info!(
        "Waiting for confirmation of {} (timeout: {:?})",
        tx_hash, timeout
    );
    let start = Instant::now();

    loop {
        if start.elapsed() >= timeout {
            warn!("Confirmation window elapsed for {}", tx_hash);
            return ConfirmationStatus::Indeterminate;
        }

        match rpc.get_transaction_status(tx_hash).await {
            Ok(TransactionStatus::Success) => {
                info!("Transaction confirmed: {}", tx_hash);
                return ConfirmationStatus::Confirmed;
            }
            Ok(TransactionStatus::Failed) => {
                warn!("Transaction failed on ledger: {}", tx_hash);
                return ConfirmationStatus::Failed;
            }
            Ok(TransactionStatus::Pending) | Ok(TransactionStatus::NotFound) => {
                debug!("Transaction not yet final: {}", tx_hash);
            }
            Err(e) => {
                debug!("Error while polling for confirmation: {:?}", e);
            }
        }

        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_client_creation() {
        let config = Arc::new(ClientConfig::devnet());
        assert!(LedgerRpcClient::new(config).is_ok());
    }

    #[test]
    fn test_map_rpc_error_classes() {
        let err = JsonRpcError {
            code: -32001,
            message: "nonce mismatch: expected 2, got 1".to_string(),
            data: Some(json!({ "class": "replay" })),
        };
        assert!(matches!(map_rpc_error(&err), ClientError::Replay(_)));

        let err = JsonRpcError {
            code: -32002,
            message: "proposal is not pending".to_string(),
            data: Some(json!({ "class": "state_conflict" })),
        };
        assert!(matches!(map_rpc_error(&err), ClientError::StateConflict(_)));

        let err = JsonRpcError {
            code: -32000,
            message: "boom".to_string(),
            data: None,
        };
        assert!(matches!(map_rpc_error(&err), ClientError::Rpc(_)));
    }
}

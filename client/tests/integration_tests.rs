//! Integration tests for the ledger integration layer.
//!
//! These tests drive the orchestrator against wiremock-backed RPC and
//! directory servers and a software authenticator.

use assert_matches::assert_matches;
use async_trait::async_trait;
use moonvault_client::{
    Assertion, Authenticator, ClientConfig, ClientError, ConfirmationStatus, CustodyClient,
    SoftwareAuthenticator,
};
use moonvault_program::Address;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREDENTIAL_ID: &str = "deadbeef";

fn wallet_address() -> Address {
    Address::from_hex(&"11".repeat(32)).unwrap()
}

fn payer_hex() -> String {
    "22".repeat(32)
}

fn test_config(rpc_url: String, directory_url: String) -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::custom(rpc_url, directory_url)
            .unwrap()
            .with_request_timeout(Duration::from_secs(5))
            .with_max_retries(1)
            .with_retry_config(10, 50, 2.0)
            .with_confirmation_config(50, 1),
    )
}

fn test_authenticator() -> Arc<SoftwareAuthenticator> {
    Arc::new(SoftwareAuthenticator::new([7; 32], CREDENTIAL_ID).unwrap())
}

fn guardian_record(authenticator: &SoftwareAuthenticator) -> serde_json::Value {
    json!({
        "walletAddress": payer_hex(),
        "guardianId": 1,
        "credentialId": CREDENTIAL_ID,
        "credentialIdBase64": "3q2+7w==",
        "guardianPublicKey": hex::encode(authenticator.public_key().0),
        "name": "phone",
    })
}

/// Mount the happy-path directory lookup.
async fn mount_credential_lookup(server: &MockServer, record: &serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/credentials"))
        .and(query_param("credentialId", CREDENTIAL_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(server)
        .await;
}

/// Mount a JSON-RPC method returning `result`.
async fn mount_rpc_result(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sign_proposal_happy_path() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    mount_credential_lookup(&directory_server, &guardian_record(&authenticator)).await;
    mount_rpc_result(&rpc_server, "sendTransaction", json!({ "signature": "sig-1" })).await;
    mount_rpc_result(&rpc_server, "getTransaction", json!({ "status": "success" })).await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/wallets/{}/proposals/7/signers",
            wallet_address()
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&directory_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let outcome = client.sign_proposal(7, &wallet_address()).await.unwrap();
    assert_eq!(outcome.tx_hash, "sig-1");
    assert_eq!(outcome.confirmation, ConfirmationStatus::Confirmed);
    assert!(outcome.directory_updated);
}

/// Dismissing the prompt is an explicit cancellation, not a generic
/// failure, and nothing is submitted anywhere.
#[tokio::test]
async fn test_sign_proposal_cancelled_by_user() {
    struct CancellingAuthenticator;

    #[async_trait]
    impl Authenticator for CancellingAuthenticator {
        async fn get_assertion(
            &self,
            _credential_id: Option<&str>,
            _challenge: &[u8],
            _allow_discovery: bool,
        ) -> moonvault_client::Result<Option<Assertion>> {
            Ok(None)
        }
    }

    let client = CustodyClient::new(
        test_config(
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
        ),
        Arc::new(CancellingAuthenticator),
    )
    .unwrap();

    let result = client.sign_proposal(7, &wallet_address()).await;
    assert_matches!(result, Err(ClientError::AuthenticationCancelled));
}

/// A ledger submission failure fails the whole operation and the
/// directory must not be touched.
#[tokio::test]
async fn test_sign_proposal_submission_failure_skips_directory() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    mount_credential_lookup(&directory_server, &guardian_record(&authenticator)).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "sendTransaction" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": -32002,
                "message": "proposal is not pending",
                "data": { "class": "state_conflict" },
            },
        })))
        .mount(&rpc_server)
        .await;
    // The signer mirror must never fire.
    Mock::given(method("POST"))
        .and(path(format!(
            "/wallets/{}/proposals/7/signers",
            wallet_address()
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&directory_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let result = client.sign_proposal(7, &wallet_address()).await;
    assert_matches!(result, Err(ClientError::StateConflict(_)));
}

/// A directory failure after a successful submission downgrades the
/// result instead of failing it.
#[tokio::test]
async fn test_sign_proposal_directory_failure_is_downgraded() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    mount_credential_lookup(&directory_server, &guardian_record(&authenticator)).await;
    mount_rpc_result(&rpc_server, "sendTransaction", json!({ "signature": "sig-2" })).await;
    mount_rpc_result(&rpc_server, "getTransaction", json!({ "status": "success" })).await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/wallets/{}/proposals/7/signers",
            wallet_address()
        )))
        .respond_with(ResponseTemplate::new(500))
        .mount(&directory_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let outcome = client.sign_proposal(7, &wallet_address()).await.unwrap();
    assert_eq!(outcome.confirmation, ConfirmationStatus::Confirmed);
    assert!(!outcome.directory_updated);
}

/// A confirmation timeout is reported as indeterminate, not failed, and
/// the directory mirror is still attempted.
#[tokio::test]
async fn test_sign_proposal_confirmation_timeout_is_indeterminate() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    mount_credential_lookup(&directory_server, &guardian_record(&authenticator)).await;
    mount_rpc_result(&rpc_server, "sendTransaction", json!({ "signature": "sig-3" })).await;
    mount_rpc_result(&rpc_server, "getTransaction", json!({ "status": "pending" })).await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/wallets/{}/proposals/7/signers",
            wallet_address()
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&directory_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let outcome = client.sign_proposal(7, &wallet_address()).await.unwrap();
    assert_eq!(outcome.confirmation, ConfirmationStatus::Indeterminate);
    assert!(outcome.directory_updated);
}

#[tokio::test]
async fn test_execute_proposal_updates_directory_optimistically() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    mount_rpc_result(&rpc_server, "sendTransaction", json!({ "signature": "sig-4" })).await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/wallets/{}/proposals/7/status",
            wallet_address()
        )))
        .and(body_partial_json(json!({ "status": "executed" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&directory_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let payer = Address::from_hex(&payer_hex()).unwrap();
    let outcome = client
        .execute_proposal(7, &wallet_address(), &payer)
        .await
        .unwrap();
    assert_eq!(outcome.tx_hash, "sig-4");
    assert_eq!(outcome.confirmation, ConfirmationStatus::Indeterminate);
    assert!(outcome.directory_updated);
}

#[tokio::test]
async fn test_transfer_happy_path() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    // No cached credential: resolution goes through the broad query and
    // accepts the wallet's sole registered guardian.
    Mock::given(method("GET"))
        .and(path(format!("/wallets/{}/credentials", wallet_address())))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([guardian_record(&authenticator)])),
        )
        .mount(&directory_server)
        .await;
    mount_rpc_result(
        &rpc_server,
        "getAccountInfo",
        json!({
            "value": {
                "address": wallet_address().to_string(),
                "balance": 5_000_000_000u64,
                "transactionNonce": 0,
                "lastTransactionTimestamp": 0,
                "threshold": 1,
                "guardianCount": 1,
            }
        }),
    )
    .await;
    mount_rpc_result(&rpc_server, "sendTransaction", json!({ "signature": "sig-5" })).await;
    mount_rpc_result(&rpc_server, "getTransaction", json!({ "status": "success" })).await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let destination = Address::from_hex(&"33".repeat(32)).unwrap();
    let outcome = client
        .transfer(&wallet_address(), 1_000_000, &destination)
        .await
        .unwrap();
    assert_eq!(outcome.tx_hash, "sig-5");
    assert_eq!(outcome.confirmation, ConfirmationStatus::Confirmed);
}

/// A replay rejection from the ledger surfaces as a replay error the
/// caller must re-authenticate for.
#[tokio::test]
async fn test_transfer_replay_rejection_mapped() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    Mock::given(method("GET"))
        .and(path(format!("/wallets/{}/credentials", wallet_address())))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([guardian_record(&authenticator)])),
        )
        .mount(&directory_server)
        .await;
    mount_rpc_result(
        &rpc_server,
        "getAccountInfo",
        json!({
            "value": {
                "address": wallet_address().to_string(),
                "balance": 5_000_000_000u64,
                "transactionNonce": 4,
                "lastTransactionTimestamp": 0,
                "threshold": 1,
                "guardianCount": 1,
            }
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "sendTransaction" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": -32001,
                "message": "nonce mismatch: expected 6, got 5",
                "data": { "class": "replay" },
            },
        })))
        .mount(&rpc_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let destination = Address::from_hex(&"33".repeat(32)).unwrap();
    let result = client
        .transfer(&wallet_address(), 1_000_000, &destination)
        .await;
    assert_matches!(result, Err(ClientError::Replay(_)));
}

/// Scenario: unmatched credential and two registered guardians must
/// fail closed with a credential error.
#[tokio::test]
async fn test_sign_proposal_ambiguous_credential_fails_closed() {
    let rpc_server = MockServer::start().await;
    let directory_server = MockServer::start().await;
    let authenticator = test_authenticator();

    // Every encoding lookup misses.
    Mock::given(method("GET"))
        .and(path("/credentials"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&directory_server)
        .await;
    // Two guardians registered: the fallback must not guess.
    let mut second = guardian_record(&authenticator);
    second["guardianId"] = json!(2);
    second["credentialId"] = json!("cafebabe");
    Mock::given(method("GET"))
        .and(path(format!("/wallets/{}/credentials", wallet_address())))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([guardian_record(&authenticator), second])),
        )
        .mount(&directory_server)
        .await;

    let client = CustodyClient::new(
        test_config(rpc_server.uri(), directory_server.uri()),
        authenticator,
    )
    .unwrap();

    let result = client.sign_proposal(7, &wallet_address()).await;
    assert_matches!(result, Err(ClientError::CredentialNotRegistered));
}

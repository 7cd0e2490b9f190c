//! Error types for the ledger integration layer.
//!
//! The variants follow the custody error taxonomy: validation errors are
//! local and never retried, authentication errors need a fresh user
//! interaction, replay errors need a fresh nonce/timestamp, state
//! conflicts are permanent for the current ledger state, transport errors
//! are retryable with idempotency care, and directory errors never fail
//! an otherwise-successful ledger operation.

use thiserror::Error;

/// Main error type for custody client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed input; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// The user dismissed the authentication prompt or no credential
    /// matched
    #[error("Authentication cancelled by user")]
    AuthenticationCancelled,

    /// The local authenticator failed to produce an assertion
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No registered guardian matches the presented credential
    #[error("Credential is not registered with any guardian")]
    CredentialNotRegistered,

    /// Nonce or timestamp was rejected by the ledger; re-derive and
    /// re-authenticate before retrying
    #[error("Replay protection rejected the request: {0}")]
    Replay(String),

    /// The requested transition conflicts with on-ledger state
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Ledger RPC error response
    #[error("Ledger RPC error: {0}")]
    Rpc(String),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transaction failed on the ledger
    #[error("Transaction failed with code {code}: {message}")]
    TransactionFailed {
        /// Error code from the transaction failure
        code: String,
        /// Error message describing the failure
        message: String,
    },

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Account not found on the ledger
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Max retries exceeded
    #[error("Max retries ({0}) exceeded")]
    MaxRetriesExceeded(usize),

    /// Invalid response from a server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Directory service error; downgraded to a warning flag when the
    /// ledger operation itself succeeded
    #[error("Directory error: {0}")]
    Directory(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 decode error
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for custody client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error context for retryable operations
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    /// Number of attempts made
    pub attempts: usize,
    /// Last error encountered
    pub last_error: String,
    /// Total time spent retrying (in milliseconds)
    pub total_time_ms: u64,
}

impl RetryContext {
    /// Create a new retry context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt
    pub fn record_attempt(&mut self, error: &str, duration_ms: u64) {
        self.attempts += 1;
        self.last_error = error.to_string();
        self.total_time_ms += duration_ms;
    }
}

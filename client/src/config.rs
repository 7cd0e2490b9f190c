//! Client configuration: network endpoints, timeouts and retry tuning.
//!
//! A configuration names the ledger RPC endpoint, the off-chain directory
//! service endpoint, and the custody program id that derived addresses are
//! scoped by.

use moonvault_program::{Address, PROGRAM_ID};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Development network
    Devnet,
    /// Production network
    Mainnet,
    /// Custom network with user-defined endpoints
    Custom,
}

impl Network {
    /// Get the default ledger RPC URL for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Devnet => "https://rpc-devnet.moonvault.app",
            Network::Mainnet => "https://rpc.moonvault.app",
            Network::Custom => "",
        }
    }

    /// Get the default directory service URL for this network
    pub fn default_directory_url(&self) -> &'static str {
        match self {
            Network::Devnet => "https://directory-devnet.moonvault.app",
            Network::Mainnet => "https://directory.moonvault.app",
            Network::Custom => "",
        }
    }
}

/// Configuration for the custody client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Network to connect to
    pub network: Network,

    /// Ledger RPC endpoint URL
    pub rpc_url: String,

    /// Directory service endpoint URL
    pub directory_url: String,

    /// Custody program id
    pub program_id: Address,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Maximum number of retries for failed requests
    pub max_retries: usize,

    /// Initial retry delay (in milliseconds)
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay (in milliseconds)
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    pub retry_multiplier: f64,

    /// Confirmation polling interval (in milliseconds)
    pub confirm_poll_interval_ms: u64,

    /// Confirmation timeout (in seconds); on expiry the outcome is
    /// reported as indeterminate, not failed
    pub confirm_timeout_secs: u64,
}

impl ClientConfig {
    /// Create a new configuration for the specified network
    pub fn new(network: Network) -> Self {
        Self {
            network,
            rpc_url: network.default_rpc_url().to_string(),
            directory_url: network.default_directory_url().to_string(),
            program_id: PROGRAM_ID,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            retry_multiplier: 2.0,
            confirm_poll_interval_ms: 1000,
            confirm_timeout_secs: 60,
        }
    }

    /// Create configuration for devnet
    pub fn devnet() -> Self {
        Self::new(Network::Devnet)
    }

    /// Create configuration for mainnet
    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet)
    }

    /// Create a custom configuration
    pub fn custom(rpc_url: String, directory_url: String) -> Result<Self> {
        if rpc_url.is_empty() {
            return Err(ClientError::Config("RPC URL cannot be empty".to_string()));
        }
        if directory_url.is_empty() {
            return Err(ClientError::Config(
                "Directory URL cannot be empty".to_string(),
            ));
        }

        let mut config = Self::new(Network::Custom);
        config.rpc_url = rpc_url;
        config.directory_url = directory_url;
        Ok(config)
    }

    /// Set the custody program id
    pub fn with_program_id(mut self, program_id: Address) -> Self {
        self.program_id = program_id;
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set retry delays
    pub fn with_retry_config(
        mut self,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        self.retry_initial_delay_ms = initial_delay_ms;
        self.retry_max_delay_ms = max_delay_ms;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set confirmation polling configuration
    pub fn with_confirmation_config(mut self, poll_interval_ms: u64, timeout_secs: u64) -> Self {
        self.confirm_poll_interval_ms = poll_interval_ms;
        self.confirm_timeout_secs = timeout_secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(ClientError::Config("RPC URL cannot be empty".to_string()));
        }
        if self.directory_url.is_empty() {
            return Err(ClientError::Config(
                "Directory URL cannot be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ClientError::Config(
                "Max retries must be greater than 0".to_string(),
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(ClientError::Config(
                "Retry initial delay must be greater than 0".to_string(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(ClientError::Config(
                "Retry multiplier must be greater than 1.0".to_string(),
            ));
        }
        if self.confirm_poll_interval_ms == 0 {
            return Err(ClientError::Config(
                "Confirmation poll interval must be greater than 0".to_string(),
            ));
        }
        if self.confirm_timeout_secs == 0 {
            return Err(ClientError::Config(
                "Confirmation timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

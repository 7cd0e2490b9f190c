//! Retry logic for transport operations.
//!
//! Transient transport failures are retried with exponential backoff.
//! Validation, authentication, replay and state-conflict errors are never
//! retried: replaying those requires fresh input, not persistence.

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result, RetryContext};

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// Maximum number of retries
    pub max_retries: usize,
    /// Initial retry delay
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl RetryStrategy {
    /// Create a new retry strategy from client config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            multiplier: config.retry_multiplier,
        }
    }

    /// Create an exponential backoff instance
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Check if an error is retryable
    pub fn is_retryable(error: &ClientError) -> bool {
        match error {
            // Network errors are retryable
            ClientError::Network(_) => true,
            // Server-side errors might be transient
            ClientError::Rpc(msg) | ClientError::Directory(msg) => {
                msg.contains("500") || msg.contains("502") || msg.contains("503")
            }
            // Transaction not found might mean it is still pending
            ClientError::TransactionNotFound(_) => true,
            // Invalid response might be temporary
            ClientError::InvalidResponse(_) => true,
            // Everything else needs fresh input, not persistence
            _ => false,
        }
    }

    /// Execute a function with retry logic
    pub async fn retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut retry_ctx = RetryContext::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!("Attempt {} of {}", attempts, self.max_retries + 1);

            match operation().await {
                Ok(result) => {
                    if attempts > 1 {
                        debug!("Operation succeeded after {} attempts", attempts);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !Self::is_retryable(&error) {
                        warn!("Non-retryable error: {:?}", error);
                        return Err(error);
                    }

                    if attempts > self.max_retries {
                        warn!(
                            "Max retries ({}) exceeded. Last error: {:?}",
                            self.max_retries, error
                        );
                        return Err(ClientError::MaxRetriesExceeded(self.max_retries));
                    }

                    let delay = match backoff.next_backoff() {
                        Some(d) => d,
                        None => {
                            warn!("Backoff exhausted");
                            return Err(ClientError::MaxRetriesExceeded(self.max_retries));
                        }
                    };

                    retry_ctx.record_attempt(&error.to_string(), delay.as_millis() as u64);

                    warn!(
                        "Attempt {} failed: {:?}. Retrying in {:?}",
                        attempts, error, delay
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

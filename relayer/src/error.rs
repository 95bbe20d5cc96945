//! Relay error types

use thiserror::Error;

/// Errors raised while selecting or running a relay strategy.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No strategy is registered for the network identifier. Configuration
    /// error, never retried.
    #[error("no relay strategy registered for network {0}")]
    UnsupportedNetwork(u64),

    /// The source transaction is not final enough yet; retry later.
    #[error("relay not ready: {0}")]
    NotReady(String),

    /// The message was relayed before. `RelayStrategy::run` turns this into success.
    #[error("message already relayed: {0}")]
    AlreadyExecuted(String),

    #[error("no {contract} address known for network {network}; set it in a custom network file")]
    MissingContract { network: u64, contract: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// RPC, HTTP or decoding failure.
    #[error(transparent)]
    Chain(#[from] anyhow::Error),
}

impl RelayError {
    /// True if running the relay again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::NotReady(_) | RelayError::Chain(_))
    }
}

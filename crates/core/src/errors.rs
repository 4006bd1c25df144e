//! Error types

use thiserror::Error;

/// Configuration and startup errors
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Key file error: {0}")]
    KeyFile(String),
}

/// Price feed errors
#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("{exchange}: pair {base}-{quote} not supported")]
    PairNotSupported {
        exchange: String,
        base: String,
        quote: String,
    },

    #[error("{exchange}: request failed: {reason}")]
    RequestFailed { exchange: String, reason: String },

    #[error("{exchange}: invalid response: {reason}")]
    InvalidResponse { exchange: String, reason: String },

    #[error("{exchange}: timed out after {timeout_ms}ms")]
    Timeout { exchange: String, timeout_ms: u64 },

    #[error("Insufficient quorum for {base}-{quote}: {got} results, {required} required")]
    InsufficientQuorum {
        base: String,
        quote: String,
        got: usize,
        required: usize,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid aggregator argument: {0}")]
    InvalidArgument(String),
}

/// Execution errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Nonce too low")]
    NonceTooLow,

    #[error("Nonce too high")]
    NonceTooHigh,

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Invalid handler argument: {0}")]
    InvalidArgument(String),

    #[error("Nonce handler closed")]
    Closed,
}

impl ExecutionError {
    /// Errors that mean the local nonce drifted from the network
    pub fn is_stale_nonce(&self) -> bool {
        matches!(self, ExecutionError::NonceTooLow | ExecutionError::NonceTooHigh)
    }
}

/// Poll cycle errors
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("No price could be fetched for any of the {0} pairs")]
    NoPrices(usize),

    #[error("Notification of {pairs} price(s) failed: {source}")]
    NotifyFailed {
        pairs: usize,
        #[source]
        source: ExecutionError,
    },

    #[error("Invalid notifier argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type PriceFeedResult<T> = Result<T, PriceFeedError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;
pub type NotifierResult<T> = Result<T, NotifierError>;

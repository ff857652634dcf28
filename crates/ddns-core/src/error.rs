//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.

use crate::model::IpFamily;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Step of a record-store write transaction that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    /// Opening the transaction
    Begin,
    /// Deactivating the previously active row
    Deactivate,
    /// Inserting the new active row
    Insert,
    /// Committing
    Commit,
}

impl std::fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            TransactionStage::Begin => "failed to start transaction",
            TransactionStage::Deactivate => "failed to deactivate",
            TransactionStage::Insert => "failed to insert",
            TransactionStage::Commit => "failed to commit",
        };
        f.write_str(stage)
    }
}

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Public address could not be resolved for one family
    #[error("Resolution error ({family}): {message}")]
    Resolution {
        /// Address family that failed
        family: IpFamily,
        /// Error message
        message: String,
    },

    /// Record store read failure
    #[error("Store error: {0}")]
    Store(String),

    /// Record store write failure; the transaction was rolled back
    #[error("Transaction error: {stage}: {message}")]
    Transaction {
        /// Step that failed
        stage: TransactionStage,
        /// Underlying error message
        message: String,
    },

    /// One or more zone batches were rejected; every batch was attempted
    #[error("some records could not be updated ({failed} of {attempted} zone batches failed)")]
    AggregateSubmission {
        /// Number of batches that failed
        failed: usize,
        /// Number of batches submitted
        attempted: usize,
    },

    /// Store connection or schema setup failure
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolution error for one address family
    pub fn resolution(family: IpFamily, msg: impl Into<String>) -> Self {
        Self::Resolution {
            family,
            message: msg.into(),
        }
    }

    /// Create a store read error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a transaction error for the given stage
    pub fn transaction(stage: TransactionStage, msg: impl std::fmt::Display) -> Self {
        Self::Transaction {
            stage,
            message: msg.to_string(),
        }
    }

    /// Create an initialization error
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this is a write failure that left the store unchanged
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

//! Error types for the mining API

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining API
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Insecure keypair permissions: {0}")]
    InsecureKeypair(String),

    // Request validation errors
    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    // Eligibility errors
    #[error("Balance {balance} below quota threshold: {required} required")]
    BelowQuotaThreshold { required: f64, balance: f64 },

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    // Disbursement errors
    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    // Ledger errors
    #[error("Database error: {0}")]
    Database(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcTimeout(_) | Error::TransactionSend(_)
        )
    }

    /// Check if this error rejects the request without touching state
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidWallet(_) | Error::BelowQuotaThreshold { .. }
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Database(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

//! Error types for the resource ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invalid input (non-positive quantity, missing unit cost, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stock account not found for an item
    #[error("Stock account not found: {0}")]
    AccountNotFound(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Approval request not found
    #[error("Approval request not found: {0}")]
    RequestNotFound(String),

    /// A SALE would drive quantity on hand below zero
    #[error("Insufficient stock: {available} available")]
    InsufficientStock {
        /// Quantity on hand observed inside the atomic unit
        available: i64,
    },

    /// A debit would drive the token balance below zero
    #[error("Insufficient balance: {available} available")]
    InsufficientBalance {
        /// Balance observed inside the atomic unit
        available: i64,
    },

    /// The user already has a pending request of this kind
    #[error("Duplicate pending request for user {0}")]
    DuplicatePending(String),

    /// The request has already been reviewed
    #[error("Request already reviewed: {0}")]
    AlreadyReviewed(String),

    /// Valuation method is declared but not implemented
    #[error("Unsupported valuation method: {0}")]
    UnsupportedValuation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

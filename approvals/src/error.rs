//! Error types for the approval workflow

use thiserror::Error;

/// Result type for approval operations
pub type Result<T> = std::result::Result<T, Error>;

/// Approval workflow errors
#[derive(Error, Debug)]
pub enum Error {
    /// Pack identifier is unknown to the reward configuration
    #[error("Unknown token pack: {0}")]
    UnknownPack(String),

    /// Invalid request input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ledger error (duplicate pending, already reviewed, storage)
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),
}

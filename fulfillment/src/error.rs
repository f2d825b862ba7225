//! Error types for the fulfillment coordinator

use thiserror::Error;

/// Result type for fulfillment operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fulfillment errors
#[derive(Error, Debug)]
pub enum Error {
    /// Item does not exist in the catalog
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Item exists but has been deactivated
    #[error("Item is inactive: {0}")]
    ItemInactive(String),

    /// Ledger error (insufficient stock, invalid input, storage)
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),
}

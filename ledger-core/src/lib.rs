//! Resource Ledger Core
//!
//! Tracks mutable, scarce resources with one shared pattern, applied to two
//! domains: physical product inventory (stock accounts + movements) and a
//! virtual token currency (token accounts + transactions).
//!
//! # Architecture
//!
//! - **Account + immutable log**: every balance change appends an audit
//!   record and updates a denormalized running total in one atomic unit
//! - **Per-account locks**: concurrent request handlers serialize on the
//!   mutated account, never on a global lock
//! - **Atomic commits**: multi-record mutations go through one RocksDB
//!   `WriteBatch`
//!
//! # Invariants
//!
//! - Stock: `quantity_on_hand` equals the signed replay of the movement log
//! - Tokens: `balance` equals the sum of the transaction log
//! - No oversell: a SALE never drives quantity below zero
//! - Approval requests transition exactly once out of PENDING

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod valuation;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{
    ApprovalKind, ApprovalPayload, ApprovalRequest, ApprovalStatus, Customer, ItemId,
    MovementKind, Order, OrderStatus, StockAccount, StockMovement, TokenAccount,
    TokenTransaction, TokenTxnKind, UserId, UserPlan, ValuationMethod,
};

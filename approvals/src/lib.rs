//! Approval Workflow Engine
//!
//! Human-reviewed requests (subscription upgrades, token-pack purchases)
//! that, on approval, perform a credit-ledger or subscription-state mutation
//! as part of a single atomic step. Reward amounts come from an injected
//! configuration source, resolved at review time.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod engine;
pub mod error;

// Re-exports
pub use config::{RewardSource, StaticRewards};
pub use engine::{ApprovalEngine, Decision};
pub use error::{Error, Result};

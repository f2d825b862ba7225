//! Order Fulfillment Coordinator
//!
//! Primary consumer of the stock ledger: turns purchase requests into an
//! atomic check-and-decrement plus an order record, consults the catalog for
//! item existence, and fans out best-effort notifications after commit.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod notify;

// Re-exports
pub use catalog::{CatalogItem, CatalogProvider, InMemoryCatalog};
pub use coordinator::{FulfillmentCoordinator, FulfillmentOptions};
pub use error::{Error, Result};
pub use notify::{NoopNotifier, OrderNotifier};

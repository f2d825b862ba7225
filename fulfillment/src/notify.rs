//! Outbound order notification seam
//!
//! Notifications are strictly best-effort: they run after the atomic unit
//! commits, under a bounded timeout, and a failure can never roll back or
//! fail the order.

use async_trait::async_trait;
use ledger_core::Order;

/// Best-effort sink for placed orders (spreadsheet sync, chat ping, ...)
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Deliver a notification for a committed order
    async fn order_placed(&self, order: &Order) -> anyhow::Result<()>;
}

/// Notifier that drops everything (default for embedded use)
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl OrderNotifier for NoopNotifier {
    async fn order_placed(&self, _order: &Order) -> anyhow::Result<()> {
        Ok(())
    }
}

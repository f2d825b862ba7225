//! Order fulfillment coordinator
//!
//! Turns a purchase request into an atomic check-and-decrement against the
//! stock ledger plus an order record. Per attempt the flow is
//! `Requested -> StockChecked -> {Reserved | Rejected} -> OrderCreated`;
//! the check and the decrement both happen inside the ledger's atomic unit,
//! so concurrent buyers cannot oversell.

use crate::{
    catalog::CatalogProvider,
    error::{Error, Result},
    notify::OrderNotifier,
};
use ledger_core::{Customer, ItemId, Ledger, Order};
use std::sync::Arc;
use tokio::time::Duration;

/// Coordinator tunables
#[derive(Debug, Clone)]
pub struct FulfillmentOptions {
    /// Simulation mode: orders are recorded but stock is never consumed
    /// (demo storefronts)
    pub simulate: bool,

    /// Upper bound on one outbound notification attempt
    pub notify_timeout: Duration,
}

impl Default for FulfillmentOptions {
    fn default() -> Self {
        Self {
            simulate: false,
            notify_timeout: Duration::from_secs(5),
        }
    }
}

/// Order fulfillment coordinator
pub struct FulfillmentCoordinator {
    /// Stock ledger
    ledger: Arc<Ledger>,

    /// Item existence/active lookups
    catalog: Arc<dyn CatalogProvider>,

    /// Best-effort outbound notifications
    notifier: Arc<dyn OrderNotifier>,

    /// Tunables
    options: FulfillmentOptions,
}

impl FulfillmentCoordinator {
    /// Create new coordinator
    pub fn new(
        ledger: Arc<Ledger>,
        catalog: Arc<dyn CatalogProvider>,
        notifier: Arc<dyn OrderNotifier>,
        options: FulfillmentOptions,
    ) -> Self {
        Self {
            ledger,
            catalog,
            notifier,
            options,
        }
    }

    /// Place an order for an item
    ///
    /// For tracked items the availability check, the SALE movement, the
    /// decrement, and the order row commit as one atomic unit; an order is
    /// never recorded without a matching stock decrement, and vice versa.
    /// Untracked items have unlimited virtual supply and skip the stock path
    /// entirely. The post-commit notification is fire-and-forget.
    pub async fn place_order(
        &self,
        item_id: &ItemId,
        quantity: i64,
        customer: Customer,
    ) -> Result<Order> {
        let item = self
            .catalog
            .item(item_id)
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
        if !item.active {
            return Err(Error::ItemInactive(item_id.to_string()));
        }

        let order = Order::new(item_id.clone(), quantity, customer);

        let tracked = match self.ledger.get_stock_account(item_id) {
            Ok(account) => account.tracking_enabled,
            // No registered account behaves like tracking disabled
            Err(ledger_core::Error::AccountNotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };

        if tracked && !self.options.simulate {
            // Fresh read + check + SALE + order, all under the item's lock
            self.ledger.reserve_for_order(&order)?;
            tracing::debug!(order_id = %order.id, item_id = %item_id, quantity, "Stock reserved");
        } else {
            self.ledger.insert_order(&order)?;
            tracing::debug!(
                order_id = %order.id,
                item_id = %item_id,
                simulate = self.options.simulate,
                "Order recorded without stock effects"
            );
        }

        self.dispatch_notification(order.clone());
        Ok(order)
    }

    /// Fire-and-forget notification with a bounded timeout; failures log
    /// and drop
    fn dispatch_notification(&self, order: Order) {
        let notifier = self.notifier.clone();
        let timeout = self.options.notify_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.order_placed(&order)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(order_id = %order.id, "Order notification failed: {}", e);
                }
                Err(_) => {
                    tracing::warn!(order_id = %order.id, "Order notification timed out");
                }
            }
        });
    }
}

//! Concurrency test: N buyers racing for Q units never oversell
//!
//! Given quantity_on_hand = Q and N > Q concurrent one-unit orders, exactly
//! Q succeed, exactly Q SALE movements are recorded, and the quantity is
//! never observed negative.

use fulfillment::{
    CatalogItem, FulfillmentCoordinator, FulfillmentOptions, InMemoryCatalog, NoopNotifier,
};
use ledger_core::{Config, Customer, ItemId, Ledger, MovementKind};
use rust_decimal::Decimal;
use std::sync::Arc;

fn customer() -> Customer {
    Customer {
        name: "Ada".to_string(),
        phone: "555-0100".to_string(),
        address: "1 Main St".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_buyers_never_oversell() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let temp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp.path().to_path_buf();
    let ledger = Arc::new(Ledger::open(config).unwrap());

    let item = ItemId::new("sku-hot");
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(CatalogItem {
        id: item.clone(),
        name: "Hot item".to_string(),
        active: true,
    });

    ledger.register_item(&item, true, 5, None).unwrap();
    ledger
        .record_movement(&item, MovementKind::Purchase, 10, Some(Decimal::from(25)), None)
        .unwrap();

    let coordinator = Arc::new(FulfillmentCoordinator::new(
        ledger.clone(),
        catalog,
        Arc::new(NoopNotifier),
        FulfillmentOptions::default(),
    ));

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let coordinator = coordinator.clone();
        let item = item.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.place_order(&item, 1, customer()).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 10);

    let account = ledger.get_stock_account(&item).unwrap();
    assert_eq!(account.quantity_on_hand, 0);

    let sales = ledger
        .list_movements(&item)
        .unwrap()
        .iter()
        .filter(|m| m.kind == MovementKind::Sale)
        .count();
    assert_eq!(sales, 10);

    assert!(ledger.check_stock_reconciliation(&item).unwrap());
}

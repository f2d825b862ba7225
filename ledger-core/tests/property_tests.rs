//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify the critical invariants:
//! - Stock replay: quantity on hand == signed replay of the movement log
//! - Token replay: balance == sum of the transaction log
//! - Non-negativity: neither balance is ever observed below zero

use ledger_core::{
    Config, Error, ItemId, Ledger, MovementKind, TokenTxnKind, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One scripted stock operation
#[derive(Debug, Clone)]
enum StockOp {
    Purchase { quantity: i64, unit_cost: u32 },
    Adjustment { quantity: i64 },
    Sale { quantity: i64 },
}

fn stock_op_strategy() -> impl Strategy<Value = StockOp> {
    prop_oneof![
        (1i64..50, 1u32..10_000).prop_map(|(quantity, unit_cost)| StockOp::Purchase {
            quantity,
            unit_cost,
        }),
        (1i64..20).prop_map(|quantity| StockOp::Adjustment { quantity }),
        (1i64..60).prop_map(|quantity| StockOp::Sale { quantity }),
    ]
}

/// One scripted token operation (amounts unsigned; kind carries the sign)
#[derive(Debug, Clone)]
enum TokenOp {
    Credit { amount: i64 },
    Debit { amount: i64 },
}

fn token_op_strategy() -> impl Strategy<Value = TokenOp> {
    prop_oneof![
        (1i64..500).prop_map(|amount| TokenOp::Credit { amount }),
        (1i64..600).prop_map(|amount| TokenOp::Debit { amount }),
    ]
}

fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Ledger::open(config).unwrap(), temp_dir)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: after any sequence of movements, the running total equals
    /// the replay of the log and is never negative
    #[test]
    fn prop_stock_replay_invariant(ops in prop::collection::vec(stock_op_strategy(), 1..40)) {
        let (ledger, _temp) = create_test_ledger();
        let item = ItemId::new("sku-prop");
        ledger.register_item(&item, true, 5, None).unwrap();

        for op in ops {
            let result = match op {
                StockOp::Purchase { quantity, unit_cost } => ledger.record_movement(
                    &item,
                    MovementKind::Purchase,
                    quantity,
                    Some(Decimal::new(unit_cost as i64, 2)),
                    None,
                ),
                StockOp::Adjustment { quantity } => {
                    ledger.record_movement(&item, MovementKind::Adjustment, quantity, None, None)
                }
                StockOp::Sale { quantity } => {
                    ledger.record_movement(&item, MovementKind::Sale, quantity, None, None)
                }
            };

            // Oversized sales are rejected without touching state
            match result {
                Ok(_) => {}
                Err(Error::InsufficientStock { .. }) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }

            let account = ledger.get_stock_account(&item).unwrap();
            prop_assert!(account.quantity_on_hand >= 0);
            prop_assert!(ledger.check_stock_reconciliation(&item).unwrap());
        }
    }

    /// Property: after any sequence of credits/debits, the balance equals
    /// the sum of the transaction log and is never negative
    #[test]
    fn prop_token_replay_invariant(ops in prop::collection::vec(token_op_strategy(), 1..40)) {
        let (ledger, _temp) = create_test_ledger();
        let user = UserId::new("user-prop");

        for op in ops {
            let result = match op {
                TokenOp::Credit { amount } => ledger.credit(
                    &user,
                    TokenTxnKind::AdminCredit,
                    amount,
                    "credit",
                    HashMap::new(),
                ),
                TokenOp::Debit { amount } => ledger.debit(
                    &user,
                    TokenTxnKind::AdminDebit,
                    amount,
                    "debit",
                    HashMap::new(),
                ),
            };

            match result {
                Ok(_) => {}
                Err(Error::InsufficientBalance { .. }) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }

            let balance = ledger.get_balance(&user).unwrap();
            prop_assert!(balance >= 0);
            prop_assert!(ledger.check_token_reconciliation(&user).unwrap());
        }
    }

    /// Property: the weighted-average cost basis always lies between the
    /// lowest and highest purchase price seen so far
    #[test]
    fn prop_cost_basis_bounded_by_purchase_prices(
        purchases in prop::collection::vec((1i64..50, 1u32..10_000), 1..15)
    ) {
        let (ledger, _temp) = create_test_ledger();
        let item = ItemId::new("sku-cost");
        ledger.register_item(&item, true, 5, None).unwrap();

        let mut min_cost = Decimal::MAX;
        let mut max_cost = Decimal::MIN;

        for (quantity, unit_cost) in purchases {
            let cost = Decimal::new(unit_cost as i64, 2);
            min_cost = min_cost.min(cost);
            max_cost = max_cost.max(cost);

            ledger
                .record_movement(&item, MovementKind::Purchase, quantity, Some(cost), None)
                .unwrap();

            let account = ledger.get_stock_account(&item).unwrap();
            prop_assert!(account.cost_basis_per_unit >= min_cost);
            prop_assert!(account.cost_basis_per_unit <= max_cost);
        }
    }
}

//! Cost-basis valuation
//!
//! Only weighted-average costing is implemented. FIFO/LIFO selections are
//! rejected rather than silently treated as weighted average, so an account
//! configured for lot-based costing cannot accumulate a wrong cost basis.

use crate::{error::Result, types::ValuationMethod, Error};
use rust_decimal::Decimal;

/// Compute the cost basis after a purchase.
///
/// Weighted average: `(old_qty * old_cost + added_qty * unit_cost) /
/// (old_qty + added_qty)`, defined as zero when the combined quantity is not
/// positive. ADJUSTMENT and SALE movements never call this.
pub fn next_cost_basis(
    method: ValuationMethod,
    old_qty: i64,
    old_cost: Decimal,
    added_qty: i64,
    unit_cost: Decimal,
) -> Result<Decimal> {
    match method {
        ValuationMethod::WeightedAverage => {
            Ok(weighted_average(old_qty, old_cost, added_qty, unit_cost))
        }
        ValuationMethod::Fifo | ValuationMethod::Lifo => {
            Err(Error::UnsupportedValuation(method.to_string()))
        }
    }
}

fn weighted_average(old_qty: i64, old_cost: Decimal, added_qty: i64, unit_cost: Decimal) -> Decimal {
    let combined_qty = old_qty + added_qty;
    if combined_qty <= 0 {
        return Decimal::ZERO;
    }

    let old_value = Decimal::from(old_qty) * old_cost;
    let added_value = Decimal::from(added_qty) * unit_cost;

    (old_value + added_value) / Decimal::from(combined_qty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_average_reference_case() {
        // 10 units at 100 plus 10 units at 200 -> 150
        let cost = next_cost_basis(
            ValuationMethod::WeightedAverage,
            10,
            Decimal::from(100),
            10,
            Decimal::from(200),
        )
        .unwrap();
        assert_eq!(cost, Decimal::from(150));
    }

    #[test]
    fn test_weighted_average_from_empty() {
        let cost = next_cost_basis(
            ValuationMethod::WeightedAverage,
            0,
            Decimal::ZERO,
            4,
            Decimal::new(2550, 2), // 25.50
        )
        .unwrap();
        assert_eq!(cost, Decimal::new(2550, 2));
    }

    #[test]
    fn test_weighted_average_zero_combined_quantity() {
        let cost = next_cost_basis(
            ValuationMethod::WeightedAverage,
            0,
            Decimal::from(100),
            0,
            Decimal::from(200),
        )
        .unwrap();
        assert_eq!(cost, Decimal::ZERO);
    }

    #[test]
    fn test_fifo_rejected() {
        let result = next_cost_basis(
            ValuationMethod::Fifo,
            10,
            Decimal::from(100),
            5,
            Decimal::from(120),
        );
        assert!(matches!(result, Err(Error::UnsupportedValuation(_))));
    }

    #[test]
    fn test_lifo_rejected() {
        let result = next_cost_basis(
            ValuationMethod::Lifo,
            10,
            Decimal::from(100),
            5,
            Decimal::from(120),
        );
        assert!(matches!(result, Err(Error::UnsupportedValuation(_))));
    }
}

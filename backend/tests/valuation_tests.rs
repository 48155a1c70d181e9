//! Stock valuation and recipe costing math

use rust_decimal::Decimal;

use shared::models::{effective_quantity, extended_cost_cents};
use stockledger_backend::services::reporting::{fifo_item_value_cents, BatchValue};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn batch(quantity: &str, cost_cents: i64) -> BatchValue {
    BatchValue {
        quantity_remaining: dec(quantity),
        cost_per_unit_cents: cost_cents,
    }
}

#[test]
fn valuation_sums_batches_at_their_own_cost() {
    let batches = vec![batch("10", 100), batch("5", 200)];
    // 10 * 100 + 5 * 200
    assert_eq!(fifo_item_value_cents(&batches, dec("15"), 130), 2000);
}

#[test]
fn each_batch_value_truncates_independently() {
    // 1.5 * 99 = 148.5 -> 148 and 2.5 * 33 = 82.5 -> 82
    let batches = vec![batch("1.5", 99), batch("2.5", 33)];
    assert_eq!(fifo_item_value_cents(&batches, dec("4"), 60), 230);
}

#[test]
fn exhausted_batches_contribute_nothing() {
    let batches = vec![batch("0", 500), batch("3", 100)];
    assert_eq!(fifo_item_value_cents(&batches, dec("3"), 100), 300);
}

#[test]
fn zero_stock_values_at_zero() {
    assert_eq!(fifo_item_value_cents(&[], dec("0"), 750), 0);
}

#[test]
fn negative_stock_falls_back_to_average_cost() {
    // -4 * 150 = -600: a liability, not a batch sum
    assert_eq!(fifo_item_value_cents(&[], dec("-4"), 150), -600);
}

#[test]
fn negative_stock_ignores_any_leftover_batches() {
    // Stale batch rows must not mask the negative position
    let batches = vec![batch("1", 999)];
    assert_eq!(fifo_item_value_cents(&batches, dec("-2"), 100), -200);
}

#[test]
fn negative_value_truncates_toward_zero() {
    // -1.5 * 99 = -148.5 -> -148
    assert_eq!(fifo_item_value_cents(&[], dec("-1.5"), 99), -148);
}

#[test]
fn waste_grosses_up_the_required_quantity() {
    // 100 required, 10% waste, 3 ordered -> 330
    assert_eq!(effective_quantity(dec("100"), dec("3"), dec("10")), dec("330"));
}

#[test]
fn zero_waste_leaves_the_quantity_alone() {
    assert_eq!(effective_quantity(dec("18"), dec("2"), dec("0")), dec("36"));
}

#[test]
fn extended_cost_of_zero_quantity_is_zero() {
    assert_eq!(extended_cost_cents(dec("0"), 12345), 0);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn batches() -> impl Strategy<Value = Vec<BatchValue>> {
        prop::collection::vec((0i64..1_000_000, 0i64..100_000), 0..10).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(qty, cost)| BatchValue {
                    quantity_remaining: Decimal::new(qty, 4),
                    cost_per_unit_cents: cost,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn nonnegative_stock_never_values_negative(bs in batches(), qty in 0i64..1_000_000) {
            let value = fifo_item_value_cents(&bs, Decimal::new(qty, 4), 100);
            prop_assert!(value >= 0);
        }

        #[test]
        fn value_is_bounded_by_total_quantity_at_max_cost(bs in batches()) {
            let total: Decimal = bs.iter().map(|b| b.quantity_remaining).sum();
            let max_cost = bs.iter().map(|b| b.cost_per_unit_cents).max().unwrap_or(0);
            let value = fifo_item_value_cents(&bs, total, 100);
            let ceiling = extended_cost_cents(total, max_cost);
            prop_assert!(value <= ceiling + bs.len() as i64);
        }

        #[test]
        fn negative_position_matches_average_cost_exactly(qty in 1i64..1_000_000, avg in 0i64..100_000) {
            let negative = -Decimal::new(qty, 4);
            let value = fifo_item_value_cents(&[], negative, avg);
            prop_assert_eq!(value, extended_cost_cents(negative, avg));
        }

        #[test]
        fn waste_never_shrinks_the_requirement(
            required in 1i64..1_000_000,
            ordered in 1i64..1_000,
            waste in 0i64..10_000,
        ) {
            let required = Decimal::new(required, 4);
            let ordered = Decimal::new(ordered, 0);
            let waste = Decimal::new(waste, 2);
            let effective = effective_quantity(required, ordered, waste);
            prop_assert!(effective >= required * ordered);
        }
    }
}

//! FIFO deduction planning

use rust_decimal::Decimal;
use uuid::Uuid;

use stockledger_backend::services::ledger::{plan_deduction, BatchLot};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn lot(quantity: &str, cost_cents: i64) -> BatchLot {
    BatchLot {
        id: Uuid::new_v4(),
        quantity_remaining: dec(quantity),
        cost_per_unit_cents: cost_cents,
    }
}

#[test]
fn deduction_spans_batches_oldest_first() {
    let batches = vec![lot("10", 100), lot("20", 120)];
    let first_id = batches[0].id;
    let second_id = batches[1].id;

    let plan = plan_deduction(&batches, dec("15"), 110, dec("30"));

    assert_eq!(plan.len(), 2);

    assert_eq!(plan[0].batch_id, Some(first_id));
    assert_eq!(plan[0].quantity, dec("10"));
    assert_eq!(plan[0].unit_cost_cents, 100);
    assert_eq!(plan[0].balance_after, dec("20"));

    assert_eq!(plan[1].batch_id, Some(second_id));
    assert_eq!(plan[1].quantity, dec("5"));
    assert_eq!(plan[1].unit_cost_cents, 120);
    assert_eq!(plan[1].balance_after, dec("15"));
}

#[test]
fn deduction_within_one_batch_leaves_the_rest_untouched() {
    let batches = vec![lot("10", 100), lot("20", 120)];
    let plan = plan_deduction(&batches, dec("4"), 110, dec("30"));

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].quantity, dec("4"));
    assert_eq!(plan[0].unit_cost_cents, 100);
    assert_eq!(plan[0].balance_after, dec("26"));
}

#[test]
fn shortfall_produces_one_unbacked_line_at_average_cost() {
    let batches = vec![lot("5", 100)];
    let plan = plan_deduction(&batches, dec("8"), 110, dec("5"));

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].quantity, dec("5"));
    assert_eq!(plan[0].unit_cost_cents, 100);
    assert_eq!(plan[0].balance_after, dec("0"));

    assert_eq!(plan[1].batch_id, None);
    assert_eq!(plan[1].quantity, dec("3"));
    assert_eq!(plan[1].unit_cost_cents, 110);
    assert_eq!(plan[1].balance_after, dec("-3"));
}

#[test]
fn no_batches_means_fully_unbacked() {
    let plan = plan_deduction(&[], dec("6"), 250, dec("0"));

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].batch_id, None);
    assert_eq!(plan[0].quantity, dec("6"));
    assert_eq!(plan[0].unit_cost_cents, 250);
    assert_eq!(plan[0].balance_after, dec("-6"));
}

#[test]
fn already_negative_balance_keeps_falling() {
    let plan = plan_deduction(&[], dec("2"), 75, dec("-1.5"));

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].balance_after, dec("-3.5"));
}

#[test]
fn empty_batches_are_skipped() {
    let batches = vec![lot("0", 100), lot("10", 120)];
    let open_id = batches[1].id;

    let plan = plan_deduction(&batches, dec("3"), 110, dec("10"));

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].batch_id, Some(open_id));
    assert_eq!(plan[0].unit_cost_cents, 120);
}

#[test]
fn exact_batch_boundary_has_no_unbacked_line() {
    let batches = vec![lot("10", 100), lot("20", 120)];
    let plan = plan_deduction(&batches, dec("30"), 110, dec("30"));

    assert_eq!(plan.len(), 2);
    assert!(plan.iter().all(|line| line.batch_id.is_some()));
    assert_eq!(plan[1].balance_after, dec("0"));
}

#[test]
fn fractional_quantities_split_precisely() {
    let batches = vec![lot("0.2500", 400), lot("1.0000", 380)];
    let plan = plan_deduction(&batches, dec("0.7500"), 390, dec("1.25"));

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].quantity, dec("0.2500"));
    assert_eq!(plan[1].quantity, dec("0.5000"));
    assert_eq!(plan[1].balance_after, dec("0.5"));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn quantity() -> impl Strategy<Value = Decimal> {
        (1i64..1_000_000).prop_map(|n| Decimal::new(n, 4))
    }

    fn lots() -> impl Strategy<Value = Vec<BatchLot>> {
        prop::collection::vec((0i64..500_000, 0i64..100_000), 0..8).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(qty, cost)| BatchLot {
                    id: Uuid::new_v4(),
                    quantity_remaining: Decimal::new(qty, 4),
                    cost_per_unit_cents: cost,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn plan_always_covers_the_requested_quantity(batches in lots(), q in quantity()) {
            let plan = plan_deduction(&batches, q, 100, Decimal::ZERO);
            let taken: Decimal = plan.iter().map(|line| line.quantity).sum();
            prop_assert_eq!(taken, q);
        }

        #[test]
        fn balances_strictly_decrease(batches in lots(), q in quantity()) {
            let start = Decimal::new(1_000_000, 4);
            let plan = plan_deduction(&batches, q, 100, start);
            let mut previous = start;
            for line in &plan {
                prop_assert!(line.balance_after < previous);
                previous = line.balance_after;
            }
            prop_assert_eq!(previous, start - q);
        }

        #[test]
        fn at_most_one_unbacked_line_and_it_is_last(batches in lots(), q in quantity()) {
            let plan = plan_deduction(&batches, q, 100, Decimal::ZERO);
            let unbacked = plan.iter().filter(|line| line.batch_id.is_none()).count();
            prop_assert!(unbacked <= 1);
            if unbacked == 1 {
                prop_assert!(plan.last().unwrap().batch_id.is_none());
            }
        }

        #[test]
        fn no_line_takes_more_than_its_batch_holds(batches in lots(), q in quantity()) {
            let plan = plan_deduction(&batches, q, 100, Decimal::ZERO);
            for line in plan.iter().filter(|line| line.batch_id.is_some()) {
                let batch = batches.iter().find(|b| Some(b.id) == line.batch_id).unwrap();
                prop_assert!(line.quantity <= batch.quantity_remaining);
                prop_assert!(line.quantity > Decimal::ZERO);
                prop_assert_eq!(line.unit_cost_cents, batch.cost_per_unit_cents);
            }
        }

        #[test]
        fn batches_are_consumed_in_order(batches in lots(), q in quantity()) {
            let plan = plan_deduction(&batches, q, 100, Decimal::ZERO);
            let order: Vec<Uuid> = batches.iter().map(|b| b.id).collect();
            let mut last_index = 0usize;
            for line in plan.iter().filter_map(|line| line.batch_id) {
                let index = order.iter().position(|id| *id == line).unwrap();
                prop_assert!(index >= last_index);
                last_index = index;
            }
        }
    }
}

//! Purchase-order lifecycle and costing rules

use chrono::NaiveDate;
use rust_decimal::Decimal;

use shared::models::{
    extended_cost_cents, format_order_number, next_order_sequence, weighted_average_cost_cents,
    PurchaseOrderStatus,
};

use PurchaseOrderStatus::*;

const ALL_STATUSES: [PurchaseOrderStatus; 6] = [
    Draft,
    Submitted,
    Approved,
    PartiallyReceived,
    Received,
    Cancelled,
];

#[test]
fn transition_table_is_exactly_the_lifecycle() {
    let legal: &[(PurchaseOrderStatus, PurchaseOrderStatus)] = &[
        (Draft, Submitted),
        (Draft, Cancelled),
        (Submitted, Approved),
        (Submitted, Cancelled),
        (Approved, PartiallyReceived),
        (Approved, Received),
        (Approved, Cancelled),
        (PartiallyReceived, Received),
        (PartiallyReceived, Cancelled),
    ];

    for from in ALL_STATUSES {
        for to in ALL_STATUSES {
            let expected = legal.contains(&(from, to));
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "{} -> {} should be {}",
                from,
                to,
                if expected { "legal" } else { "illegal" }
            );
        }
    }
}

#[test]
fn no_status_transitions_to_itself() {
    for status in ALL_STATUSES {
        assert!(!status.can_transition_to(status));
    }
}

#[test]
fn terminal_states_go_nowhere() {
    assert!(Received.is_terminal());
    assert!(Cancelled.is_terminal());
    for status in [Draft, Submitted, Approved, PartiallyReceived] {
        assert!(!status.is_terminal());
    }
}

#[test]
fn receiving_requires_approval() {
    assert!(Approved.can_receive());
    assert!(PartiallyReceived.can_receive());
    for status in [Draft, Submitted, Received, Cancelled] {
        assert!(!status.can_receive());
    }
}

#[test]
fn only_drafts_are_editable() {
    assert!(Draft.can_edit());
    for status in [Submitted, Approved, PartiallyReceived, Received, Cancelled] {
        assert!(!status.can_edit());
    }
}

#[test]
fn order_numbers_embed_date_and_zero_padded_sequence() {
    let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
    assert_eq!(format_order_number(date, 1), "PO-20260830-0001");
    assert_eq!(format_order_number(date, 42), "PO-20260830-0042");
    assert_eq!(format_order_number(date, 12345), "PO-20260830-12345");
}

#[test]
fn sequence_continues_from_the_latest_number() {
    assert_eq!(next_order_sequence(None), 1);
    assert_eq!(next_order_sequence(Some("PO-20260830-0007")), 8);
    assert_eq!(next_order_sequence(Some("PO-20260830-0999")), 1000);
}

#[test]
fn sequence_survives_crossing_four_digits() {
    let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
    assert_eq!(next_order_sequence(Some("PO-20260830-9999")), 10000);
    assert_eq!(format_order_number(date, 10000), "PO-20260830-10000");
    assert_eq!(next_order_sequence(Some("PO-20260830-10000")), 10001);
}

#[test]
fn unparseable_number_restarts_the_sequence() {
    assert_eq!(next_order_sequence(Some("PO-20260830-????")), 1);
    assert_eq!(next_order_sequence(Some("garbage")), 1);
    assert_eq!(next_order_sequence(Some("")), 1);
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[test]
fn weighted_average_blends_old_and_new_stock() {
    // 10 on hand at 100, receive 10 at 200 -> 150
    assert_eq!(weighted_average_cost_cents(dec("10"), 100, dec("10"), 200), 150);
}

#[test]
fn weighted_average_truncates_toward_zero() {
    // (1*100 + 2*200) / 3 = 166.66.. -> 166
    assert_eq!(weighted_average_cost_cents(dec("1"), 100, dec("2"), 200), 166);
}

#[test]
fn first_receipt_sets_the_average_outright() {
    assert_eq!(weighted_average_cost_cents(dec("0"), 0, dec("5"), 320), 320);
}

#[test]
fn receipt_into_negative_stock_keeps_old_average_when_still_nonpositive() {
    // -10 on hand, receive 4: total is still negative, average unchanged
    assert_eq!(weighted_average_cost_cents(dec("-10"), 100, dec("4"), 500), 100);
}

#[test]
fn line_totals_truncate_fractional_cents() {
    assert_eq!(extended_cost_cents(dec("2.5"), 199), 497);
    assert_eq!(extended_cost_cents(dec("0.3333"), 100), 33);
}

mod receipt_validation {
    use super::dec;
    use chrono::Utc;
    use uuid::Uuid;

    use stockledger_backend::services::purchase_order::{
        validate_receipt_request, PurchaseOrderLine, ReceiveLineInput,
    };

    fn line(ordered: &str, received: &str) -> PurchaseOrderLine {
        PurchaseOrderLine {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            inventory_item_id: Uuid::new_v4(),
            quantity_ordered: dec(ordered),
            quantity_received: dec(received),
            unit: "kilogram".to_string(),
            unit_cost_cents: 500,
            line_total_cents: 5000,
            created_at: Utc::now(),
        }
    }

    fn entry(line_id: Uuid, quantity: &str) -> ReceiveLineInput {
        ReceiveLineInput {
            line_id,
            quantity_received: dec(quantity),
            cost_per_unit_cents: None,
            batch_number: None,
        }
    }

    #[test]
    fn entry_within_the_remainder_passes() {
        let lines = vec![line("10", "0")];
        let inputs = vec![entry(lines[0].id, "8")];
        assert!(validate_receipt_request(&lines, &inputs).is_ok());
    }

    #[test]
    fn entry_beyond_the_remainder_is_rejected() {
        let lines = vec![line("10", "0")];
        let inputs = vec![entry(lines[0].id, "11")];
        assert!(validate_receipt_request(&lines, &inputs).is_err());
    }

    #[test]
    fn earlier_partial_receipts_count_against_the_remainder() {
        let lines = vec![line("10", "7")];
        assert!(validate_receipt_request(&lines, &[entry(lines[0].id, "3")]).is_ok());
        assert!(validate_receipt_request(&lines, &[entry(lines[0].id, "4")]).is_err());
    }

    #[test]
    fn split_entries_for_one_line_are_judged_by_their_sum() {
        // Each entry alone fits the remainder, together they exceed it
        let lines = vec![line("10", "0")];
        let inputs = vec![entry(lines[0].id, "8"), entry(lines[0].id, "8")];
        assert!(validate_receipt_request(&lines, &inputs).is_err());
    }

    #[test]
    fn split_entries_within_the_remainder_pass() {
        let lines = vec![line("10", "0")];
        let inputs = vec![entry(lines[0].id, "5"), entry(lines[0].id, "5")];
        assert!(validate_receipt_request(&lines, &inputs).is_ok());
    }

    #[test]
    fn unknown_line_is_rejected() {
        let lines = vec![line("10", "0")];
        let inputs = vec![entry(Uuid::new_v4(), "1")];
        assert!(validate_receipt_request(&lines, &inputs).is_err());
    }

    #[test]
    fn entries_for_different_lines_do_not_interfere() {
        let lines = vec![line("10", "0"), line("4", "0")];
        let inputs = vec![entry(lines[0].id, "10"), entry(lines[1].id, "4")];
        assert!(validate_receipt_request(&lines, &inputs).is_ok());
    }
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn quantity() -> impl Strategy<Value = Decimal> {
        (1i64..1_000_000).prop_map(|n| Decimal::new(n, 4))
    }

    proptest! {
        #[test]
        fn average_stays_between_the_two_costs(
            old_qty in quantity(),
            new_qty in quantity(),
            old_cost in 0i64..1_000_000,
            new_cost in 0i64..1_000_000,
        ) {
            let average = weighted_average_cost_cents(old_qty, old_cost, new_qty, new_cost);
            prop_assert!(average >= old_cost.min(new_cost));
            prop_assert!(average <= old_cost.max(new_cost));
        }

        #[test]
        fn extreme_weights_pull_the_average_to_the_heavy_side(
            cost_a in 0i64..100_000,
            cost_b in 0i64..100_000,
        ) {
            let heavy = Decimal::new(1_000_000, 0);
            let light = Decimal::new(1, 4);
            let average = weighted_average_cost_cents(heavy, cost_a, light, cost_b);
            // The light side moves the average by less than one cent
            prop_assert!((average - cost_a).abs() <= 1);
        }

        #[test]
        fn sequence_parsing_round_trips(seq in 1u32..9_999) {
            let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
            let number = format_order_number(date, seq);
            prop_assert_eq!(next_order_sequence(Some(&number)), seq + 1);
        }
    }
}

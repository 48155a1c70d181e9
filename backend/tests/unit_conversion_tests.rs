//! Unit conversion behavior

use rust_decimal::Decimal;
use shared::units::{
    convert_cost_per_unit_cents, convert_units, truncate_cents, UnitClass, UnitOfMeasure,
};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[test]
fn pound_to_gram_uses_exact_factor() {
    let result = convert_units(Decimal::ONE, UnitOfMeasure::Pound, UnitOfMeasure::Gram).unwrap();
    assert_eq!(result, dec("453.592"));
}

#[test]
fn ounce_to_gram_uses_exact_factor() {
    let result = convert_units(Decimal::ONE, UnitOfMeasure::Ounce, UnitOfMeasure::Gram).unwrap();
    assert_eq!(result, dec("28.3495"));
}

#[test]
fn gallon_to_milliliter_uses_exact_factor() {
    let result =
        convert_units(Decimal::ONE, UnitOfMeasure::Gallon, UnitOfMeasure::Milliliter).unwrap();
    assert_eq!(result, dec("3785.41"));
}

#[test]
fn kilogram_to_pound() {
    let grams = convert_units(dec("2"), UnitOfMeasure::Kilogram, UnitOfMeasure::Pound).unwrap();
    // 2000 / 453.592, irrational-looking but deterministic
    assert_eq!(grams, dec("2000") / dec("453.592"));
}

#[test]
fn count_only_converts_to_itself() {
    assert_eq!(
        convert_units(dec("7"), UnitOfMeasure::Piece, UnitOfMeasure::Piece),
        Ok(dec("7"))
    );
    assert!(convert_units(dec("7"), UnitOfMeasure::Piece, UnitOfMeasure::Gram).is_err());
    assert!(convert_units(dec("7"), UnitOfMeasure::Piece, UnitOfMeasure::Liter).is_err());
}

#[test]
fn weight_to_volume_is_always_an_error() {
    for from in [
        UnitOfMeasure::Gram,
        UnitOfMeasure::Kilogram,
        UnitOfMeasure::Ounce,
        UnitOfMeasure::Pound,
    ] {
        for to in [
            UnitOfMeasure::Milliliter,
            UnitOfMeasure::Liter,
            UnitOfMeasure::FluidOunce,
            UnitOfMeasure::Cup,
            UnitOfMeasure::Gallon,
        ] {
            assert!(convert_units(Decimal::ONE, from, to).is_err());
            assert!(convert_units(Decimal::ONE, to, from).is_err());
        }
    }
}

#[test]
fn cost_per_kilogram_becomes_cost_per_gram() {
    // $25.00 per kilogram is 2.5 cents per gram, truncated to 2
    let result =
        convert_cost_per_unit_cents(2500, UnitOfMeasure::Kilogram, UnitOfMeasure::Gram).unwrap();
    assert_eq!(result, 2);
}

#[test]
fn cost_per_gram_becomes_cost_per_kilogram() {
    let result =
        convert_cost_per_unit_cents(3, UnitOfMeasure::Gram, UnitOfMeasure::Kilogram).unwrap();
    assert_eq!(result, 3000);
}

#[test]
fn cost_conversion_rejects_incompatible_units() {
    assert!(convert_cost_per_unit_cents(100, UnitOfMeasure::Gram, UnitOfMeasure::Liter).is_err());
}

#[test]
fn truncation_goes_toward_zero() {
    assert_eq!(truncate_cents(dec("10.99")), 10);
    assert_eq!(truncate_cents(dec("-10.99")), -10);
    assert_eq!(truncate_cents(dec("0.0001")), 0);
}

#[test]
fn every_unit_has_a_stable_storage_string() {
    for unit in UnitOfMeasure::ALL {
        assert_eq!(UnitOfMeasure::from_str(unit.as_str()), Some(unit));
    }
    assert_eq!(UnitOfMeasure::from_str("furlong"), None);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn quantity() -> impl Strategy<Value = Decimal> {
        (1i64..100_000_000).prop_map(|n| Decimal::new(n, 4))
    }

    fn weight_unit() -> impl Strategy<Value = UnitOfMeasure> {
        prop_oneof![
            Just(UnitOfMeasure::Gram),
            Just(UnitOfMeasure::Kilogram),
            Just(UnitOfMeasure::Ounce),
            Just(UnitOfMeasure::Pound),
        ]
    }

    fn volume_unit() -> impl Strategy<Value = UnitOfMeasure> {
        prop_oneof![
            Just(UnitOfMeasure::Milliliter),
            Just(UnitOfMeasure::Liter),
            Just(UnitOfMeasure::FluidOunce),
            Just(UnitOfMeasure::Cup),
            Just(UnitOfMeasure::Gallon),
        ]
    }

    proptest! {
        #[test]
        fn weight_round_trip_is_nearly_exact(q in quantity(), from in weight_unit(), to in weight_unit()) {
            let there = convert_units(q, from, to).unwrap();
            let back = convert_units(there, to, from).unwrap();
            let tolerance = Decimal::new(1, 8);
            prop_assert!((back - q).abs() <= tolerance, "{} -> {} -> {}", q, there, back);
        }

        #[test]
        fn volume_round_trip_is_nearly_exact(q in quantity(), from in volume_unit(), to in volume_unit()) {
            let there = convert_units(q, from, to).unwrap();
            let back = convert_units(there, to, from).unwrap();
            let tolerance = Decimal::new(1, 8);
            prop_assert!((back - q).abs() <= tolerance);
        }

        #[test]
        fn same_class_conversion_never_fails(q in quantity(), from in weight_unit(), to in weight_unit()) {
            prop_assert!(convert_units(q, from, to).is_ok());
            prop_assert_eq!(from.class(), UnitClass::Weight);
            prop_assert_eq!(to.class(), UnitClass::Weight);
        }

        #[test]
        fn conversion_preserves_sign_and_positivity(q in quantity(), from in weight_unit(), to in weight_unit()) {
            let converted = convert_units(q, from, to).unwrap();
            prop_assert!(converted > Decimal::ZERO);
        }
    }
}

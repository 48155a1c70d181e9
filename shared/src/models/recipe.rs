//! Recipe (bill of materials) math

use rust_decimal::Decimal;

/// Quantity of an ingredient consumed for a number of product units sold,
/// with the waste percentage applied multiplicatively.
///
/// `quantity_required * ordered_quantity * (1 + waste_percentage / 100)`
pub fn effective_quantity(
    quantity_required: Decimal,
    ordered_quantity: Decimal,
    waste_percentage: Decimal,
) -> Decimal {
    let waste_multiplier = Decimal::ONE + waste_percentage / Decimal::ONE_HUNDRED;
    quantity_required * ordered_quantity * waste_multiplier
}

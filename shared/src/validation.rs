//! Validation helpers for ledger inputs
//!
//! Custom validators used by the backend's request payloads via the
//! `validator` derive.

use rust_decimal::Decimal;
use validator::ValidationError;

/// Physical quantities supplied by callers must be strictly positive; the
/// ledger itself decides the sign of the recorded movement.
pub fn validate_positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity <= Decimal::ZERO {
        return Err(ValidationError::new("quantity_not_positive"));
    }
    Ok(())
}

/// Waste percentage is a percentage of the required quantity, 0 to 100.
pub fn validate_waste_percentage(percentage: &Decimal) -> Result<(), ValidationError> {
    if *percentage < Decimal::ZERO || *percentage > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("waste_percentage_out_of_range"));
    }
    Ok(())
}

/// Quantities stored at scale 4; reject inputs that would silently truncate.
pub fn validate_quantity_scale(quantity: &Decimal) -> Result<(), ValidationError> {
    if quantity.scale() > 4 && quantity.round_dp(4) != *quantity {
        return Err(ValidationError::new("quantity_scale_too_fine"));
    }
    Ok(())
}

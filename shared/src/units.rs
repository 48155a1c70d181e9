//! Units of measure and quantity conversion
//!
//! Every unit belongs to exactly one class (count, weight, or volume) and
//! carries a fixed factor to that class's base unit: gram for weight,
//! milliliter for volume, the unit itself for count. Conversions across
//! classes are always an error, never a silent coercion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard units of measure supported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    // Count
    Piece,
    // Weight (base: gram)
    Gram,
    Kilogram,
    Ounce,
    Pound,
    // Volume (base: milliliter)
    Milliliter,
    Liter,
    FluidOunce,
    Cup,
    Gallon,
}

/// The dimension a unit measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitClass {
    Count,
    Weight,
    Volume,
}

impl UnitOfMeasure {
    pub const ALL: [UnitOfMeasure; 10] = [
        UnitOfMeasure::Piece,
        UnitOfMeasure::Gram,
        UnitOfMeasure::Kilogram,
        UnitOfMeasure::Ounce,
        UnitOfMeasure::Pound,
        UnitOfMeasure::Milliliter,
        UnitOfMeasure::Liter,
        UnitOfMeasure::FluidOunce,
        UnitOfMeasure::Cup,
        UnitOfMeasure::Gallon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Piece => "piece",
            UnitOfMeasure::Gram => "gram",
            UnitOfMeasure::Kilogram => "kilogram",
            UnitOfMeasure::Ounce => "ounce",
            UnitOfMeasure::Pound => "pound",
            UnitOfMeasure::Milliliter => "milliliter",
            UnitOfMeasure::Liter => "liter",
            UnitOfMeasure::FluidOunce => "fluid_ounce",
            UnitOfMeasure::Cup => "cup",
            UnitOfMeasure::Gallon => "gallon",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "piece" => Some(UnitOfMeasure::Piece),
            "gram" => Some(UnitOfMeasure::Gram),
            "kilogram" => Some(UnitOfMeasure::Kilogram),
            "ounce" => Some(UnitOfMeasure::Ounce),
            "pound" => Some(UnitOfMeasure::Pound),
            "milliliter" => Some(UnitOfMeasure::Milliliter),
            "liter" => Some(UnitOfMeasure::Liter),
            "fluid_ounce" => Some(UnitOfMeasure::FluidOunce),
            "cup" => Some(UnitOfMeasure::Cup),
            "gallon" => Some(UnitOfMeasure::Gallon),
            _ => None,
        }
    }

    /// The class (dimension) this unit belongs to
    pub fn class(&self) -> UnitClass {
        match self {
            UnitOfMeasure::Piece => UnitClass::Count,
            UnitOfMeasure::Gram
            | UnitOfMeasure::Kilogram
            | UnitOfMeasure::Ounce
            | UnitOfMeasure::Pound => UnitClass::Weight,
            UnitOfMeasure::Milliliter
            | UnitOfMeasure::Liter
            | UnitOfMeasure::FluidOunce
            | UnitOfMeasure::Cup
            | UnitOfMeasure::Gallon => UnitClass::Volume,
        }
    }

    /// Multiplicative factor to the class base unit
    pub fn factor_to_base(&self) -> Decimal {
        match self {
            UnitOfMeasure::Piece => Decimal::ONE,
            UnitOfMeasure::Gram => Decimal::ONE,
            UnitOfMeasure::Kilogram => Decimal::new(1000, 0),
            UnitOfMeasure::Ounce => Decimal::new(283_495, 4),
            UnitOfMeasure::Pound => Decimal::new(453_592, 3),
            UnitOfMeasure::Milliliter => Decimal::ONE,
            UnitOfMeasure::Liter => Decimal::new(1000, 0),
            UnitOfMeasure::FluidOunce => Decimal::new(295_735, 4),
            UnitOfMeasure::Cup => Decimal::new(236_588, 3),
            UnitOfMeasure::Gallon => Decimal::new(378_541, 2),
        }
    }
}

impl std::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for UnitClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitClass::Count => f.write_str("count"),
            UnitClass::Weight => f.write_str("weight"),
            UnitClass::Volume => f.write_str("volume"),
        }
    }
}

/// Conversion failure between incompatible unit classes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitConversionError {
    #[error("cannot convert between {from_class} ({from}) and {to_class} ({to})")]
    IncompatibleUnits {
        from: UnitOfMeasure,
        to: UnitOfMeasure,
        from_class: UnitClass,
        to_class: UnitClass,
    },
}

/// Convert a quantity from one unit to another.
///
/// Identical units return the quantity unchanged so repeated conversion
/// introduces no rounding drift. Incompatible classes are an error.
pub fn convert_units(
    quantity: Decimal,
    from: UnitOfMeasure,
    to: UnitOfMeasure,
) -> Result<Decimal, UnitConversionError> {
    if from == to {
        return Ok(quantity);
    }

    if from.class() != to.class() {
        return Err(UnitConversionError::IncompatibleUnits {
            from,
            to,
            from_class: from.class(),
            to_class: to.class(),
        });
    }

    let base_quantity = quantity * from.factor_to_base();
    Ok(base_quantity / to.factor_to_base())
}

/// Convert a per-unit cost in cents from one unit to another.
///
/// Cost-per-unit moves inversely to quantity: a cost per kilogram divided by
/// 1000 is the cost per gram. The result is truncated to whole cents.
pub fn convert_cost_per_unit_cents(
    cost_cents: i64,
    from: UnitOfMeasure,
    to: UnitOfMeasure,
) -> Result<i64, UnitConversionError> {
    if from == to {
        return Ok(cost_cents);
    }

    let factor = convert_units(Decimal::ONE, from, to)?;
    let converted = Decimal::from(cost_cents) / factor;
    Ok(truncate_cents(converted))
}

/// Truncate a decimal money amount toward zero into integer cents.
pub fn truncate_cents(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or_else(|| {
        if value.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kilogram_to_gram() {
        let result = convert_units(Decimal::ONE, UnitOfMeasure::Kilogram, UnitOfMeasure::Gram);
        assert_eq!(result, Ok(Decimal::new(1000, 0)));
    }

    #[test]
    fn weight_to_volume_is_rejected() {
        let result = convert_units(Decimal::ONE, UnitOfMeasure::Gram, UnitOfMeasure::Liter);
        assert!(result.is_err());
    }

    #[test]
    fn identity_conversion_is_exact() {
        let quantity = Decimal::new(12_345, 4);
        let result = convert_units(quantity, UnitOfMeasure::Cup, UnitOfMeasure::Cup);
        assert_eq!(result, Ok(quantity));
    }

    #[test]
    fn cost_per_kilogram_to_cost_per_gram() {
        let result =
            convert_cost_per_unit_cents(1000, UnitOfMeasure::Kilogram, UnitOfMeasure::Gram);
        assert_eq!(result, Ok(1));
    }
}

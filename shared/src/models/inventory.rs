//! Inventory movement types and costing math

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::units::truncate_cents;

/// Kinds of stock movement recorded in the transaction ledger.
///
/// The transfer variants are reserved for multi-location support and are not
/// yet produced by any operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Goods received from a supplier
    Purchase,
    /// Automatic deduction when an order is completed (COGS)
    Sale,
    /// Manual positive adjustment
    AdjustmentAdd,
    /// Manual negative adjustment
    AdjustmentSubtract,
    /// Spoilage, breakage, theft
    Waste,
    TransferIn,
    TransferOut,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Sale => "sale",
            TransactionType::AdjustmentAdd => "adjustment_add",
            TransactionType::AdjustmentSubtract => "adjustment_subtract",
            TransactionType::Waste => "waste",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::TransferOut => "transfer_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(TransactionType::Purchase),
            "sale" => Some(TransactionType::Sale),
            "adjustment_add" => Some(TransactionType::AdjustmentAdd),
            "adjustment_subtract" => Some(TransactionType::AdjustmentSubtract),
            "waste" => Some(TransactionType::Waste),
            "transfer_in" => Some(TransactionType::TransferIn),
            "transfer_out" => Some(TransactionType::TransferOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common inventory categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    #[default]
    Ingredients,
    Beverages,
    Packaging,
    Cleaning,
    Equipment,
    Other,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Ingredients => "ingredients",
            ItemCategory::Beverages => "beverages",
            ItemCategory::Packaging => "packaging",
            ItemCategory::Cleaning => "cleaning",
            ItemCategory::Equipment => "equipment",
            ItemCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ingredients" => Some(ItemCategory::Ingredients),
            "beverages" => Some(ItemCategory::Beverages),
            "packaging" => Some(ItemCategory::Packaging),
            "cleaning" => Some(ItemCategory::Cleaning),
            "equipment" => Some(ItemCategory::Equipment),
            "other" => Some(ItemCategory::Other),
            _ => None,
        }
    }
}

/// Extended cost of a quantity at a per-unit price, truncated to whole cents.
pub fn extended_cost_cents(quantity: Decimal, unit_cost_cents: i64) -> i64 {
    truncate_cents(quantity * Decimal::from(unit_cost_cents))
}

/// Recompute a weighted-average cost after receiving stock.
///
/// `(old_qty * old_avg + received_qty * received_cost) / (old_qty + received_qty)`,
/// truncated to whole cents. When the resulting total quantity is zero or
/// negative the previous average is kept unchanged.
pub fn weighted_average_cost_cents(
    old_quantity: Decimal,
    old_average_cents: i64,
    received_quantity: Decimal,
    received_cost_cents: i64,
) -> i64 {
    let new_quantity = old_quantity + received_quantity;
    if new_quantity <= Decimal::ZERO {
        return old_average_cents;
    }

    let old_value = old_quantity * Decimal::from(old_average_cents);
    let received_value = received_quantity * Decimal::from(received_cost_cents);
    truncate_cents((old_value + received_value) / new_quantity)
}

//! Business logic services for the StockLedger backend

pub mod item;
pub mod ledger;
pub mod purchase_order;
pub mod recipe;
pub mod reporting;
pub mod supplier;

pub use item::ItemService;
pub use ledger::LedgerService;
pub use purchase_order::PurchaseOrderService;
pub use recipe::RecipeService;
pub use reporting::ReportingService;
pub use supplier::SupplierService;

use shared::models::PurchaseOrderStatus;
use shared::units::UnitOfMeasure;

use crate::error::{AppError, AppResult};

/// Decode a unit of measure stored as text. Failure means the row predates
/// the current enumeration and is treated as data corruption.
pub(crate) fn parse_unit(raw: &str) -> AppResult<UnitOfMeasure> {
    UnitOfMeasure::from_str(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown unit of measure in storage: {raw}")))
}

/// Decode a purchase-order status stored as text.
pub(crate) fn parse_status(raw: &str) -> AppResult<PurchaseOrderStatus> {
    PurchaseOrderStatus::from_str(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown purchase order status in storage: {raw}")))
}

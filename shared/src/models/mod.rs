//! Domain models for the StockLedger platform

mod inventory;
mod purchase_order;
mod recipe;

pub use inventory::*;
pub use purchase_order::*;
pub use recipe::*;

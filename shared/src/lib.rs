//! Shared domain types for the StockLedger platform
//!
//! This crate contains the pure domain layer shared between the ledger
//! backend and its consumers: units of measure with conversion rules,
//! transaction and purchase-order enumerations, and the costing math that
//! does not touch storage.

pub mod models;
pub mod types;
pub mod units;
pub mod validation;

pub use models::*;
pub use types::*;
pub use units::*;
pub use validation::*;

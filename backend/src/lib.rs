//! StockLedger backend - inventory ledger and purchase-order costing engine
//!
//! The engine behind a multi-tenant restaurant/retail stock system: FIFO
//! batch consumption, weighted-average cost maintenance, the purchase-order
//! receiving workflow, and valuation/cost reporting. It is consumed as a
//! library by the order, purchasing, and reporting subsystems; HTTP routing,
//! authentication, and presentation live outside this crate.
//!
//! Every service is scoped by a `tenant_id` supplied by the caller and every
//! mutating operation runs as a single database transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

//! Domain models for the StockLedger backend
//!
//! Re-exports the pure domain layer from the shared crate; persistent row
//! types live beside the services that own them.

pub use shared::models::*;

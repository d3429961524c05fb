//! Sea-ORM entities for the rental ledger.
//!
//! The analysis engine reads the operational entities and writes only
//! [`anomaly`] and [`financial_snapshot`] records.

pub mod anomaly;
pub mod expense;
pub mod financial_snapshot;
pub mod invoice;
pub mod monthly_budget;
pub mod moto;
pub mod payment;
pub mod rental_contract;
pub mod stock_item;
pub mod stock_movement;
pub mod vehicle_document;

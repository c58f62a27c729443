//! Bulk reconciliation imports
//!
//! Two upload modes against the parcel store. The receiving manifest
//! creates parcels it has never seen and refreshes bag/district markers on
//! the rest. The carrier detail feed only enriches parcels that already
//! exist. Each upload runs in a single store transaction.

pub mod commands;
pub mod routes;

pub use routes::imports_routes;

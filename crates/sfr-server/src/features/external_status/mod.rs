//! Carrier external-status feature
//!
//! Records the latest free-text status reported by the downstream carrier
//! and classifies it. The classification is advisory: it never changes a
//! parcel's lifecycle state.

pub mod commands;
pub mod routes;

pub use routes::external_status_routes;

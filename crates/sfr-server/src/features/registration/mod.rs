//! Parcel registration and housekeeping
//!
//! Pre-registration of individual parcels ahead of the manifest, bag
//! management, bulk deletion and the per-parcel transition history query.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::registration_routes;

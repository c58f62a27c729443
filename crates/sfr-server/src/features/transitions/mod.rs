//! Lifecycle transition feature

pub mod commands;
pub mod routes;

pub use routes::transitions_routes;

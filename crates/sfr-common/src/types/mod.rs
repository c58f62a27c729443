//! Shared domain types

pub mod state;

pub use state::{ParcelState, ReturnSubtype};

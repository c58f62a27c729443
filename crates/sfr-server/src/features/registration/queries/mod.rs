//! Registration read operations

pub mod history;

pub use history::{HistoryError, HistoryQuery, ParcelHistory};

//! Import write operations

pub mod detail;
pub mod manifest;

pub use detail::{DetailImportCommand, DetailImportError, DetailImportSummary};
pub use manifest::{ManifestImportCommand, ManifestImportError, ManifestImportSummary};

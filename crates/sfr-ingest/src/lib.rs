//! SFR Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pure parsing substrate for the reconciliation engine. This crate turns
//! the delimited exports the external carrier system produces into typed
//! rows; it never touches the parcel store. Two shapes are understood:
//!
//! - **Manifests**: warehouse receiving sheets where a seal number and a
//!   destination district appear somewhere on each row (or are implied by a
//!   nearby row) alongside one or more tracking codes.
//! - **Detail feeds**: one-parcel-per-row CSV exports with recipient data
//!   and the carrier's own status text, under wildly inconsistent headers
//!   and encodings.
//!
//! Parsing is tolerant by design: malformed rows are recorded with their
//! row number and skipped, never fatal.

pub mod decode;
pub mod detail;
pub mod grid;
pub mod manifest;
pub mod text;

pub use detail::{DetailFeedParser, DetailRow, ParsedDetailFeed};
pub use grid::Grid;
pub use manifest::{ManifestEntry, ManifestParser, ParsedManifest};
